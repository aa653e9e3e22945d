use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, RwLock};

use super::{AccountStore, RequestStore, Snapshot};
use crate::error::{AppError, AppResult};
use crate::models::{FundRequest, RequestKind, RequestStatus};

/// In-process realtime document store.
///
/// Behaves like the hosted store from the client's point of view: every
/// merge pushes the full document to all subscribers of that account.
/// Writes can be made to fail or stall to exercise persistence failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    accounts: RwLock<HashMap<String, Map<String, Value>>>,
    /// Lock order: `subscribers` before `accounts`, so a write and its
    /// notification are atomic with respect to `subscribe`.
    subscribers: Mutex<Subscribers>,
    requests: RwLock<HashMap<RequestKind, Vec<FundRequest>>>,
    write_log: Mutex<Vec<(String, Value)>>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn set_write_delay(&self, delay: Option<Duration>) {
        *self.inner.write_delay.lock().await = delay;
    }

    /// Every account merge accepted so far, in order.
    pub async fn write_log(&self) -> Vec<(String, Value)> {
        self.inner.write_log.lock().await.clone()
    }

    /// Delivers a notification without touching the stored document,
    /// e.g. a stale read racing a fresh write.
    pub async fn push_raw(&self, account_id: &str, snapshot: Snapshot) {
        let mut subscribers = self.inner.subscribers.lock().await;
        notify(&mut subscribers, account_id, snapshot);
    }

    async fn before_write(&self) -> AppResult<()> {
        let delay = *self.inner.write_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceFailure("write rejected by store".into()));
        }
        Ok(())
    }

}

type Subscribers = HashMap<String, Vec<UnboundedSender<Snapshot>>>;

fn notify(subscribers: &mut Subscribers, account_id: &str, snapshot: Snapshot) {
    if let Some(list) = subscribers.get_mut(account_id) {
        list.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

impl AccountStore for MemoryStore {
    async fn get(&self, account_id: &str) -> AppResult<Snapshot> {
        let accounts = self.inner.accounts.read().await;
        Ok(accounts.get(account_id).cloned().map(Value::Object))
    }

    async fn merge(&self, account_id: &str, patch: Value) -> AppResult<()> {
        self.before_write().await?;
        let Value::Object(fields) = patch.clone() else {
            return Err(AppError::ValidationError("merge patch must be an object".into()));
        };

        let mut subscribers = self.inner.subscribers.lock().await;
        let snapshot = {
            let mut accounts = self.inner.accounts.write().await;
            let doc = accounts.entry(account_id.to_string()).or_default();
            for (key, value) in fields {
                doc.insert(key, value);
            }
            Value::Object(doc.clone())
        };
        self.inner
            .write_log
            .lock()
            .await
            .push((account_id.to_string(), patch));
        notify(&mut subscribers, account_id, Some(snapshot));
        Ok(())
    }

    async fn increment(&self, account_id: &str, field: &str, by: i64) -> AppResult<i64> {
        self.before_write().await?;
        let mut subscribers = self.inner.subscribers.lock().await;
        let (new_value, snapshot) = {
            let mut accounts = self.inner.accounts.write().await;
            let doc = accounts
                .get_mut(account_id)
                .ok_or_else(|| AppError::NotFound(format!("account {account_id}")))?;
            let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
            let new_value = current + by;
            doc.insert(field.to_string(), Value::from(new_value));
            (new_value, Value::Object(doc.clone()))
        };
        notify(&mut subscribers, account_id, Some(snapshot));
        Ok(new_value)
    }

    async fn subscribe(&self, account_id: &str) -> AppResult<UnboundedReceiver<Snapshot>> {
        let (tx, rx) = mpsc::unbounded_channel();
        // 持有订阅锁读取并登记，写入无法插在两者之间
        let mut subscribers = self.inner.subscribers.lock().await;
        let current = self.get(account_id).await?;
        let _ = tx.send(current);
        subscribers.entry(account_id.to_string()).or_default().push(tx);
        Ok(rx)
    }
}

impl RequestStore for MemoryStore {
    async fn append(&self, request: FundRequest) -> AppResult<()> {
        self.before_write().await?;
        self.inner
            .requests
            .write()
            .await
            .entry(request.kind)
            .or_default()
            .push(request);
        Ok(())
    }

    async fn query(
        &self,
        account_id: &str,
        kind: RequestKind,
        status: Option<RequestStatus>,
    ) -> AppResult<Vec<FundRequest>> {
        let requests = self.inner.requests.read().await;
        Ok(requests
            .get(&kind)
            .map(|list| {
                list.iter()
                    .filter(|r| r.account_id == account_id)
                    .filter(|r| status.is_none_or(|s| r.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find(&self, kind: RequestKind, id: &str) -> AppResult<Option<FundRequest>> {
        let requests = self.inner.requests.read().await;
        Ok(requests
            .get(&kind)
            .and_then(|list| list.iter().find(|r| r.id == id).cloned()))
    }

    async fn set_status(&self, kind: RequestKind, id: &str, status: RequestStatus) -> AppResult<()> {
        self.before_write().await?;
        let mut requests = self.inner.requests.write().await;
        let request = requests
            .get_mut(&kind)
            .and_then(|list| list.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| AppError::NotFound(format!("{} request {id}", kind.collection())))?;
        request.status = status;
        Ok(())
    }
}
