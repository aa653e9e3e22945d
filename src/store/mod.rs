//! Remote document store contracts.
//!
//! The engine only ever reads, merges into and subscribes to account
//! records, and appends/queries fund requests. Records are never deleted
//! by the client.

pub mod memory;

pub use memory::MemoryStore;

use std::future::Future;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::AppResult;
use crate::models::{FundRequest, RequestKind, RequestStatus};

/// Full document snapshot; `None` when the document does not exist.
pub type Snapshot = Option<Value>;

/// Key-value document store keyed by account id.
pub trait AccountStore: Clone + Send + Sync + 'static {
    fn get(&self, account_id: &str) -> impl Future<Output = AppResult<Snapshot>> + Send;

    /// Shallow merge of `patch`'s top-level fields; creates the document if missing.
    fn merge(&self, account_id: &str, patch: Value) -> impl Future<Output = AppResult<()>> + Send;

    /// Atomic server-side increment of an integer field; returns the new value.
    fn increment(
        &self,
        account_id: &str,
        field: &str,
        by: i64,
    ) -> impl Future<Output = AppResult<i64>> + Send;

    /// Delivers the current snapshot immediately, then one per change.
    fn subscribe(
        &self,
        account_id: &str,
    ) -> impl Future<Output = AppResult<UnboundedReceiver<Snapshot>>> + Send;
}

/// Append-only collections of deposit and withdrawal requests.
pub trait RequestStore: Clone + Send + Sync + 'static {
    fn append(&self, request: FundRequest) -> impl Future<Output = AppResult<()>> + Send;

    fn query(
        &self,
        account_id: &str,
        kind: RequestKind,
        status: Option<RequestStatus>,
    ) -> impl Future<Output = AppResult<Vec<FundRequest>>> + Send;

    fn find(
        &self,
        kind: RequestKind,
        id: &str,
    ) -> impl Future<Output = AppResult<Option<FundRequest>>> + Send;

    /// Status transitions belong to the admin actor only.
    fn set_status(
        &self,
        kind: RequestKind,
        id: &str,
        status: RequestStatus,
    ) -> impl Future<Output = AppResult<()>> + Send;
}
