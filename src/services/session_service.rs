use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::RenderSurface;
use crate::models::{
    AccountSnapshot, AccountView, FundRequest, FundRequestInput, RequestKind, RequestStatus,
    SpinResult, WheelLayout,
};
use crate::services::{
    AccountService, Authority, OutcomeSelector, RequestService, SessionCache, SpinAnimator,
    expire_grace, merge,
};
use crate::store::{AccountStore, RequestStore, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Balance,
    FreeSpins,
}

impl Field {
    fn key(self) -> &'static str {
        match self {
            Field::Balance => "balance",
            Field::FreeSpins => "freeSpins",
        }
    }
}

/// Held for the whole of a spin; further spin requests are rejected, not queued.
struct SpinGuard(Arc<AtomicBool>);

impl SpinGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> AppResult<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::SpinInProgress)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for SpinGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One player's session: owns the local cache and runs every spin through
/// selector, animator and reconciler.
#[derive(Clone)]
pub struct SpinSession<S: AccountStore, R: RequestStore> {
    config: Arc<Config>,
    store: S,
    accounts: AccountService<S>,
    requests: RequestService<R>,
    selector: OutcomeSelector,
    animator: SpinAnimator,
    surface: Arc<dyn RenderSurface>,
    cache: Arc<Mutex<Option<SessionCache>>>,
    spinning: Arc<AtomicBool>,
}

impl<S: AccountStore, R: RequestStore> SpinSession<S, R> {
    pub fn new(
        config: Config,
        store: S,
        request_store: R,
        surface: Arc<dyn RenderSurface>,
    ) -> AppResult<Self> {
        config.validate()?;
        let layout = WheelLayout::from_config(&config.wheel)?;
        let selector = OutcomeSelector::new(&layout, &config.wheel.weighting);
        let animator = SpinAnimator::new(layout, &config.spin);

        Ok(Self {
            accounts: AccountService::new(store.clone(), &config.ledger),
            requests: RequestService::new(request_store, config.requests.clone()),
            store,
            selector,
            animator,
            surface,
            cache: Arc::new(Mutex::new(None)),
            spinning: Arc::new(AtomicBool::new(false)),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning.load(Ordering::SeqCst)
    }

    pub async fn account_id(&self) -> Option<String> {
        self.cache.lock().await.as_ref().map(|c| c.account_id.clone())
    }

    pub async fn view(&self) -> AppResult<AccountView> {
        self.cache
            .lock()
            .await
            .as_ref()
            .map(SessionCache::view)
            .ok_or(AppError::NotAuthenticated)
    }

    /// Loads the account, creating the default record on first login.
    pub async fn login(
        &self,
        account_id: &str,
        email: &str,
        referred_by: Option<&str>,
    ) -> AppResult<AccountView> {
        if let Some(snapshot) = self.accounts.load(account_id).await? {
            let cache = SessionCache::loaded(account_id, &snapshot);
            let view = cache.view();
            *self.cache.lock().await = Some(cache);
            log::info!(
                "Account {account_id} signed in: balance {}, free spins {}",
                view.balance,
                view.free_spins
            );
            return Ok(view);
        }

        *self.cache.lock().await =
            Some(SessionCache::creating(account_id, self.accounts.starting_grant()));
        if let Err(e) = self.accounts.create(account_id, email, referred_by).await {
            // 写入失败时仍保留本地默认值
            log::error!("Failed to create account record for {account_id}: {e}");
        }

        let mut guard = self.cache.lock().await;
        let cache = guard
            .as_mut()
            .filter(|c| c.account_id == account_id)
            .ok_or(AppError::NotAuthenticated)?;
        cache.begin_settling(Instant::now(), self.config.session.grace_window());
        Ok(cache.view())
    }

    pub async fn logout(&self) {
        if let Some(cache) = self.cache.lock().await.take() {
            log::info!("Account {} signed out", cache.account_id);
        }
    }

    /// Merges one realtime notification for `account_id`. Malformed snapshots
    /// are rejected with `ReadFailure` and leave the cache untouched; snapshots
    /// of an account that is no longer signed in are dropped.
    pub async fn apply_snapshot(&self, account_id: &str, raw: Snapshot) -> AppResult<()> {
        let snapshot = AccountSnapshot::parse(raw.as_ref())?;

        let bonus_free_spins = {
            let mut guard = self.cache.lock().await;
            let Some(cache) = guard.as_mut().filter(|c| c.account_id == account_id) else {
                log::debug!("Dropping snapshot for {account_id}: not the signed-in account");
                return Ok(());
            };
            let merged = merge(
                cache,
                &snapshot,
                Instant::now(),
                self.config.ledger.bonus_per_referral,
            );
            *cache = merged.cache;

            if merged.referral_bonus <= 0 {
                return Ok(());
            }
            let remaining = cache.ledger.remaining();
            cache.pending.free_spins = Some(remaining);
            remaining
        };

        self.persist(account_id, Field::FreeSpins, bonus_free_spins).await;
        Ok(())
    }

    /// End of the post-creation grace window, while one is open.
    pub async fn grace_deadline(&self) -> Option<Instant> {
        match self.cache.lock().await.as_ref()?.authority {
            Authority::Settling { until, .. } => Some(until),
            _ => None,
        }
    }

    /// Closes an elapsed grace window, adopting any remote value held back.
    pub async fn expire_grace_window(&self) {
        let mut guard = self.cache.lock().await;
        if let Some(cache) = guard.as_mut()
            && let Some(next) = expire_grace(cache, Instant::now())
        {
            *cache = next;
        }
    }

    /// Spins once for `cost` (zero for free spins).
    pub async fn spin(&self, cost: i64) -> AppResult<SpinResult> {
        let _guard = SpinGuard::acquire(&self.spinning)?;
        self.debit(cost).await?;
        self.spin_once().await
    }

    pub async fn spin_paid(&self) -> AppResult<SpinResult> {
        self.spin(self.config.spin.paid_cost).await
    }

    /// Uses one free spin and runs a zero-cost spin.
    pub async fn use_free_spin(&self) -> AppResult<SpinResult> {
        let _guard = SpinGuard::acquire(&self.spinning)?;

        let (account_id, remaining) = {
            let mut guard = self.cache.lock().await;
            let cache = guard.as_mut().ok_or(AppError::NotAuthenticated)?;
            if !cache.ledger.consume() {
                return Err(AppError::InsufficientEntitlement);
            }
            let remaining = cache.ledger.remaining();
            cache.pending.free_spins = Some(remaining);
            (cache.account_id.clone(), remaining)
        };
        log::info!("Account {account_id} used a free spin, {remaining} left");
        self.persist(&account_id, Field::FreeSpins, remaining).await;

        self.spin_once().await
    }

    /// Pays the bundle price once, then spins `bundle_size` times for free.
    pub async fn spin_bundle(&self) -> AppResult<Vec<SpinResult>> {
        let _guard = SpinGuard::acquire(&self.spinning)?;
        let spin = &self.config.spin;
        self.debit(spin.bundle_cost).await?;

        let mut results = Vec::with_capacity(spin.bundle_size as usize);
        for round in 0..spin.bundle_size {
            if round > 0 {
                tokio::time::sleep(Duration::from_millis(spin.bundle_gap_ms)).await;
            }
            results.push(self.spin_once().await?);
        }
        Ok(results)
    }

    pub async fn submit_deposit(&self, input: &FundRequestInput) -> AppResult<FundRequest> {
        let account_id = self.account_id().await.ok_or(AppError::NotAuthenticated)?;
        self.requests.submit_deposit(&account_id, input).await
    }

    pub async fn submit_withdrawal(&self, input: &FundRequestInput) -> AppResult<FundRequest> {
        let view = self.view().await?;
        self.requests
            .submit_withdrawal(&view.account_id, view.balance, input)
            .await
    }

    pub async fn history(
        &self,
        kind: RequestKind,
        status: Option<RequestStatus>,
    ) -> AppResult<Vec<FundRequest>> {
        let account_id = self.account_id().await.ok_or(AppError::NotAuthenticated)?;
        self.requests.history(&account_id, kind, status).await
    }

    async fn debit(&self, cost: i64) -> AppResult<()> {
        let (account_id, balance) = {
            let mut guard = self.cache.lock().await;
            let cache = guard.as_mut().ok_or(AppError::NotAuthenticated)?;
            let balance = cache.debit(cost)?;
            if cost == 0 {
                return Ok(());
            }
            cache.pending.balance = Some(balance);
            (cache.account_id.clone(), balance)
        };
        log::info!("Account {account_id} paid {cost} for a spin, balance {balance}");
        self.persist(&account_id, Field::Balance, balance).await;
        Ok(())
    }

    async fn spin_once(&self) -> AppResult<SpinResult> {
        let plan = {
            let mut rng = rand::thread_rng();
            let index = self.selector.select(&mut rng);
            self.animator.plan(index, &mut rng)?
        };
        let category = self.animator.layout().category_of(plan.sector_index)?;
        log::info!(
            "Spin decided: sector {} ({}, payout {}), {} turns over {}ms",
            plan.sector_index,
            category.label,
            category.payout,
            plan.full_turns,
            plan.duration.as_millis()
        );

        let result = self.animator.run(&plan, self.surface.as_ref()).await?;

        let credited = {
            let mut guard = self.cache.lock().await;
            match guard.as_mut() {
                Some(cache) => cache.settle(&result).map(|balance| {
                    cache.pending.balance = Some(balance);
                    (cache.account_id.clone(), balance)
                }),
                None => {
                    log::warn!("Session ended before the spin settled; payout dropped");
                    None
                }
            }
        };
        if let Some((account_id, balance)) = credited {
            log::info!("Account {account_id} won {}, balance {balance}", result.payout);
            self.persist(&account_id, Field::Balance, balance).await;
        }
        Ok(result)
    }

    /// Writes one field. Failures and timeouts are logged and the local
    /// value is kept.
    async fn persist(&self, account_id: &str, field: Field, value: i64) {
        let write = self.store.merge(account_id, json!({ field.key(): value }));
        let outcome = match tokio::time::timeout(self.config.session.write_timeout(), write).await {
            Ok(result) => result,
            Err(_) => Err(AppError::PersistenceFailure(format!(
                "write of {} timed out",
                field.key()
            ))),
        };
        if let Err(e) = outcome {
            log::error!(
                "Failed to persist {}={value} for {account_id}: {e}",
                field.key()
            );
        }

        let mut guard = self.cache.lock().await;
        if let Some(cache) = guard.as_mut().filter(|c| c.account_id == account_id) {
            let pending = match field {
                Field::Balance => &mut cache.pending.balance,
                Field::FreeSpins => &mut cache.pending.free_spins,
            };
            if *pending == Some(value) {
                *pending = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoryConfig, SKULL};
    use crate::external::RecordingSurface;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn session_with(
        config: Config,
        store: &MemoryStore,
    ) -> (SpinSession<MemoryStore, MemoryStore>, RecordingSurface) {
        let surface = RecordingSurface::new();
        let session =
            SpinSession::new(config, store.clone(), store.clone(), Arc::new(surface.clone()))
                .unwrap();
        (session, surface)
    }

    fn session(store: &MemoryStore) -> (SpinSession<MemoryStore, MemoryStore>, RecordingSurface) {
        session_with(Config::default(), store)
    }

    async fn seed(store: &MemoryStore, balance: i64, free_spins: i64) {
        store
            .merge(
                "u1",
                json!({ "balance": balance, "freeSpins": free_spins, "referralsCount": 0 }),
            )
            .await
            .unwrap();
    }

    fn balance_writes(log: &[(String, serde_json::Value)]) -> Vec<i64> {
        log.iter()
            .filter_map(|(_, patch)| patch.get("balance").and_then(|v| v.as_i64()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_paid_spin_debits_and_persists() {
        let store = MemoryStore::new();
        seed(&store, 250, 0).await;
        let (session, surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        let result = session.spin(100).await.unwrap();
        assert_eq!(result.payout, 0);
        assert_eq!(session.view().await.unwrap().balance, 150);
        assert_eq!(balance_writes(&store.write_log().await), vec![250, 150]);
        assert_eq!(surface.outcomes().len(), 1);
        assert!(!session.is_spinning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_balance_changes_nothing() {
        let store = MemoryStore::new();
        seed(&store, 50, 0).await;
        let (session, surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();
        let writes_before = store.write_log().await.len();

        assert!(matches!(
            session.spin(100).await,
            Err(AppError::InsufficientBalance { .. })
        ));
        assert_eq!(session.view().await.unwrap().balance, 50);
        assert_eq!(store.write_log().await.len(), writes_before);
        assert!(surface.frames().is_empty());
        assert!(!session.is_spinning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_cost_is_rejected() {
        let store = MemoryStore::new();
        seed(&store, 50, 0).await;
        let (session, surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();
        let writes_before = store.write_log().await.len();

        assert!(matches!(
            session.spin(-1000).await,
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(session.view().await.unwrap().balance, 50);
        assert_eq!(store.write_log().await.len(), writes_before);
        assert!(surface.frames().is_empty());
        assert!(!session.is_spinning());
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let mut config = Config::default();
        config.wheel.weighting.favored_probability = f64::NAN;
        let store = MemoryStore::new();
        let built = SpinSession::new(config, store.clone(), store, Arc::new(RecordingSurface::new()));
        assert!(matches!(built, Err(AppError::ConfigError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_of_previous_account_is_dropped() {
        let store = MemoryStore::new();
        store
            .merge("a", json!({ "balance": 9000, "freeSpins": 7, "referralsCount": 0 }))
            .await
            .unwrap();
        store
            .merge("b", json!({ "balance": 10, "freeSpins": 0, "referralsCount": 0 }))
            .await
            .unwrap();
        let (session, _surface) = session(&store);
        session.login("a", "a@mail.com", None).await.unwrap();
        session.logout().await;
        session.login("b", "b@mail.com", None).await.unwrap();
        let writes_before = store.write_log().await.len();

        let late = Some(json!({ "balance": 9001, "freeSpins": 7, "referralsCount": 4 }));
        session.apply_snapshot("a", late).await.unwrap();

        let view = session.view().await.unwrap();
        assert_eq!(view.account_id, "b");
        assert_eq!((view.balance, view.free_spins, view.referrals_count), (10, 0, 0));
        assert_eq!(store.write_log().await.len(), writes_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_spin_consumes_one_and_spins_for_free() {
        let store = MemoryStore::new();
        seed(&store, 70, 2).await;
        let (session, surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        session.use_free_spin().await.unwrap();
        let view = session.view().await.unwrap();
        assert_eq!(view.free_spins, 1);
        assert_eq!(view.balance, 70);
        assert_eq!(surface.outcomes().len(), 1);
        assert_eq!(
            store.get("u1").await.unwrap().unwrap()["freeSpins"],
            json!(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_spin_without_entitlement() {
        let store = MemoryStore::new();
        seed(&store, 0, 0).await;
        let (session, surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        assert!(matches!(
            session.use_free_spin().await,
            Err(AppError::InsufficientEntitlement)
        ));
        assert_eq!(session.view().await.unwrap().free_spins, 0);
        assert!(surface.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_spin_rejected_while_first_runs() {
        let store = MemoryStore::new();
        seed(&store, 1000, 0).await;
        let (session, _surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        let running = session.clone();
        let first = tokio::spawn(async move { running.spin(100).await });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(session.is_spinning());
        assert!(matches!(session.spin(100).await, Err(AppError::SpinInProgress)));
        assert!(matches!(session.use_free_spin().await, Err(AppError::SpinInProgress)));

        first.await.unwrap().unwrap();
        assert_eq!(session.view().await.unwrap().balance, 900);
        assert!(!session.is_spinning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_account_survives_stale_snapshot() {
        let store = MemoryStore::new();
        let (session, _surface) = session(&store);

        let view = session.login("fresh", "f@mail.com", None).await.unwrap();
        assert_eq!((view.balance, view.free_spins), (0, 1));

        session
            .apply_snapshot("fresh", Some(json!({ "balance": 0, "freeSpins": 0 })))
            .await
            .unwrap();
        let view = session.view().await.unwrap();
        assert_eq!((view.balance, view.free_spins), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_value_adopted_when_window_closes() {
        let store = MemoryStore::new();
        let (session, _surface) = session(&store);
        session.login("fresh", "f@mail.com", None).await.unwrap();
        let deadline = session.grace_deadline().await.unwrap();

        session
            .apply_snapshot("fresh", Some(json!({ "balance": 500, "freeSpins": 1 })))
            .await
            .unwrap();
        assert_eq!(session.view().await.unwrap().balance, 0);

        tokio::time::sleep_until(deadline).await;
        session.expire_grace_window().await;
        assert_eq!(session.view().await.unwrap().balance, 500);
        assert_eq!(session.grace_deadline().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payout_is_credited_and_persisted() {
        let mut config = Config::default();
        config.wheel.categories = vec![CategoryConfig {
            label: SKULL.to_string(),
            payout: 40,
        }];
        config.wheel.sectors = vec![SKULL.to_string(); 4];
        let store = MemoryStore::new();
        seed(&store, 100, 0).await;
        let (session, _surface) = session_with(config, &store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        let result = session.spin(100).await.unwrap();
        assert_eq!(result.payout, 40);
        assert_eq!(session.view().await.unwrap().balance, 40);
        assert_eq!(balance_writes(&store.write_log().await), vec![100, 0, 40]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_keeps_local_state() {
        let store = MemoryStore::new();
        seed(&store, 250, 0).await;
        let (session, _surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        store.set_fail_writes(true);
        session.spin(100).await.unwrap();
        assert_eq!(session.view().await.unwrap().balance, 150);
        assert_eq!(store.get("u1").await.unwrap().unwrap()["balance"], json!(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_write_is_abandoned() {
        let store = MemoryStore::new();
        seed(&store, 250, 0).await;
        let (session, _surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        store.set_write_delay(Some(Duration::from_secs(60))).await;
        let start = Instant::now();
        session.spin(100).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(20));
        assert_eq!(session.view().await.unwrap().balance, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn test_referral_snapshot_credits_and_persists() {
        let store = MemoryStore::new();
        seed(&store, 0, 1).await;
        let (session, _surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        let notification = Some(json!({ "balance": 0, "freeSpins": 1, "referralsCount": 3 }));
        session.apply_snapshot("u1", notification).await.unwrap();
        assert_eq!(session.view().await.unwrap().free_spins, 4);
        assert_eq!(store.get("u1").await.unwrap().unwrap()["freeSpins"], json!(4));

        // 写入后的推送带着同样的邀请数，重复到达也不会再次加赠
        for _ in 0..2 {
            session.apply_snapshot("u1", store.get("u1").await.unwrap()).await.unwrap();
        }
        assert_eq!(session.view().await.unwrap().free_spins, 4);
        assert_eq!(store.get("u1").await.unwrap().unwrap()["freeSpins"], json!(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_snapshot_is_ignored() {
        let store = MemoryStore::new();
        seed(&store, 300, 1).await;
        let (session, _surface) = session(&store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        assert!(matches!(
            session.apply_snapshot("u1", Some(json!({ "balance": -5 }))).await,
            Err(AppError::ReadFailure(_))
        ));
        assert!(session.apply_snapshot("u1", None).await.is_err());
        assert_eq!(session.view().await.unwrap().balance, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bundle_pays_once_for_all_spins() {
        let mut config = Config::default();
        config.spin.bundle_size = 3;
        let store = MemoryStore::new();
        seed(&store, 1500, 0).await;
        let (session, surface) = session_with(config, &store);
        session.login("u1", "u1@mail.com", None).await.unwrap();

        let results = session.spin_bundle().await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(surface.outcomes().len(), 3);
        assert_eq!(session.view().await.unwrap().balance, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_require_login() {
        let store = MemoryStore::new();
        let (session, _surface) = session(&store);
        assert!(matches!(session.spin(0).await, Err(AppError::NotAuthenticated)));
        assert!(matches!(session.view().await, Err(AppError::NotAuthenticated)));

        session.login("u1", "u1@mail.com", None).await.unwrap();
        session.logout().await;
        assert!(matches!(session.use_free_spin().await, Err(AppError::NotAuthenticated)));
    }
}
