//! Merge rules between the local session cache and remote account snapshots.
//!
//! Everything here is synchronous and side-effect free; the session service
//! owns the cache and does the persisting.

use tokio::time::Instant;

use crate::error::{AppError, AppResult};
use crate::models::{AccountSnapshot, AccountView, SpinResult};
use crate::services::FreeSpinLedger;

/// Who wins when a snapshot disagrees with the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Default record is being written; snapshots are not merged yet.
    Creating,
    /// Just created. Local values win until `until`, until the remote
    /// confirms them, or until the remote moves away from the first
    /// differing value it reported (`baseline`).
    Settling {
        until: Instant,
        baseline: Option<AccountSnapshot>,
    },
    RemoteAuthoritative,
}

impl Authority {
    pub fn name(&self) -> &'static str {
        match self {
            Authority::Creating => "creating",
            Authority::Settling { .. } => "settling",
            Authority::RemoteAuthoritative => "remote_authoritative",
        }
    }
}

/// Values of local writes that have not been acknowledged yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingWrites {
    pub balance: Option<i64>,
    pub free_spins: Option<i64>,
}

/// Client-side mirror of the signed-in account.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCache {
    pub account_id: String,
    pub balance: i64,
    pub ledger: FreeSpinLedger,
    /// Last referral count seen; referral bonuses are deltas against it.
    pub referrals_count: i64,
    pub authority: Authority,
    pub pending: PendingWrites,
}

impl SessionCache {
    /// Cache for an account that already existed at login.
    pub fn loaded(account_id: &str, snapshot: &AccountSnapshot) -> Self {
        Self {
            account_id: account_id.to_string(),
            balance: snapshot.balance.unwrap_or(0),
            ledger: FreeSpinLedger::new(snapshot.free_spins.unwrap_or(0)),
            referrals_count: snapshot.referrals_count.unwrap_or(0),
            authority: Authority::RemoteAuthoritative,
            pending: PendingWrites::default(),
        }
    }

    /// Cache for an account whose default record is being written now.
    pub fn creating(account_id: &str, starting_grant: i64) -> Self {
        Self {
            account_id: account_id.to_string(),
            balance: 0,
            ledger: FreeSpinLedger::new(starting_grant),
            referrals_count: 0,
            authority: Authority::Creating,
            pending: PendingWrites::default(),
        }
    }

    /// Leaves `Creating` once the default record has been written.
    pub fn begin_settling(&mut self, now: Instant, grace_window: std::time::Duration) {
        if self.authority == Authority::Creating {
            self.authority = Authority::Settling {
                until: now + grace_window,
                baseline: None,
            };
        }
    }

    pub fn view(&self) -> AccountView {
        AccountView {
            account_id: self.account_id.clone(),
            balance: self.balance,
            free_spins: self.ledger.remaining(),
            referrals_count: self.referrals_count,
        }
    }

    /// Debits `cost` before a spin. Nothing changes when the cost is negative
    /// or the balance is short.
    pub fn debit(&mut self, cost: i64) -> AppResult<i64> {
        if cost < 0 {
            return Err(AppError::ValidationError(format!(
                "Spin cost must not be negative, got {cost}"
            )));
        }
        if cost > self.balance {
            return Err(AppError::InsufficientBalance {
                required: cost,
                available: self.balance,
            });
        }
        self.balance -= cost;
        Ok(self.balance)
    }

    /// Credits a realized spin; returns the new balance when it changed.
    pub fn settle(&mut self, result: &SpinResult) -> Option<i64> {
        if result.payout <= 0 {
            return None;
        }
        self.balance += result.payout;
        Some(self.balance)
    }
}

/// Result of merging one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub cache: SessionCache,
    /// Free spins credited for new referrals; persist `cache.ledger` when > 0.
    pub referral_bonus: i64,
}

fn same_values(a: &AccountSnapshot, b: &AccountSnapshot) -> bool {
    a.balance == b.balance && a.free_spins == b.free_spins
}

/// Takes balance and free spins from `snapshot`, except where a local write
/// of a different value is still in flight.
fn adopt(cache: &mut SessionCache, snapshot: &AccountSnapshot) {
    if let Some(balance) = snapshot.balance {
        match cache.pending.balance {
            Some(expected) if expected != balance => {}
            Some(_) => {
                cache.pending.balance = None;
                cache.balance = balance;
            }
            None => cache.balance = balance,
        }
    }
    if let Some(free_spins) = snapshot.free_spins {
        match cache.pending.free_spins {
            Some(expected) if expected != free_spins => {}
            Some(_) => {
                cache.pending.free_spins = None;
                cache.ledger.adopt(free_spins);
            }
            None => cache.ledger.adopt(free_spins),
        }
    }
}

fn log_transition(before: &SessionCache, after: &SessionCache) {
    if before.authority != after.authority {
        log::info!(
            "Account {} authority {} -> {}",
            before.account_id,
            before.authority.name(),
            after.authority.name()
        );
    }
}

/// Merges one validated snapshot into `cache`.
pub fn merge(
    cache: &SessionCache,
    snapshot: &AccountSnapshot,
    now: Instant,
    bonus_per_referral: i64,
) -> Merged {
    let mut next = cache.clone();

    let take_remote = match cache.authority {
        Authority::Creating => {
            log::debug!("Ignoring snapshot for {} while creating", cache.account_id);
            return Merged {
                cache: next,
                referral_bonus: 0,
            };
        }
        Authority::Settling { until, baseline } => {
            let has_values = snapshot.balance.is_some() || snapshot.free_spins.is_some();
            let confirms = has_values
                && snapshot.balance.is_none_or(|b| b == cache.balance)
                && snapshot
                    .free_spins
                    .is_none_or(|f| f == cache.ledger.remaining());

            if now >= until || confirms {
                next.authority = Authority::RemoteAuthoritative;
                true
            } else if !has_values {
                // 没有余额和次数的快照既不确认也不作为旧读基线
                false
            } else {
                match baseline {
                    None => {
                        // 首个不一致的快照视为创建前的旧读，保留本地值
                        next.authority = Authority::Settling {
                            until,
                            baseline: Some(*snapshot),
                        };
                        false
                    }
                    Some(seen) if same_values(&seen, snapshot) => false,
                    Some(_) => {
                        next.authority = Authority::RemoteAuthoritative;
                        true
                    }
                }
            }
        }
        Authority::RemoteAuthoritative => true,
    };
    log_transition(cache, &next);

    if take_remote {
        adopt(&mut next, snapshot);
    }

    let mut referral_bonus = 0;
    if let Some(count) = snapshot.referrals_count {
        let delta = count - cache.referrals_count;
        if delta > 0 {
            referral_bonus = delta * bonus_per_referral;
            next.ledger.credit(referral_bonus);
            log::info!(
                "Account {} gained {delta} referral(s), crediting {referral_bonus} free spin(s)",
                cache.account_id
            );
        }
        next.referrals_count = count;
    }

    Merged {
        cache: next,
        referral_bonus,
    }
}

/// Ends an elapsed grace window without waiting for another snapshot.
/// A value held back during the window is adopted now. Returns `None` when
/// there is nothing to do.
pub fn expire_grace(cache: &SessionCache, now: Instant) -> Option<SessionCache> {
    let Authority::Settling { until, baseline } = cache.authority else {
        return None;
    };
    if now < until {
        return None;
    }

    let mut next = cache.clone();
    next.authority = Authority::RemoteAuthoritative;
    if let Some(held) = baseline {
        adopt(&mut next, &held);
    }
    log_transition(cache, &next);
    Some(next)
}
