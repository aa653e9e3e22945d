use serde_json::json;

use crate::config::LedgerConfig;
use crate::error::AppResult;
use crate::models::{AccountDocument, AccountSnapshot};
use crate::store::AccountStore;

/// Account record provisioning at login.
#[derive(Clone)]
pub struct AccountService<S: AccountStore> {
    store: S,
    starting_grant: i64,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: S, ledger: &LedgerConfig) -> Self {
        Self {
            store,
            starting_grant: ledger.starting_grant,
        }
    }

    pub fn starting_grant(&self) -> i64 {
        self.starting_grant
    }

    /// Reads an existing account. Returns `None` when the record does not
    /// exist yet. A record without `freeSpins` gets the starting grant
    /// written once.
    pub async fn load(&self, account_id: &str) -> AppResult<Option<AccountSnapshot>> {
        let Some(raw) = self.store.get(account_id).await? else {
            return Ok(None);
        };
        let mut snapshot = AccountSnapshot::parse(Some(&raw))?;

        if snapshot.free_spins.is_none() {
            log::info!("Backfilling freeSpins for account {account_id}");
            snapshot.free_spins = Some(self.starting_grant);
            if let Err(e) = self
                .store
                .merge(account_id, json!({ "freeSpins": self.starting_grant }))
                .await
            {
                log::error!("Failed to backfill freeSpins for {account_id}: {e}");
            }
        }
        Ok(Some(snapshot))
    }

    /// Writes the default record for a first login.
    ///
    /// `referred_by` is only recorded when it names another existing
    /// account; that account's `referralsCount` is then incremented.
    pub async fn create(
        &self,
        account_id: &str,
        email: &str,
        referred_by: Option<&str>,
    ) -> AppResult<AccountDocument> {
        let mut doc = AccountDocument::new_account(account_id, email, self.starting_grant);

        let referrer = match referred_by.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) if code == account_id => {
                log::warn!("Account {account_id} tried to refer itself");
                None
            }
            Some(code) => match self.store.get(code).await {
                Ok(Some(_)) => Some(code.to_string()),
                Ok(None) => {
                    log::warn!("Unknown referral code {code} for account {account_id}");
                    None
                }
                Err(e) => {
                    log::error!("Failed to look up referrer {code}: {e}");
                    None
                }
            },
            None => None,
        };
        doc.referred_by = referrer.clone();

        self.store.merge(account_id, doc.to_value()?).await?;
        log::info!(
            "Created account {account_id} with {} free spin(s)",
            self.starting_grant
        );

        if let Some(referrer) = referrer {
            match self.store.increment(&referrer, "referralsCount", 1).await {
                Ok(count) => log::info!("Referrer {referrer} now has {count} referral(s)"),
                Err(e) => log::error!("Failed to credit referrer {referrer}: {e}"),
            }
        }
        Ok(doc)
    }
}
