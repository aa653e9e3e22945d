use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Remote account record as stored in the `users` collection.
///
/// Every field is optional: documents written by older clients or by the
/// admin tooling may lack some of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_spins: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrals_count: Option<i64>,
    /// The account's own code, shared with people it refers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refer_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AccountDocument {
    /// Default record written on first login.
    pub fn new_account(account_id: &str, email: &str, starting_grant: i64) -> Self {
        Self {
            email: Some(email.to_string()),
            balance: Some(0),
            free_spins: Some(starting_grant),
            referrals_count: Some(0),
            refer_code: Some(account_id.to_string()),
            referred_by: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn from_value(value: &Value) -> AppResult<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn to_value(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Validated view of one realtime notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub balance: Option<i64>,
    pub free_spins: Option<i64>,
    pub referrals_count: Option<i64>,
}

impl AccountSnapshot {
    /// Parses a raw notification. Missing documents, wrong field types and
    /// negative counters are read failures; the caller keeps its cache.
    pub fn parse(raw: Option<&Value>) -> AppResult<Self> {
        let value = raw.ok_or_else(|| AppError::ReadFailure("account document missing".into()))?;
        let doc = AccountDocument::from_value(value)
            .map_err(|e| AppError::ReadFailure(format!("malformed account document: {e}")))?;

        for (name, field) in [
            ("balance", doc.balance),
            ("freeSpins", doc.free_spins),
            ("referralsCount", doc.referrals_count),
        ] {
            if let Some(v) = field
                && v < 0
            {
                return Err(AppError::ReadFailure(format!("negative {name}: {v}")));
            }
        }

        Ok(Self {
            balance: doc.balance,
            free_spins: doc.free_spins,
            referrals_count: doc.referrals_count,
        })
    }
}

/// What the UI shows for the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub account_id: String,
    pub balance: i64,
    pub free_spins: i64,
    pub referrals_count: i64,
}
