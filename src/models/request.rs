use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Deposit,
    Withdrawal,
}

impl RequestKind {
    /// Collection the request lives in.
    pub fn collection(&self) -> &'static str {
        match self {
            RequestKind::Deposit => "payments",
            RequestKind::Withdrawal => "withdrawals",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Deposit or withdrawal request. Immutable for the client once appended;
/// only the admin actor moves it out of `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundRequest {
    pub id: String,
    pub account_id: String,
    pub kind: RequestKind,
    pub amount: i64,
    pub account_holder: String,
    pub account_number: String,
    pub method: String,
    /// Human-readable reference (deposits only).
    pub reference: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for a new deposit or withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequestInput {
    pub account_holder: String,
    pub account_number: String,
    pub amount: i64,
}
