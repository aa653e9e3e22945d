//! Operation boundary: every player action ends here as a `StatusMessage`.

pub mod request;
pub mod spin;

use serde::{Deserialize, Serialize};

use crate::models::{FundRequestInput, RequestKind, RequestStatus, StatusMessage};
use crate::services::SpinSession;
use crate::store::{AccountStore, RequestStore};

/// Player-triggered actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Spin,
    FreeSpin,
    BundleSpin,
    Account,
    Deposit(FundRequestInput),
    Withdraw(FundRequestInput),
    History {
        kind: RequestKind,
        #[serde(default)]
        status: Option<RequestStatus>,
    },
}

pub async fn handle_action<S: AccountStore, R: RequestStore>(
    session: &SpinSession<S, R>,
    action: Action,
) -> StatusMessage {
    log::debug!("Handling action {action:?}");
    match action {
        Action::Spin => spin::spin_paid(session).await,
        Action::FreeSpin => spin::spin_free(session).await,
        Action::BundleSpin => spin::spin_bundle(session).await,
        Action::Account => spin::account(session).await,
        Action::Deposit(input) => request::deposit(session, &input).await,
        Action::Withdraw(input) => request::withdraw(session, &input).await,
        Action::History { kind, status } => request::history(session, kind, status).await,
    }
}
