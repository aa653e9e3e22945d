//! Background tasks of a player session.
//!
//! The auth listener follows the identity provider: on sign-in it loads or
//! provisions the account and starts the realtime subscription pump, on
//! sign-out it stops the pump and drops the session cache.
//! Call `spawn_all` once during startup to launch them.

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::external::{AuthState, IdentityProvider};
use crate::services::SpinSession;
use crate::store::{AccountStore, RequestStore};

/// Spawn all background tasks.
///
/// Notes
/// - The returned handle owns the auth listener; aborting it leaves the
///   current subscription pump running until the next sign-out.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all<S, R, I>(session: SpinSession<S, R>, identity: &I) -> JoinHandle<()>
where
    S: AccountStore,
    R: RequestStore,
    I: IdentityProvider,
{
    let mut auth = identity.watch();
    tokio::spawn(async move {
        let mut pump: Option<JoinHandle<()>> = None;
        loop {
            let state = auth.borrow_and_update().clone();
            if let Some(handle) = pump.take() {
                handle.abort();
            }

            match state {
                AuthState::SignedIn {
                    account_id,
                    email,
                    referred_by,
                } => match session.login(&account_id, &email, referred_by.as_deref()).await {
                    Ok(_) => pump = Some(spawn_subscription_pump(session.clone(), account_id)),
                    Err(e) => log::error!("Failed to sign in {account_id}: {e}"),
                },
                AuthState::SignedOut => session.logout().await,
            }

            if auth.changed().await.is_err() {
                log::debug!("Identity provider closed, stopping auth listener");
                break;
            }
        }
        if let Some(handle) = pump {
            handle.abort();
        }
    })
}

/// Feeds every remote snapshot of `account_id` into the session.
pub fn spawn_subscription_pump<S, R>(session: SpinSession<S, R>, account_id: String) -> JoinHandle<()>
where
    S: AccountStore,
    R: RequestStore,
{
    tokio::spawn(async move {
        let mut updates = match session.store().subscribe(&account_id).await {
            Ok(rx) => rx,
            Err(e) => {
                log::error!("Failed to subscribe to account {account_id}: {e}");
                return;
            }
        };

        loop {
            let deadline = session.grace_deadline().await;
            tokio::select! {
                update = updates.recv() => {
                    let Some(snapshot) = update else { break };
                    if let Err(e) = session.apply_snapshot(&account_id, snapshot).await {
                        log::warn!("Ignoring snapshot for {account_id}: {e}");
                    }
                }
                _ = wait_until(deadline) => session.expire_grace_window().await,
            }
        }
        log::debug!("Subscription for {account_id} closed");
    })
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
