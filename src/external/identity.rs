use tokio::sync::watch;

/// Authentication state as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn {
        account_id: String,
        email: String,
        /// Referral code captured at sign-up, if any.
        referred_by: Option<String>,
    },
}

/// Source of auth-state change events.
pub trait IdentityProvider: Send + Sync + 'static {
    fn watch(&self) -> watch::Receiver<AuthState>;
}

/// Identity provider driven by explicit calls; used by the demo and tests.
#[derive(Clone)]
pub struct ManualIdentity {
    tx: watch::Sender<AuthState>,
}

impl ManualIdentity {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::SignedOut);
        Self { tx }
    }

    pub fn sign_in(&self, account_id: &str, email: &str, referred_by: Option<&str>) {
        self.tx.send_replace(AuthState::SignedIn {
            account_id: account_id.to_string(),
            email: email.to_string(),
            referred_by: referred_by.map(str::to_string),
        });
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(AuthState::SignedOut);
    }
}

impl Default for ManualIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for ManualIdentity {
    fn watch(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }
}
