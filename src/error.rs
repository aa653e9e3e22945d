use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("No free spins remaining")]
    InsufficientEntitlement,

    #[error("A spin is already in progress")]
    SpinInProgress,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Read failure: {0}")]
    ReadFailure(String),

    #[error("A pending withdrawal request already exists")]
    PendingRequestExists,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl AppError {
    /// Stable machine-readable code, used in status messages and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::InsufficientEntitlement => "INSUFFICIENT_ENTITLEMENT",
            AppError::SpinInProgress => "SPIN_IN_PROGRESS",
            AppError::NotAuthenticated => "NOT_AUTHENTICATED",
            AppError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            AppError::ReadFailure(_) => "READ_FAILURE",
            AppError::PendingRequestExists => "PENDING_REQUEST_EXISTS",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::SerdeJsonError(_) => "SERDE_ERROR",
            AppError::TomlError(_) => "CONFIG_ERROR",
        }
    }

    /// Message shown to the player. Logs the error at the level it deserves,
    /// so call it once at the operation boundary.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InsufficientBalance { .. } => {
                log::warn!("{self}");
                "⚠️ Not enough balance!".to_string()
            }
            AppError::InsufficientEntitlement => {
                log::warn!("{self}");
                "⚠️ No free spins available!".to_string()
            }
            AppError::SpinInProgress => {
                log::debug!("Spin request ignored while another spin is running");
                "⏳ Please wait for the current spin to finish.".to_string()
            }
            AppError::NotAuthenticated => {
                log::warn!("{self}");
                "⚠️ Please login first!".to_string()
            }
            AppError::PendingRequestExists => {
                log::warn!("{self}");
                "⚠️ You already have a pending withdrawal request.".to_string()
            }
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                format!("⚠️ {msg}")
            }
            AppError::NotFound(msg) => {
                log::warn!("Not found: {msg}");
                format!("⚠️ {msg}")
            }
            AppError::PersistenceFailure(msg) => {
                log::error!("Persistence failure: {msg}");
                "❌ Unable to save your changes right now.".to_string()
            }
            AppError::ReadFailure(msg) => {
                log::error!("Read failure: {msg}");
                "❌ Unable to load your account right now.".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "❌ Something went wrong. Please try again.".to_string()
            }
        }
    }
}
