use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// User-visible outcome of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            data: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: Some(code.into()),
            data: None,
        }
    }

    pub fn with_data<T: Serialize>(mut self, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => self.data = Some(value),
            Err(e) => log::error!("Failed to serialize status payload: {e}"),
        }
        self
    }
}

impl From<AppError> for StatusMessage {
    fn from(err: AppError) -> Self {
        StatusMessage::error(err.code(), err.user_message())
    }
}
