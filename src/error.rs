use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Api { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No school is associated with this account")]
    MissingTenantContext,

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request was cancelled before its response could be applied")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn api(message: impl Into<String>) -> Self {
        AppError::Api {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Uniform `{ success, message }` shape handed to presentation code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OpStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl<T> From<&AppResult<T>> for OpStatus {
    fn from(result: &AppResult<T>) -> Self {
        match result {
            Ok(_) => OpStatus::ok(),
            Err(e) => OpStatus::failed(e.to_string()),
        }
    }
}
