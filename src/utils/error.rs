//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use chat_companion_core::{BackendError, CoreError};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Messaging backend errors (including rate limiting)
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid command pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Zip archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Process spawn / execution errors
    #[error("Command error: {0}")]
    Command(String),

    /// Remote session connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Variant name, used as the failure kind in capture logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Backend(BackendError::RateLimited { .. }) => "RateLimited",
            AppError::Backend(_) => "Backend",
            AppError::Config(_) => "Config",
            AppError::Io(_) => "Io",
            AppError::Serialization(_) => "Serialization",
            AppError::Pattern(_) => "Pattern",
            AppError::Archive(_) => "Archive",
            AppError::Http(_) => "Http",
            AppError::Command(_) => "Command",
            AppError::Connection(_) => "Connection",
            AppError::Validation(_) => "Validation",
            AppError::NotFound(_) => "NotFound",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Retry delay when this is the backend's back-off signal.
    pub fn rate_limit(&self) -> Option<std::time::Duration> {
        match self {
            AppError::Backend(BackendError::RateLimited { retry_after }) => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => AppError::Validation(msg),
        }
    }
}
