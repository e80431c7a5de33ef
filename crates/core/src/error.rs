//! Core Error Types
//!
//! Errors raised by the core crate itself. Backend failures have their own
//! `BackendError`; the main application crate folds both into `AppError`.

use thiserror::Error;

/// Error raised while building core values from user input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Input that does not describe a valid value
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::validation("Invalid user: \"@\"");
        assert_eq!(err.to_string(), "Validation error: Invalid user: \"@\"");
    }
}
