//! Error types for the mail reward service.

use thiserror::Error;

use crate::mail::RewardFormatError;

/// Common error type for the mail reward service.
#[derive(Error, Debug)]
pub enum MailRewardError {
    /// Database error.
    ///
    /// Wraps errors from any of the three stores (mail, ledger, lock).
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Permission denied error.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user or operator input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found, or outside its delivery window.
    #[error("{0} not found")]
    NotFound(String),

    /// Another claim for the same (user, mail) pair holds the lock.
    #[error("busy: {0}")]
    Busy(String),

    /// Stored reward payload could not be decoded.
    #[error("award format error: {0}")]
    RewardFormat(#[from] RewardFormatError),

    /// Game server notification failed.
    #[error("notify error: {0}")]
    Notify(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for MailRewardError {
    fn from(e: sqlx::Error) -> Self {
        MailRewardError::Database(e.to_string())
    }
}

/// Result type alias for mail reward operations.
pub type Result<T> = std::result::Result<T, MailRewardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_error_display() {
        let err = MailRewardError::Permission("userid does not match token".to_string());
        assert_eq!(
            err.to_string(),
            "permission denied: userid does not match token"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = MailRewardError::Validation("title too long".to_string());
        assert_eq!(err.to_string(), "validation error: title too long");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = MailRewardError::NotFound("mail".to_string());
        assert_eq!(err.to_string(), "mail not found");
    }

    #[test]
    fn test_busy_error_display() {
        let err = MailRewardError::Busy("claim in progress".to_string());
        assert_eq!(err.to_string(), "busy: claim in progress");
    }

    #[test]
    fn test_reward_format_conversion() {
        let err: MailRewardError = RewardFormatError::NegativeAmount {
            resource_type: 3,
            amount: -1,
        }
        .into();
        assert!(matches!(err, MailRewardError::RewardFormat(_)));
        assert!(err.to_string().starts_with("award format error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MailRewardError = io_err.into();
        assert!(matches!(err, MailRewardError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(MailRewardError::Notify("timeout".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
