//! API error handling for the mail HTTP API.
//!
//! Every failure is answered as `{"error": {"code", "message", "details"?}}`.

use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::MailRewardError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request body (400).
    BadRequest,
    /// Missing or invalid token (401).
    Unauthorized,
    /// Token does not match the requested player (403).
    Forbidden,
    /// Mail missing, expired or deleted (404).
    NotFound,
    /// A claim for the same mail is in flight (429).
    TooManyRequests,
    /// Request fields failed validation (422).
    ValidationError,
    /// Request rejected by a domain rule (422).
    UnprocessableEntity,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::ValidationError | ErrorCode::UnprocessableEntity => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Field name to validation messages.
pub type FieldErrors = HashMap<String, Vec<String>>;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: ErrorCode,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a FieldErrors>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<FieldErrors>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Error code of this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// A 422 listing every failed field of a `validator` check.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, field_errors)| {
                let messages = field_errors
                    .iter()
                    .map(|e| match &e.message {
                        Some(m) => m.to_string(),
                        None => format!("Invalid value for {field}"),
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        Self {
            code: ErrorCode::ValidationError,
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
                details: self.details.as_ref(),
            },
        };
        (self.code.status_code(), Json(body)).into_response()
    }
}

impl From<MailRewardError> for ApiError {
    fn from(err: MailRewardError) -> Self {
        match err {
            MailRewardError::NotFound(what) => {
                ApiError::new(ErrorCode::NotFound, format!("{what} not found"))
            }
            MailRewardError::Busy(msg) => ApiError::new(ErrorCode::TooManyRequests, msg),
            MailRewardError::Validation(msg) => ApiError::new(ErrorCode::UnprocessableEntity, msg),
            MailRewardError::Permission(msg) => ApiError::forbidden(msg),
            other => {
                tracing::error!(error = %other, "Internal error");
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct SampleRequest {
        #[validate(range(min = 1, message = "userid must be positive"))]
        userid: i64,
        #[validate(length(min = 1))]
        title: String,
    }

    #[test]
    fn test_error_code_status() {
        let cases = [
            (ErrorCode::BadRequest, StatusCode::BAD_REQUEST),
            (ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED),
            (ErrorCode::Forbidden, StatusCode::FORBIDDEN),
            (ErrorCode::NotFound, StatusCode::NOT_FOUND),
            (ErrorCode::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
            (ErrorCode::ValidationError, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorCode::UnprocessableEntity, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorCode::InternalError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            assert_eq!(code.status_code(), status, "{code:?}");
        }
    }

    #[test]
    fn test_from_validation_errors() {
        let errors = SampleRequest {
            userid: 0,
            title: String::new(),
        }
        .validate()
        .unwrap_err();

        let err = ApiError::from_validation_errors(errors);
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.message, "Validation failed");

        let details = err.details.unwrap();
        assert_eq!(details["userid"], vec!["userid must be positive".to_string()]);
        assert_eq!(details["title"], vec!["Invalid value for title".to_string()]);
    }

    #[test]
    fn test_display() {
        let err = ApiError::forbidden("not yours");
        assert_eq!(err.to_string(), "Forbidden: not yours");
    }

    #[test]
    fn test_from_mail_reward_error() {
        let cases = [
            (MailRewardError::NotFound("mail".into()), ErrorCode::NotFound),
            (MailRewardError::Busy("locked".into()), ErrorCode::TooManyRequests),
            (MailRewardError::Validation("bad".into()), ErrorCode::UnprocessableEntity),
            (MailRewardError::Permission("no".into()), ErrorCode::Forbidden),
            (MailRewardError::Database("boom".into()), ErrorCode::InternalError),
            (MailRewardError::Notify("down".into()), ErrorCode::InternalError),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).code(), code);
        }

        let err = ApiError::from(MailRewardError::NotFound("mail".into()));
        assert_eq!(err.message, "mail not found");

        // Internal details are not leaked
        let err = ApiError::from(MailRewardError::Database("secret path".into()));
        assert_eq!(err.message, "An internal error occurred");
    }
}
