//! Request DTOs for the mail API.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Body of every mail endpoint: the player the request is made for.
///
/// Must match the authenticated principal.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MailUserRequest {
    /// Player ID.
    #[validate(range(min = 1, message = "userid must be positive"))]
    pub userid: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_user_request_validation() {
        let req: MailUserRequest = serde_json::from_str(r#"{"userid": 42}"#).unwrap();
        assert!(req.validate().is_ok());

        let req: MailUserRequest = serde_json::from_str(r#"{"userid": 0}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("userid"));
    }

    #[test]
    fn test_mail_user_request_requires_userid() {
        assert!(serde_json::from_str::<MailUserRequest>("{}").is_err());
    }
}
