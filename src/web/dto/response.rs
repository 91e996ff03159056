//! Response DTOs for the mail API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::claim::ClaimOutcome;
use crate::datetime::to_millis;
use crate::mail::{InboxMail, RewardItem};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// A mail as shown in the player's inbox. Times are epoch milliseconds.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InboxMailResponse {
    /// Mail ID.
    pub id: i64,
    /// `global` or `personal`.
    pub scope: String,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Stored reward payload (empty when the mail has no reward).
    pub reward_payload: String,
    /// Status code: 0 unclaimed, 1 read, 2 claimed.
    pub status: i64,
    /// Window start.
    pub start_time: i64,
    /// Window end.
    pub end_time: i64,
    /// Publication time.
    pub created_at: i64,
}

impl From<InboxMail> for InboxMailResponse {
    fn from(inbox: InboxMail) -> Self {
        Self {
            id: inbox.mail.id,
            scope: inbox.mail.scope.as_str().to_string(),
            title: inbox.mail.title,
            content: inbox.mail.content,
            reward_payload: inbox.mail.reward_payload,
            status: inbox.status.code(),
            start_time: to_millis(&inbox.start_time),
            end_time: to_millis(&inbox.end_time),
            created_at: to_millis(&inbox.mail.created_at),
        }
    }
}

/// One credited item.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct AwardResponse {
    /// Resource type.
    #[serde(rename = "type")]
    pub resource_type: i32,
    /// Amount credited.
    pub count: i64,
}

impl From<&RewardItem> for AwardResponse {
    fn from(item: &RewardItem) -> Self {
        Self {
            resource_type: item.resource_type,
            count: item.amount,
        }
    }
}

/// Claim result.
///
/// A fresh claim carries `awards` (and `noticeid` when the game server
/// assigned one); a replay carries only `alreadyReceived: true`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    /// Credited items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awards: Option<Vec<AwardResponse>>,
    /// Game server notice id.
    #[serde(skip_serializing_if = "Option::is_none", rename = "noticeid")]
    pub notice_id: Option<i64>,
    /// Set when the reward had been received before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_received: Option<bool>,
}

impl From<ClaimOutcome> for ClaimResponse {
    fn from(outcome: ClaimOutcome) -> Self {
        match outcome {
            ClaimOutcome::Granted { items, notice_id } => Self {
                awards: Some(items.iter().map(AwardResponse::from).collect()),
                notice_id,
                already_received: None,
            },
            ClaimOutcome::AlreadyReceived => Self {
                awards: None,
                notice_id: None,
                already_received: Some(true),
            },
        }
    }
}

/// Result of a read or delete.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkResponse {
    /// Whether the status changed.
    pub updated: bool,
}
