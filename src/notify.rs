//! Reward delivery notices to the game server.
//!
//! Notices are best-effort: one POST with a fixed timeout, never retried.
//! The claim outcome does not depend on them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GameServerConfig;
use crate::mail::RewardItem;
use crate::{MailRewardError, Result};

/// What was credited to whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardSummary {
    /// Player credited.
    pub user_id: i64,
    /// Items credited.
    pub items: Vec<RewardItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AwardMessage {
    rich_types: Vec<i32>,
    rich_nums: Vec<i64>,
}

impl RewardSummary {
    /// Create a new summary.
    pub fn new(user_id: i64, items: Vec<RewardItem>) -> Self {
        Self { user_id, items }
    }

    /// The `awardMessage` string: `{"richTypes":[..],"richNums":[..]}`.
    pub fn award_message(&self) -> String {
        let message = AwardMessage {
            rich_types: self.items.iter().map(|i| i.resource_type).collect(),
            rich_nums: self.items.iter().map(|i| i.amount).collect(),
        };
        // Two integer vectors always serialize.
        serde_json::to_string(&message).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AwardNoticeRequest {
    userid: i64,
    award_message: String,
}

#[derive(Debug, Deserialize)]
struct AwardNoticeResponse {
    #[serde(default)]
    noticeid: i64,
}

/// Sends reward notices.
#[async_trait]
pub trait RewardNotifier: Send + Sync {
    /// Send one notice. Returns the game server's notice id if it assigned one.
    async fn notify(&self, summary: &RewardSummary) -> Result<Option<i64>>;
}

/// Notifier posting to the game server's HTTP notice endpoint.
#[derive(Debug, Clone)]
pub struct GameServerNotifier {
    client: Client,
    url: String,
}

impl GameServerNotifier {
    /// Create a notifier from configuration.
    pub fn new(config: &GameServerConfig) -> Result<Self> {
        Self::with_url(config.notice_url(), Duration::from_secs(config.timeout_secs))
    }

    /// Create a notifier for an explicit endpoint URL.
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailRewardError::Notify(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RewardNotifier for GameServerNotifier {
    async fn notify(&self, summary: &RewardSummary) -> Result<Option<i64>> {
        let request = AwardNoticeRequest {
            userid: summary.user_id,
            award_message: summary.award_message(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailRewardError::Notify(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MailRewardError::Notify(format!(
                "game server returned {}",
                response.status()
            )));
        }

        let body: AwardNoticeResponse = response
            .json()
            .await
            .map_err(|e| MailRewardError::Notify(format!("invalid response: {e}")))?;

        debug!(user_id = summary.user_id, noticeid = body.noticeid, "Award notice sent");
        Ok((body.noticeid > 0).then_some(body.noticeid))
    }
}

/// Notifier that sends nothing. Used when notices are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl RewardNotifier for NoopNotifier {
    async fn notify(&self, _summary: &RewardSummary) -> Result<Option<i64>> {
        Ok(None)
    }
}
