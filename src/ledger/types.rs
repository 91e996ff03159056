//! Reward ledger types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::mail::Reward;
use crate::Result;

/// A request to credit one mail's reward to one player.
///
/// The (mail, user) pair is the idempotency key: a ledger credits a given
/// pair at most once.
#[derive(Debug, Clone)]
pub struct ClaimIntent {
    /// Mail being claimed.
    pub mail_id: i64,
    /// Player receiving the reward.
    pub user_id: i64,
    /// What to credit.
    pub reward: Reward,
}

impl ClaimIntent {
    /// Create a new claim intent.
    pub fn new(mail_id: i64, user_id: i64, reward: Reward) -> Self {
        Self {
            mail_id,
            user_id,
            reward,
        }
    }
}

/// Result of a credit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Balances were updated.
    Credited,
    /// This (mail, user) pair was credited before; nothing changed.
    AlreadyCredited,
}

/// A recorded claim intent.
#[derive(Debug, Clone)]
pub struct IntentRecord {
    /// Mail claimed.
    pub mail_id: i64,
    /// Player credited.
    pub user_id: i64,
    /// Reward payload as credited.
    pub reward_payload: String,
    /// When the credit committed.
    pub created_at: DateTime<Utc>,
    /// When the mail status was confirmed as claimed.
    pub settled_at: Option<DateTime<Utc>>,
    /// Failed settle attempts so far.
    pub attempts: u32,
    /// When the last failed attempt happened.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Additive balance store, physically separate from the mail store.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    /// Credit every item of the intent in one transaction, unless the
    /// intent was already recorded.
    async fn credit_batch(&self, intent: &ClaimIntent) -> Result<CreditOutcome>;

    /// Mark an intent settled once the mail status reflects the claim.
    /// Returns whether an unsettled intent was found.
    async fn settle(&self, mail_id: i64, user_id: i64) -> Result<bool>;

    /// Record a failed settle attempt for an unsettled intent.
    async fn record_attempt(&self, mail_id: i64, user_id: i64) -> Result<()>;

    /// Unsettled intents created before `before`, fewest failed attempts
    /// first, then oldest first.
    async fn unsettled(&self, before: DateTime<Utc>, limit: u32) -> Result<Vec<IntentRecord>>;
}
