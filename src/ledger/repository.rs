//! SQLite reward ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use tracing::debug;

use super::types::{ClaimIntent, CreditOutcome, IntentRecord, RewardLedger};
use crate::datetime::{from_millis, now_millis, to_millis};
use crate::db::Database;
use crate::Result;

#[derive(Debug, sqlx::FromRow)]
struct IntentRow {
    mail_id: i64,
    user_id: i64,
    reward: String,
    created_at: i64,
    settled_at: Option<i64>,
    attempts: i64,
    last_attempt_at: Option<i64>,
}

impl From<IntentRow> for IntentRecord {
    fn from(row: IntentRow) -> Self {
        Self {
            mail_id: row.mail_id,
            user_id: row.user_id,
            reward_payload: row.reward,
            created_at: from_millis(row.created_at),
            settled_at: row.settled_at.map(from_millis),
            attempts: u32::try_from(row.attempts).unwrap_or(u32::MAX),
            last_attempt_at: row.last_attempt_at.map(from_millis),
        }
    }
}

/// Reward ledger backed by its own SQLite database.
///
/// Each credit writes the claim intent and the balance upsert in one
/// transaction, so a (mail, user) pair can never be credited twice even if
/// the mail store lost the status update.
#[derive(Clone, Debug)]
pub struct SqlRewardLedger {
    db: Database,
}

impl SqlRewardLedger {
    /// Create a new ledger over the ledger store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Current balance of one resource type (0 if never credited).
    pub async fn balance(&self, user_id: i64, resource_type: i32) -> Result<i64> {
        let amount: Option<i64> = sqlx::query_scalar(
            "SELECT amount FROM user_balances WHERE user_id = ? AND resource_type = ?",
        )
        .bind(user_id)
        .bind(resource_type)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(amount.unwrap_or(0))
    }

    /// All balances of a player, ordered by resource type.
    pub async fn balances(&self, user_id: i64) -> Result<Vec<(i32, i64)>> {
        let rows = sqlx::query_as(
            "SELECT resource_type, amount FROM user_balances
             WHERE user_id = ? ORDER BY resource_type",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Look up the intent for a (mail, user) pair.
    pub async fn intent(&self, mail_id: i64, user_id: i64) -> Result<Option<IntentRecord>> {
        let row = sqlx::query_as::<_, IntentRow>(
            "SELECT mail_id, user_id, reward, created_at, settled_at, attempts, last_attempt_at
             FROM claim_intents WHERE mail_id = ? AND user_id = ?",
        )
        .bind(mail_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row.map(IntentRecord::from))
    }
}

#[async_trait]
impl RewardLedger for SqlRewardLedger {
    async fn credit_batch(&self, intent: &ClaimIntent) -> Result<CreditOutcome> {
        let now = now_millis();
        let mut tx = self.db.pool().begin().await?;

        let recorded = sqlx::query(
            "INSERT INTO claim_intents (mail_id, user_id, reward, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (mail_id, user_id) DO NOTHING",
        )
        .bind(intent.mail_id)
        .bind(intent.user_id)
        .bind(intent.reward.to_payload())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if recorded == 0 {
            tx.rollback().await?;
            debug!(
                mail_id = intent.mail_id,
                user_id = intent.user_id,
                "Claim intent already recorded, skipping credit"
            );
            return Ok(CreditOutcome::AlreadyCredited);
        }

        let items = intent.reward.items();
        if !items.is_empty() {
            let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO user_balances (user_id, resource_type, amount, updated_at) ",
            );
            query.push_values(items, |mut row, item| {
                row.push_bind(intent.user_id)
                    .push_bind(item.resource_type)
                    .push_bind(item.amount)
                    .push_bind(now);
            });
            query.push(
                " ON CONFLICT (user_id, resource_type) DO UPDATE
                    SET amount = user_balances.amount + excluded.amount,
                        updated_at = excluded.updated_at",
            );
            query.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(
            mail_id = intent.mail_id,
            user_id = intent.user_id,
            items = items.len(),
            "Ledger credited"
        );
        Ok(CreditOutcome::Credited)
    }

    async fn settle(&self, mail_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE claim_intents SET settled_at = ?
             WHERE mail_id = ? AND user_id = ? AND settled_at IS NULL",
        )
        .bind(now_millis())
        .bind(mail_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_attempt(&self, mail_id: i64, user_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE claim_intents SET attempts = attempts + 1, last_attempt_at = ?
             WHERE mail_id = ? AND user_id = ? AND settled_at IS NULL",
        )
        .bind(now_millis())
        .bind(mail_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn unsettled(&self, before: DateTime<Utc>, limit: u32) -> Result<Vec<IntentRecord>> {
        let rows = sqlx::query_as::<_, IntentRow>(
            "SELECT mail_id, user_id, reward, created_at, settled_at, attempts, last_attempt_at
             FROM claim_intents
             WHERE settled_at IS NULL AND created_at < ?
             ORDER BY attempts, created_at, mail_id, user_id
             LIMIT ?",
        )
        .bind(to_millis(&before))
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(IntentRecord::from).collect())
    }
}
