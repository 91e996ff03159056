//! Inbox row repository.
//!
//! Every status write is conditional on the current status, so concurrent
//! callers can only ever move a row forward.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool};

use super::catalog::INSERT_CHUNK_ROWS;
use super::types::{MailDistribution, MailStatus, MailUser};
use crate::datetime::{from_millis, to_millis};
use crate::{MailRewardError, Result};

#[derive(Debug, sqlx::FromRow)]
struct MailUserRow {
    mail_id: i64,
    user_id: i64,
    status: i64,
    start_time: i64,
    end_time: i64,
    updated_at: i64,
}

impl MailUserRow {
    fn into_mail_user(self) -> Result<MailUser> {
        let status = MailStatus::from_code(self.status).ok_or_else(|| {
            MailRewardError::Database(format!("unknown mail status {}", self.status))
        })?;
        Ok(MailUser {
            mail_id: self.mail_id,
            user_id: self.user_id,
            status,
            start_time: from_millis(self.start_time),
            end_time: from_millis(self.end_time),
            updated_at: from_millis(self.updated_at),
        })
    }
}

/// Repository for per-user mail rows.
pub struct MailUserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MailUserRepository<'a> {
    /// Create a new MailUserRepository with the given mail store pool.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a single inbox row.
    pub async fn get(&self, mail_id: i64, user_id: i64) -> Result<Option<MailUser>> {
        let row = sqlx::query_as::<_, MailUserRow>(
            "SELECT mail_id, user_id, status, start_time, end_time, updated_at
             FROM mail_users WHERE mail_id = ? AND user_id = ?",
        )
        .bind(mail_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(MailUserRow::into_mail_user).transpose()
    }

    /// IDs of every mail that already has a row for this user, in any status.
    pub async fn mail_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT mail_id FROM mail_users WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }

    /// Insert unclaimed rows for the given distributions, copying each window.
    ///
    /// Rows that already exist are left untouched. Returns the number of rows
    /// actually inserted.
    pub async fn insert_unclaimed(
        &self,
        user_id: i64,
        distributions: &[MailDistribution],
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let now = to_millis(&now);
        let mut inserted = 0;

        for chunk in distributions.chunks(INSERT_CHUNK_ROWS) {
            let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO mail_users (mail_id, user_id, status, start_time, end_time, updated_at) ",
            );
            query.push_values(chunk, |mut row, dist| {
                row.push_bind(dist.mail_id)
                    .push_bind(user_id)
                    .push_bind(MailStatus::Unclaimed.code())
                    .push_bind(to_millis(&dist.start_time))
                    .push_bind(to_millis(&dist.end_time))
                    .push_bind(now);
            });
            query.push(" ON CONFLICT (mail_id, user_id) DO NOTHING");

            inserted += query.build().execute(self.pool).await?.rows_affected();
        }

        Ok(inserted)
    }

    /// Move `Unclaimed -> Read` while `now` is inside the row's window.
    /// Returns whether a row changed.
    pub async fn mark_read(&self, mail_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let now_ms = to_millis(&now);
        let result = sqlx::query(
            "UPDATE mail_users SET status = ?, updated_at = ?
             WHERE mail_id = ? AND user_id = ? AND status = ?
               AND start_time <= ? AND end_time > ?",
        )
        .bind(MailStatus::Read.code())
        .bind(now_ms)
        .bind(mail_id)
        .bind(user_id)
        .bind(MailStatus::Unclaimed.code())
        .bind(now_ms)
        .bind(now_ms)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move the row to `Claimed` if it is below it, creating the row with
    /// the given window when it has not been synced yet.
    ///
    /// Returns whether a row was inserted or changed.
    pub async fn mark_claimed(
        &self,
        mail_id: i64,
        user_id: i64,
        window: (DateTime<Utc>, DateTime<Utc>),
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.upsert_status(mail_id, user_id, MailStatus::Claimed, window, now)
            .await
    }

    /// Move the row to `Deleted`, creating it when not yet synced.
    ///
    /// Returns whether a row was inserted or changed.
    pub async fn mark_deleted(
        &self,
        mail_id: i64,
        user_id: i64,
        window: (DateTime<Utc>, DateTime<Utc>),
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.upsert_status(mail_id, user_id, MailStatus::Deleted, window, now)
            .await
    }

    async fn upsert_status(
        &self,
        mail_id: i64,
        user_id: i64,
        status: MailStatus,
        (start, end): (DateTime<Utc>, DateTime<Utc>),
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO mail_users (mail_id, user_id, status, start_time, end_time, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (mail_id, user_id) DO UPDATE
                SET status = excluded.status, updated_at = excluded.updated_at
              WHERE mail_users.status < excluded.status",
        )
        .bind(mail_id)
        .bind(user_id)
        .bind(status.code())
        .bind(to_millis(&start))
        .bind(to_millis(&end))
        .bind(to_millis(&now))
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
