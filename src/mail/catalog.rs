//! Mail catalog: templates and their distribution windows.
//!
//! Publishing is the only write path. Once published, a mail and its
//! distribution are never modified.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool};
use tracing::info;

use super::types::{
    Mail, MailDistribution, MailScope, MailStatus, NewMail, MAX_CONTENT_LENGTH, MAX_TITLE_LENGTH,
};
use crate::datetime::{from_millis, now_millis, to_millis};
use crate::{MailRewardError, Result};

/// Rows per multi-row insert, keeping bind counts well under SQLite's limit.
pub(crate) const INSERT_CHUNK_ROWS: usize = 150;

#[derive(Debug, sqlx::FromRow)]
struct MailRow {
    id: i64,
    scope: String,
    title: String,
    content: String,
    reward: String,
    created_at: i64,
}

impl MailRow {
    fn into_mail(self) -> Result<Mail> {
        let scope = MailScope::parse(&self.scope).ok_or_else(|| {
            MailRewardError::Database(format!("unknown mail scope '{}'", self.scope))
        })?;
        Ok(Mail {
            id: self.id,
            scope,
            title: self.title,
            content: self.content,
            reward_payload: self.reward,
            created_at: from_millis(self.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DistributionRow {
    mail_id: i64,
    start_time: i64,
    end_time: i64,
}

impl From<DistributionRow> for MailDistribution {
    fn from(row: DistributionRow) -> Self {
        Self {
            mail_id: row.mail_id,
            start_time: from_millis(row.start_time),
            end_time: from_millis(row.end_time),
        }
    }
}

/// Repository for mail templates and distributions.
pub struct MailCatalog<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MailCatalog<'a> {
    /// Create a new MailCatalog with the given mail store pool.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Publish a mail.
    ///
    /// The mail, its distribution and (for personal scope) one unclaimed
    /// inbox row per recipient are written in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns a validation error if:
    /// - Title or content is empty or too long
    /// - The window ends at or before it starts
    /// - A personal mail has no recipients, or a global mail has some
    pub async fn publish(&self, new_mail: &NewMail) -> Result<Mail> {
        let title = new_mail.title.trim();
        if title.is_empty() {
            return Err(MailRewardError::Validation("title is required".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(MailRewardError::Validation(format!(
                "title must be at most {MAX_TITLE_LENGTH} characters"
            )));
        }

        let content = new_mail.content.trim();
        if content.is_empty() {
            return Err(MailRewardError::Validation("content is required".to_string()));
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(MailRewardError::Validation(format!(
                "content must be at most {MAX_CONTENT_LENGTH} characters"
            )));
        }

        if new_mail.end_time <= new_mail.start_time {
            return Err(MailRewardError::Validation(
                "end time must be after start time".to_string(),
            ));
        }

        let recipients: BTreeSet<i64> = new_mail.recipients.iter().copied().collect();
        match new_mail.scope {
            MailScope::Personal if recipients.is_empty() => {
                return Err(MailRewardError::Validation(
                    "personal mail requires at least one recipient".to_string(),
                ));
            }
            MailScope::Global if !recipients.is_empty() => {
                return Err(MailRewardError::Validation(
                    "global mail cannot name recipients".to_string(),
                ));
            }
            _ => {}
        }

        let now = now_millis();
        let start = to_millis(&new_mail.start_time);
        let end = to_millis(&new_mail.end_time);
        let payload = new_mail.reward.to_payload();

        let mut tx = self.pool.begin().await?;

        let mail_id = sqlx::query(
            "INSERT INTO mails (scope, title, content, reward, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(new_mail.scope.as_str())
        .bind(title)
        .bind(content)
        .bind(&payload)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO mail_distributions (mail_id, start_time, end_time) VALUES (?, ?, ?)")
            .bind(mail_id)
            .bind(start)
            .bind(end)
            .execute(&mut *tx)
            .await?;

        let recipients: Vec<i64> = recipients.into_iter().collect();
        for chunk in recipients.chunks(INSERT_CHUNK_ROWS) {
            let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO mail_users (mail_id, user_id, status, start_time, end_time, updated_at) ",
            );
            query.push_values(chunk, |mut row, user_id| {
                row.push_bind(mail_id)
                    .push_bind(*user_id)
                    .push_bind(MailStatus::Unclaimed.code())
                    .push_bind(start)
                    .push_bind(end)
                    .push_bind(now);
            });
            query.push(" ON CONFLICT (mail_id, user_id) DO NOTHING");
            query.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        info!(
            mail_id,
            scope = new_mail.scope.as_str(),
            recipients = recipients.len(),
            "Published mail"
        );

        Ok(Mail {
            id: mail_id,
            scope: new_mail.scope,
            title: title.to_string(),
            content: content.to_string(),
            reward_payload: payload,
            created_at: from_millis(now),
        })
    }

    /// Get a mail by ID.
    pub async fn get(&self, mail_id: i64) -> Result<Option<Mail>> {
        let row = sqlx::query_as::<_, MailRow>(
            "SELECT id, scope, title, content, reward, created_at FROM mails WHERE id = ?",
        )
        .bind(mail_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(MailRow::into_mail).transpose()
    }

    /// Get the distribution window of a mail.
    pub async fn distribution(&self, mail_id: i64) -> Result<Option<MailDistribution>> {
        let row = sqlx::query_as::<_, DistributionRow>(
            "SELECT mail_id, start_time, end_time FROM mail_distributions WHERE mail_id = ?",
        )
        .bind(mail_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(MailDistribution::from))
    }

    /// Global distributions whose window contains `now`.
    pub async fn active_global_distributions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<MailDistribution>> {
        let now = to_millis(&now);
        let rows = sqlx::query_as::<_, DistributionRow>(
            "SELECT d.mail_id, d.start_time, d.end_time
             FROM mail_distributions d
             INNER JOIN mails m ON m.id = d.mail_id
             WHERE m.scope = 'global' AND d.start_time <= ? AND d.end_time > ?
             ORDER BY d.mail_id",
        )
        .bind(now)
        .bind(now)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(MailDistribution::from).collect())
    }
}
