//! Inbox visibility query.
//!
//! Listing, detail and the claim path all ask the same question: which
//! mails can this player see right now? [`InboxQuery`] answers it with one
//! parameterized statement.
//!
//! A mail is visible when
//! - the player has an inbox row, or it is a global mail with a
//!   distribution (not yet synced rows fall back to the distribution window),
//! - its status is below `Deleted`,
//! - `start_time <= now < end_time` for the effective window.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::types::{InboxMail, Mail, MailScope, MailStatus};
use crate::datetime::{from_millis, now_millis, to_millis};
use crate::{MailRewardError, Result};

#[derive(Debug, sqlx::FromRow)]
struct InboxRow {
    id: i64,
    scope: String,
    title: String,
    content: String,
    reward: String,
    created_at: i64,
    status: i64,
    start_time: i64,
    end_time: i64,
    synced: bool,
}

impl InboxRow {
    fn into_inbox_mail(self) -> Result<InboxMail> {
        let scope = MailScope::parse(&self.scope).ok_or_else(|| {
            MailRewardError::Database(format!("unknown mail scope '{}'", self.scope))
        })?;
        let status = MailStatus::from_code(self.status).ok_or_else(|| {
            MailRewardError::Database(format!("unknown mail status {}", self.status))
        })?;
        Ok(InboxMail {
            mail: Mail {
                id: self.id,
                scope,
                title: self.title,
                content: self.content,
                reward_payload: self.reward,
                created_at: from_millis(self.created_at),
            },
            status,
            start_time: from_millis(self.start_time),
            end_time: from_millis(self.end_time),
            synced: self.synced,
        })
    }
}

/// Builder for inbox visibility queries.
#[derive(Debug, Clone)]
pub struct InboxQuery {
    user_id: i64,
    mail_id: Option<i64>,
    now: i64,
    limit: Option<u32>,
}

impl InboxQuery {
    /// Query the inbox of `user_id` as of now.
    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id,
            mail_id: None,
            now: now_millis(),
            limit: None,
        }
    }

    /// Restrict to a single mail.
    pub fn mail(mut self, mail_id: i64) -> Self {
        self.mail_id = Some(mail_id);
        self
    }

    /// Evaluate windows at `now` instead of the current time.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = to_millis(&now);
        self
    }

    /// Cap the number of rows returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn build(&self) -> QueryBuilder<'static, Sqlite> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT m.id, m.scope, m.title, m.content, m.reward, m.created_at,
                    COALESCE(mu.status, 0) AS status,
                    COALESCE(mu.start_time, d.start_time) AS start_time,
                    COALESCE(mu.end_time, d.end_time) AS end_time,
                    mu.mail_id IS NOT NULL AS synced
             FROM mails m
             LEFT JOIN mail_users mu ON mu.mail_id = m.id AND mu.user_id = ",
        );
        query.push_bind(self.user_id);
        query.push(
            " LEFT JOIN mail_distributions d ON d.mail_id = m.id
             WHERE (mu.mail_id IS NOT NULL OR (m.scope = 'global' AND d.mail_id IS NOT NULL))
               AND COALESCE(mu.status, 0) < ",
        );
        query.push_bind(MailStatus::Deleted.code());
        query.push(" AND COALESCE(mu.start_time, d.start_time) <= ");
        query.push_bind(self.now);
        query.push(" AND COALESCE(mu.end_time, d.end_time) > ");
        query.push_bind(self.now);

        if let Some(mail_id) = self.mail_id {
            query.push(" AND m.id = ");
            query.push_bind(mail_id);
        }

        query.push(" ORDER BY m.created_at DESC, m.id DESC");

        if let Some(limit) = self.limit {
            query.push(" LIMIT ");
            query.push_bind(i64::from(limit));
        }

        query
    }

    /// Fetch all visible mails, newest first.
    pub async fn fetch_all(&self, pool: &SqlitePool) -> Result<Vec<InboxMail>> {
        let mut query = self.build();
        let rows = query.build_query_as::<InboxRow>().fetch_all(pool).await?;
        rows.into_iter().map(InboxRow::into_inbox_mail).collect()
    }

    /// Fetch the first visible mail, if any.
    pub async fn fetch_optional(&self, pool: &SqlitePool) -> Result<Option<InboxMail>> {
        let mut query = self.build();
        let row = query
            .build_query_as::<InboxRow>()
            .fetch_optional(pool)
            .await?;
        row.map(InboxRow::into_inbox_mail).transpose()
    }
}
