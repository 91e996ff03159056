//! Lazy materialization of global mail into a player's inbox.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use super::catalog::MailCatalog;
use super::repository::MailUserRepository;
use super::types::MailDistribution;
use crate::Result;

/// Reconciles active global campaigns into a player's inbox rows.
///
/// Safe to run any number of times, concurrently: the insert is guarded by
/// the (mail, user) key, so every run after the first is a no-op.
pub struct InboxSync<'a> {
    pool: &'a SqlitePool,
}

impl<'a> InboxSync<'a> {
    /// Create a new InboxSync over the mail store.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Sync as of now. Returns the number of rows created.
    pub async fn sync(&self, user_id: i64) -> Result<u64> {
        self.sync_at(user_id, Utc::now()).await
    }

    /// Sync as of `now`. Returns the number of rows created.
    pub async fn sync_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64> {
        let active = MailCatalog::new(self.pool)
            .active_global_distributions(now)
            .await?;
        if active.is_empty() {
            return Ok(0);
        }

        let repo = MailUserRepository::new(self.pool);
        let existing: HashSet<i64> = repo.mail_ids_for_user(user_id).await?.into_iter().collect();

        let missing: Vec<MailDistribution> = active
            .into_iter()
            .filter(|d| !existing.contains(&d.mail_id))
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let inserted = repo.insert_unclaimed(user_id, &missing, now).await?;
        debug!(user_id, inserted, "Synced global mail into inbox");
        Ok(inserted)
    }
}
