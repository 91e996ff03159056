//! Inbox service.
//!
//! High-level inbox reads and status changes. Reads sync global mail first;
//! a failed sync is logged and the read proceeds, since unsynced global
//! mail is still visible through its distribution window.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::query::InboxQuery;
use super::repository::MailUserRepository;
use super::sync::InboxSync;
use super::types::InboxMail;
use crate::db::Database;
use crate::{MailRewardError, Result};

/// Service for inbox operations.
#[derive(Clone, Debug)]
pub struct InboxService {
    db: Database,
}

impl InboxService {
    /// Create a new InboxService over the mail store.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The mail store.
    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn sync_quietly(&self, user_id: i64) {
        if let Err(e) = InboxSync::new(self.db.pool()).sync(user_id).await {
            warn!(user_id, error = %e, "Inbox sync failed");
        }
    }

    /// List visible mail for a player, newest first.
    pub async fn list(&self, user_id: i64) -> Result<Vec<InboxMail>> {
        self.sync_quietly(user_id).await;
        InboxQuery::for_user(user_id).fetch_all(self.db.pool()).await
    }

    /// Get one visible mail.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the mail does not exist, is outside its window,
    /// is deleted, or is not addressed to the player.
    pub async fn detail(&self, user_id: i64, mail_id: i64) -> Result<InboxMail> {
        self.sync_quietly(user_id).await;
        InboxQuery::for_user(user_id)
            .mail(mail_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| MailRewardError::NotFound("mail".to_string()))
    }

    /// Mark a mail read.
    ///
    /// Only an unclaimed row changes. Returns whether anything changed;
    /// "nothing to do" is not an error.
    pub async fn mark_read(&self, user_id: i64, mail_id: i64) -> Result<bool> {
        let changed = MailUserRepository::new(self.db.pool())
            .mark_read(mail_id, user_id, Utc::now())
            .await?;
        debug!(user_id, mail_id, changed, "Mark read");
        Ok(changed)
    }

    /// Soft-delete a visible mail. Deletion is terminal.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the mail is not visible to the player.
    pub async fn delete(&self, user_id: i64, mail_id: i64) -> Result<()> {
        let now = Utc::now();
        let inbox = InboxQuery::for_user(user_id)
            .mail(mail_id)
            .at(now)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| MailRewardError::NotFound("mail".to_string()))?;

        MailUserRepository::new(self.db.pool())
            .mark_deleted(mail_id, user_id, (inbox.start_time, inbox.end_time), now)
            .await?;
        info!(user_id, mail_id, "Mail deleted by player");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::mail::{MailCatalog, MailStatus, NewMail};
    use chrono::Duration;

    async fn setup() -> (InboxService, i64) {
        let db = Database::open_in_memory(Store::Mail).await.unwrap();
        let now = Utc::now();
        let mail = MailCatalog::new(db.pool())
            .publish(&NewMail::global("Welcome", "Hello", now - Duration::hours(1), now + Duration::hours(1)))
            .await
            .unwrap();
        (InboxService::new(db), mail.id)
    }

    #[tokio::test]
    async fn test_list_syncs() {
        let (service, mail_id) = setup().await;

        let inbox = service.list(1).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].mail.id, mail_id);
        assert!(inbox[0].synced);
    }

    #[tokio::test]
    async fn test_detail_not_found() {
        let (service, _) = setup().await;
        let result = service.detail(1, 999).await;
        assert!(matches!(result, Err(MailRewardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_read_after_detail() {
        let (service, mail_id) = setup().await;

        service.detail(1, mail_id).await.unwrap();
        assert!(service.mark_read(1, mail_id).await.unwrap());
        assert!(!service.mark_read(1, mail_id).await.unwrap());

        let mail = service.detail(1, mail_id).await.unwrap();
        assert_eq!(mail.status, MailStatus::Read);
    }

    #[tokio::test]
    async fn test_mark_read_expired_mail_is_noop() {
        let (service, _) = setup().await;
        let now = Utc::now();
        let mail = MailCatalog::new(service.database().pool())
            .publish(&NewMail::personal(
                "Expired",
                "Gone",
                now - Duration::hours(2),
                now - Duration::hours(1),
                vec![42],
            ))
            .await
            .unwrap();

        assert!(service.list(42).await.unwrap().iter().all(|m| m.mail.id != mail.id));
        assert!(!service.mark_read(42, mail.id).await.unwrap());

        let row = MailUserRepository::new(service.database().pool())
            .get(mail.id, 42)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, MailStatus::Unclaimed);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_mail_is_noop() {
        let (service, _) = setup().await;
        assert!(!service.mark_read(1, 999).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_hides_mail() {
        let (service, mail_id) = setup().await;

        // Works even before the row is synced
        service.delete(1, mail_id).await.unwrap();

        assert!(service.list(1).await.unwrap().is_empty());
        assert!(matches!(
            service.detail(1, mail_id).await,
            Err(MailRewardError::NotFound(_))
        ));
        assert!(matches!(
            service.delete(1, mail_id).await,
            Err(MailRewardError::NotFound(_))
        ));
    }
}
