//! Claim coordinator.
//!
//! A claim runs inside a per-(user, mail) lock:
//!
//! 1. acquire the lock, or fail with `Busy`
//! 2. load the mail, window and status through the inbox query
//! 3. answer `AlreadyReceived` if the status is already `Claimed`
//! 4. decode the reward payload
//! 5. credit the ledger (intent + balances, one transaction)
//! 6. move the status to `Claimed` on the mail store
//! 7. notify the game server
//! 8. release the lock if still owned
//!
//! Everything before step 5 is read-only. Once step 5 commits the claim has
//! succeeded for the player; a failure in step 6 is logged for
//! reconciliation and the unsettled intent lets [`ClaimCoordinator::reconcile`]
//! repair the status later.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::lock::{ClaimLock, LockStore, DEFAULT_LOCK_TTL};
use crate::db::Database;
use crate::ledger::{ClaimIntent, CreditOutcome, IntentRecord, RewardLedger};
use crate::mail::{InboxMail, InboxQuery, MailCatalog, MailStatus, MailUserRepository, RewardItem};
use crate::notify::{RewardNotifier, RewardSummary};
use crate::{MailRewardError, Result};

/// Result of a claim that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The reward was credited by this call.
    Granted {
        /// Items credited.
        items: Vec<RewardItem>,
        /// Game server notice id, when one was assigned.
        notice_id: Option<i64>,
    },
    /// The reward had been credited before; nothing changed.
    AlreadyReceived,
}

/// Counts from one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Intents whose mail status was confirmed and which are now settled.
    pub settled: u64,
    /// Intents that could not be settled this time.
    pub failed: u64,
}

/// Coordinates exactly-once reward claims across the lock, ledger and mail
/// stores.
#[derive(Clone)]
pub struct ClaimCoordinator {
    mail_db: Database,
    locks: Arc<dyn LockStore>,
    ledger: Arc<dyn RewardLedger>,
    notifier: Arc<dyn RewardNotifier>,
    lock_ttl: Duration,
}

impl ClaimCoordinator {
    /// Create a new coordinator from its collaborators.
    pub fn new(
        mail_db: Database,
        locks: Arc<dyn LockStore>,
        ledger: Arc<dyn RewardLedger>,
        notifier: Arc<dyn RewardNotifier>,
    ) -> Self {
        Self {
            mail_db,
            locks,
            ledger,
            notifier,
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Override the lock TTL.
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    /// Lock TTL in use.
    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Claim the reward of `mail_id` for `user_id`.
    ///
    /// # Errors
    ///
    /// - `Busy` if another claim for the same pair holds the lock
    /// - `NotFound` if the mail is not visible to the player right now
    /// - `RewardFormat` if the stored payload cannot be decoded
    /// - `Database` if the ledger credit failed (nothing was credited)
    pub async fn claim(&self, user_id: i64, mail_id: i64) -> Result<ClaimOutcome> {
        let lock = ClaimLock::new(user_id, mail_id);
        if !self
            .locks
            .acquire_if_absent(lock.key(), lock.token(), self.lock_ttl)
            .await?
        {
            debug!(user_id, mail_id, "Claim lock busy");
            return Err(MailRewardError::Busy(
                "a claim for this mail is already in progress".to_string(),
            ));
        }

        let result = self.claim_locked(user_id, mail_id).await;

        match self.locks.release_if_owner(lock.key(), lock.token()).await {
            Ok(true) => {}
            Ok(false) => warn!(
                user_id,
                mail_id, "Claim lock expired before release; ownership had moved"
            ),
            Err(e) => warn!(user_id, mail_id, error = %e, "Failed to release claim lock"),
        }

        result
    }

    async fn claim_locked(&self, user_id: i64, mail_id: i64) -> Result<ClaimOutcome> {
        let now = Utc::now();
        let inbox = InboxQuery::for_user(user_id)
            .mail(mail_id)
            .at(now)
            .fetch_optional(self.mail_db.pool())
            .await?
            .ok_or_else(|| MailRewardError::NotFound("mail".to_string()))?;

        if inbox.status >= MailStatus::Claimed {
            debug!(user_id, mail_id, "Reward already received");
            return Ok(ClaimOutcome::AlreadyReceived);
        }

        let reward = inbox.mail.reward().map_err(|e| {
            error!(user_id, mail_id, error = %e, "Malformed reward payload");
            e
        })?;

        let intent = ClaimIntent::new(mail_id, user_id, reward);
        match self.ledger.credit_batch(&intent).await {
            Ok(CreditOutcome::Credited) => {}
            Ok(CreditOutcome::AlreadyCredited) => {
                warn!(
                    user_id,
                    mail_id, "Reward was credited earlier but status lagged; repairing status"
                );
                self.commit_status(user_id, &inbox, now).await;
                return Ok(ClaimOutcome::AlreadyReceived);
            }
            Err(e) => {
                error!(user_id, mail_id, error = %e, "Ledger credit failed");
                return Err(e);
            }
        }

        self.commit_status(user_id, &inbox, now).await;

        let items = intent.reward.items().to_vec();
        let notice_id = if items.is_empty() {
            None
        } else {
            self.send_notice(user_id, &items).await
        };

        info!(user_id, mail_id, items = items.len(), "Reward granted");
        Ok(ClaimOutcome::Granted { items, notice_id })
    }

    /// Move the inbox row to `Claimed` and settle the intent. Failures are
    /// logged, never returned: the ledger has already committed.
    async fn commit_status(&self, user_id: i64, inbox: &InboxMail, now: DateTime<Utc>) {
        let mail_id = inbox.mail.id;
        let repo = MailUserRepository::new(self.mail_db.pool());

        if let Err(e) = repo
            .mark_claimed(mail_id, user_id, (inbox.start_time, inbox.end_time), now)
            .await
        {
            error!(
                user_id,
                mail_id,
                error = %e,
                "Reward credited but mail status update failed; needs reconciliation"
            );
            return;
        }

        if let Err(e) = self.ledger.settle(mail_id, user_id).await {
            warn!(user_id, mail_id, error = %e, "Failed to settle claim intent");
        }
    }

    async fn send_notice(&self, user_id: i64, items: &[RewardItem]) -> Option<i64> {
        let summary = RewardSummary::new(user_id, items.to_vec());
        match self.notifier.notify(&summary).await {
            Ok(notice_id) => notice_id,
            Err(e) => {
                warn!(user_id, error = %e, "Award notice failed");
                None
            }
        }
    }

    /// Settle intents whose status update was lost.
    ///
    /// For every unsettled intent older than `older_than`, moves the inbox
    /// row to `Claimed` (never lowering it) and marks the intent settled.
    /// An intent that cannot be settled has its attempt count raised, which
    /// moves it behind intents that have not failed yet.
    pub async fn reconcile(&self, older_than: Duration, limit: u32) -> Result<ReconcileReport> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        let pending = self.ledger.unsettled(cutoff, limit).await?;

        let mut report = ReconcileReport::default();

        for intent in pending {
            match self.settle_intent(&intent).await {
                Ok(()) => {
                    info!(
                        user_id = intent.user_id,
                        mail_id = intent.mail_id,
                        "Reconciled claim status"
                    );
                    report.settled += 1;
                }
                Err(e) => {
                    error!(
                        user_id = intent.user_id,
                        mail_id = intent.mail_id,
                        attempts = intent.attempts + 1,
                        error = %e,
                        "Could not settle claim intent"
                    );
                    if let Err(e) = self
                        .ledger
                        .record_attempt(intent.mail_id, intent.user_id)
                        .await
                    {
                        warn!(mail_id = intent.mail_id, error = %e, "Failed to record settle attempt");
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn settle_intent(&self, intent: &IntentRecord) -> Result<()> {
        let dist = MailCatalog::new(self.mail_db.pool())
            .distribution(intent.mail_id)
            .await?
            .ok_or_else(|| MailRewardError::NotFound("mail distribution".to_string()))?;

        MailUserRepository::new(self.mail_db.pool())
            .mark_claimed(
                intent.mail_id,
                intent.user_id,
                (dist.start_time, dist.end_time),
                Utc::now(),
            )
            .await?;
        self.ledger.settle(intent.mail_id, intent.user_id).await?;
        Ok(())
    }

    /// Drop expired claim locks.
    pub async fn purge_expired_locks(&self) -> Result<u64> {
        self.locks.purge_expired().await
    }
}

impl std::fmt::Debug for ClaimCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimCoordinator")
            .field("mail_db", &self.mail_db)
            .field("lock_ttl", &self.lock_ttl)
            .finish()
    }
}
