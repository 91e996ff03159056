//! API handlers for the mail service.

pub mod mail;

pub use mail::*;

use std::sync::Arc;
use std::time::Duration;

use crate::claim::{ClaimCoordinator, SqlLockStore};
use crate::config::Config;
use crate::db::{Database, Store};
use crate::ledger::SqlRewardLedger;
use crate::mail::InboxService;
use crate::notify::{GameServerNotifier, NoopNotifier, RewardNotifier};
use crate::Result;

/// Shared application state.
///
/// Store handles are opened once at startup and cloned into the services.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Inbox reads and status updates.
    pub inbox: InboxService,
    /// Reward claims.
    pub claims: ClaimCoordinator,
}

impl AppState {
    /// Create a new application state.
    pub fn new(inbox: InboxService, claims: ClaimCoordinator) -> Self {
        Self { inbox, claims }
    }

    /// Open the three stores named in `config` and wire the services.
    pub async fn open(config: &Config) -> Result<Self> {
        let mail_db = Database::open(&config.database.mail_path, Store::Mail).await?;
        let ledger_db = Database::open(&config.database.ledger_path, Store::Ledger).await?;
        let lock_db = Database::open(&config.database.lock_path, Store::Lock).await?;

        let notifier: Arc<dyn RewardNotifier> = if config.game_server.enabled {
            let notifier = GameServerNotifier::new(&config.game_server)?;
            tracing::info!(url = notifier.url(), "Award notices enabled");
            Arc::new(notifier)
        } else {
            tracing::info!("Award notices disabled");
            Arc::new(NoopNotifier)
        };

        let claims = ClaimCoordinator::new(
            mail_db.clone(),
            Arc::new(SqlLockStore::new(lock_db)),
            Arc::new(SqlRewardLedger::new(ledger_db)),
            notifier,
        )
        .with_lock_ttl(Duration::from_secs(config.claim.lock_ttl_secs));

        Ok(Self::new(InboxService::new(mail_db), claims))
    }
}
