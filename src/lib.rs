//! Mail reward service.
//!
//! Players receive campaign mail (global broadcasts or personal messages)
//! carrying optional item rewards, and claim each reward exactly once. Global
//! mail is materialized into a player's inbox lazily on read; claims are
//! serialized per (player, mail) and credited to a ledger kept in its own
//! database.

pub mod claim;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod mail;
pub mod notify;
pub mod web;

pub use claim::{ClaimCoordinator, ClaimOutcome};
pub use config::Config;
pub use db::{Database, Store};
pub use error::{MailRewardError, Result};
pub use ledger::SqlRewardLedger;
pub use mail::{InboxService, MailCatalog, NewMail, Reward, RewardItem};
