//! Mail module.
//!
//! This module provides the mail side of the service:
//! - Mail templates and distribution windows (catalog)
//! - Reward payload decoding and validation
//! - Per-player inbox rows and their status state machine
//! - Lazy sync of global mail into player inboxes
//! - The shared inbox visibility query

mod catalog;
mod query;
mod repository;
mod reward;
mod service;
mod sync;
mod types;

pub use catalog::MailCatalog;
pub use query::InboxQuery;
pub use repository::MailUserRepository;
pub use reward::{Reward, RewardFormatError, RewardItem};
pub use service::InboxService;
pub use sync::InboxSync;
pub use types::{
    InboxMail, Mail, MailDistribution, MailScope, MailStatus, MailUser, NewMail,
    MAX_CONTENT_LENGTH, MAX_TITLE_LENGTH,
};
