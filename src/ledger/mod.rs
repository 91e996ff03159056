//! Reward ledger.
//!
//! Balances live in their own database. Credits are additive batch upserts
//! keyed by (user, resource type), recorded together with a claim intent
//! keyed by (mail, user).

mod repository;
mod types;

pub use repository::SqlRewardLedger;
pub use types::{ClaimIntent, CreditOutcome, IntentRecord, RewardLedger};
