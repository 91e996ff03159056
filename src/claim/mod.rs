//! Exactly-once reward claims.
//!
//! A claim is serialized per (user, mail) by a TTL lock, credited through
//! the reward ledger and then recorded on the mail store.

mod coordinator;
mod lock;

pub use coordinator::{ClaimCoordinator, ClaimOutcome, ReconcileReport};
pub use lock::{ClaimLock, LockStore, SqlLockStore, DEFAULT_LOCK_TTL, LOCK_KEY_PREFIX};
