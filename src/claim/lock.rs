//! Per-(user, mail) claim locks.
//!
//! A lock is a row keyed by `mail_award_lock:{user}:{mail}` holding a random
//! owner token and an expiry. Acquire and release are each a single
//! conditional statement, so there is no read-then-write window.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::datetime::now_millis;
use crate::db::Database;
use crate::Result;

/// Prefix of every claim lock key.
pub const LOCK_KEY_PREFIX: &str = "mail_award_lock";

/// Default lock time-to-live.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// An owned claim lock: the key plus the token proving ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimLock {
    key: String,
    token: String,
}

impl ClaimLock {
    /// A fresh lock for the (user, mail) pair with a new random token.
    pub fn new(user_id: i64, mail_id: i64) -> Self {
        Self {
            key: format!("{LOCK_KEY_PREFIX}:{user_id}:{mail_id}"),
            token: Uuid::new_v4().to_string(),
        }
    }

    /// Lock key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owner token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Store of TTL-bound locks with owner-checked release.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Take the lock if nobody holds it (or the holder's TTL has passed).
    /// Returns whether the lock is now held by `token`.
    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// Release the lock only if `token` still owns it.
    /// Returns whether a lock was released.
    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool>;

    /// Drop expired locks. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Lock store backed by a SQLite table.
#[derive(Clone, Debug)]
pub struct SqlLockStore {
    db: Database,
}

impl SqlLockStore {
    /// Create a new lock store over the lock database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LockStore for SqlLockStore {
    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let now = now_millis();
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_millis);

        // An expired row is taken over in place; a live one is left alone.
        let result = sqlx::query(
            "INSERT INTO claim_locks (lock_key, owner_token, expires_at) VALUES (?, ?, ?)
             ON CONFLICT (lock_key) DO UPDATE
                SET owner_token = excluded.owner_token, expires_at = excluded.expires_at
              WHERE claim_locks.expires_at <= ?",
        )
        .bind(key)
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let acquired = result.rows_affected() == 1;
        debug!(key, acquired, "Lock acquire");
        Ok(acquired)
    }

    async fn release_if_owner(&self, key: &str, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM claim_locks WHERE lock_key = ? AND owner_token = ?")
            .bind(key)
            .bind(token)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM claim_locks WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
