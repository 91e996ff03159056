//! Database module.
//!
//! Each store (mail, ledger, lock) is an independent SQLite database behind
//! a sqlx pool, opened once at startup and handed to the components that
//! need it.

mod schema;

pub use schema::{Store, LEDGER_MIGRATIONS, LOCK_MIGRATIONS, MAIL_MIGRATIONS};

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::{MailRewardError, Result};

/// Maximum pooled connections for file-backed stores.
const MAX_CONNECTIONS: u32 = 8;

/// Database wrapper for managing a SQLite pool and its migrations.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    store: Store,
}

impl Database {
    /// Open a database at the specified path.
    ///
    /// If the database file doesn't exist, it will be created.
    /// Migrations for `store` are automatically applied.
    pub async fn open(path: impl AsRef<Path>, store: Store) -> Result<Self> {
        let path = path.as_ref();
        info!(store = store.as_str(), "Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| MailRewardError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool, store };
        db.migrate().await?;

        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// The pool is pinned to a single connection that never idles out, since
    /// every new SQLite memory connection would otherwise see an empty database.
    pub async fn open_in_memory(store: Store) -> Result<Self> {
        debug!(store = store.as_str(), "Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| MailRewardError::DatabaseConnection(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| MailRewardError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool, store };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Which store this database holds.
    pub fn store(&self) -> Store {
        self.store
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        if !self.table_exists("schema_version").await? {
            return Ok(0);
        }

        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;

        Ok(version)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;
        let migrations = self.store.migrations();

        if current_version as usize >= migrations.len() {
            debug!(
                store = self.store.as_str(),
                "Database is up to date (version {})", current_version
            );
            return Ok(());
        }

        info!(
            store = self.store.as_str(),
            "Migrating database from version {} to {}",
            current_version,
            migrations.len()
        );

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        for (i, migration) in migrations.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            info!(store = self.store.as_str(), "Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;

            sqlx::query(migration).execute(&mut *tx).await?;

            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(crate::datetime::now_millis())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            debug!("Migration v{} applied successfully", version);
        }

        info!(
            store = self.store.as_str(),
            "Database migration complete (now at version {})",
            migrations.len()
        );
        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Close the pool, waiting for in-flight connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("store", &self.store)
            .finish()
    }
}
