//! Database schema and migrations.
//!
//! Each physical store has its own migration list. The mail store and the
//! reward ledger never share a database, so nothing here may assume a join
//! across them.

/// A physical store and the migrations that shape it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    /// Mail templates, distributions and per-user mail status.
    Mail,
    /// Resource balances and claim intents.
    Ledger,
    /// Ephemeral per-(user, mail) claim locks.
    Lock,
}

impl Store {
    /// Migrations for this store, applied in order.
    pub fn migrations(&self) -> &'static [&'static str] {
        match self {
            Store::Mail => MAIL_MIGRATIONS,
            Store::Ledger => LEDGER_MIGRATIONS,
            Store::Lock => LOCK_MIGRATIONS,
        }
    }

    /// Name used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Store::Mail => "mail",
            Store::Ledger => "ledger",
            Store::Lock => "lock",
        }
    }
}

/// Mail store migrations.
///
/// Times are unix milliseconds. `mail_users.status` is
/// 0 = unclaimed, 1 = read, 2 = claimed, 3 = deleted.
pub const MAIL_MIGRATIONS: &[&str] = &[
    // v1: mail templates and distribution windows
    r#"
CREATE TABLE mails (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    scope       TEXT NOT NULL CHECK (scope IN ('global', 'personal')),
    title       TEXT NOT NULL,
    content     TEXT NOT NULL,
    reward      TEXT NOT NULL DEFAULT '',   -- {"props":[{"id":..,"cnt":..}]} or empty
    created_at  INTEGER NOT NULL
);

CREATE TABLE mail_distributions (
    mail_id     INTEGER PRIMARY KEY REFERENCES mails(id) ON DELETE CASCADE,
    start_time  INTEGER NOT NULL,
    end_time    INTEGER NOT NULL,
    CHECK (end_time > start_time)
);

CREATE INDEX idx_mail_distributions_window ON mail_distributions(start_time, end_time);
"#,
    // v2: per-user inbox rows
    r#"
CREATE TABLE mail_users (
    mail_id     INTEGER NOT NULL REFERENCES mails(id) ON DELETE CASCADE,
    user_id     INTEGER NOT NULL,
    status      INTEGER NOT NULL DEFAULT 0 CHECK (status BETWEEN 0 AND 3),
    start_time  INTEGER NOT NULL,
    end_time    INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL,
    PRIMARY KEY (mail_id, user_id)
);

CREATE INDEX idx_mail_users_user ON mail_users(user_id, status);
"#,
];

/// Reward ledger migrations.
pub const LEDGER_MIGRATIONS: &[&str] = &[
    // v1: additive balances
    r#"
CREATE TABLE user_balances (
    user_id         INTEGER NOT NULL,
    resource_type   INTEGER NOT NULL,
    amount          INTEGER NOT NULL DEFAULT 0,
    updated_at      INTEGER NOT NULL,
    PRIMARY KEY (user_id, resource_type)
);
"#,
    // v2: one intent per (mail, user), written with the credit
    r#"
CREATE TABLE claim_intents (
    mail_id     INTEGER NOT NULL,
    user_id     INTEGER NOT NULL,
    reward      TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    settled_at  INTEGER,
    PRIMARY KEY (mail_id, user_id)
);

CREATE INDEX idx_claim_intents_unsettled ON claim_intents(settled_at, created_at);
"#,
    // v3: failed settle attempts, so a stuck intent yields to newer ones
    r#"
ALTER TABLE claim_intents ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0;
ALTER TABLE claim_intents ADD COLUMN last_attempt_at INTEGER;

DROP INDEX idx_claim_intents_unsettled;
CREATE INDEX idx_claim_intents_unsettled ON claim_intents(settled_at, attempts, created_at);
"#,
];

/// Lock store migrations.
pub const LOCK_MIGRATIONS: &[&str] = &[
    // v1: claim locks
    r#"
CREATE TABLE claim_locks (
    lock_key    TEXT PRIMARY KEY,
    owner_token TEXT NOT NULL,
    expires_at  INTEGER NOT NULL
);
"#,
];
