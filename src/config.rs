//! Configuration module for the mail reward service.

use serde::Deserialize;
use std::path::Path;

use crate::{MailRewardError, Result};

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the Web API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret shared with the login service.
    #[serde(default)]
    pub jwt_secret: String,
    /// Request deadline in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Database configuration.
///
/// The mail store and the reward ledger are physically separate databases.
/// The lock store may share a file with neither.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the mail/status SQLite database.
    #[serde(default = "default_mail_path")]
    pub mail_path: String,
    /// Path to the reward ledger SQLite database.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,
    /// Path to the claim lock SQLite database.
    #[serde(default = "default_lock_path")]
    pub lock_path: String,
}

fn default_mail_path() -> String {
    "data/mail.db".to_string()
}

fn default_ledger_path() -> String {
    "data/ledger.db".to_string()
}

fn default_lock_path() -> String {
    "data/lock.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            mail_path: default_mail_path(),
            ledger_path: default_ledger_path(),
            lock_path: default_lock_path(),
        }
    }
}

/// Claim pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimConfig {
    /// Claim lock time-to-live in seconds.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    /// Interval between reconciliation sweeps in seconds (0 disables).
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
    /// Maximum intents settled per sweep.
    #[serde(default = "default_reconcile_batch")]
    pub reconcile_batch_size: u32,
}

fn default_lock_ttl() -> u64 {
    30
}

fn default_reconcile_interval() -> u64 {
    300 // 5 minutes
}

fn default_reconcile_batch() -> u32 {
    100
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: default_lock_ttl(),
            reconcile_interval_secs: default_reconcile_interval(),
            reconcile_batch_size: default_reconcile_batch(),
        }
    }
}

/// Game server notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GameServerConfig {
    /// Whether to send reward notices.
    #[serde(default = "default_game_server_enabled")]
    pub enabled: bool,
    /// Game server host.
    #[serde(default = "default_game_server_host")]
    pub host: String,
    /// Game server port.
    #[serde(default = "default_game_server_port")]
    pub port: u16,
    /// Notice endpoint path.
    #[serde(default = "default_game_server_path")]
    pub path: String,
    /// Total request timeout in seconds.
    #[serde(default = "default_game_server_timeout")]
    pub timeout_secs: u64,
}

fn default_game_server_enabled() -> bool {
    true
}

fn default_game_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_game_server_port() -> u16 {
    9000
}

fn default_game_server_path() -> String {
    "/awardnotice".to_string()
}

fn default_game_server_timeout() -> u64 {
    10
}

impl GameServerConfig {
    /// Full URL of the notice endpoint.
    pub fn notice_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_game_server_enabled(),
            host: default_game_server_host(),
            port: default_game_server_port(),
            path: default_game_server_path(),
            timeout_secs: default_game_server_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/mailreward.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Claim pipeline configuration.
    #[serde(default)]
    pub claim: ClaimConfig,
    /// Game server configuration.
    #[serde(default)]
    pub game_server: GameServerConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(MailRewardError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| MailRewardError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `MAILREWARD_JWT_SECRET`: JWT secret key
    /// - `GAMESERVER_HOST`: game server host
    /// - `GAMESERVER_PORT`: game server port (ignored if not a valid port)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("MAILREWARD_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.web.jwt_secret = jwt_secret;
            }
        }
        if let Ok(host) = std::env::var("GAMESERVER_HOST") {
            if !host.is_empty() {
                self.game_server.host = host;
            }
        }
        if let Ok(port) = std::env::var("GAMESERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.game_server.port = port;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - JWT secret is not set
    /// - Mail store and ledger share a path
    /// - Lock TTL or request timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.web.jwt_secret.is_empty() {
            return Err(MailRewardError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via MAILREWARD_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.database.mail_path == self.database.ledger_path {
            return Err(MailRewardError::Config(
                "mail_path and ledger_path must point to different databases".to_string(),
            ));
        }
        if self.claim.lock_ttl_secs == 0 {
            return Err(MailRewardError::Config(
                "lock_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.web.request_timeout_secs == 0 {
            return Err(MailRewardError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
