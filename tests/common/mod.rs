//! Shared helpers for mail API integration tests.
//!
//! Every app runs against three in-memory stores so tests are isolated.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};

use mailreward::claim::{ClaimCoordinator, SqlLockStore};
use mailreward::mail::{MailCatalog, NewMail, Reward, RewardItem};
use mailreward::notify::{NoopNotifier, RewardNotifier};
use mailreward::web::handlers::AppState;
use mailreward::web::middleware::{JwtClaims, JwtState};
use mailreward::web::router::create_router;
use mailreward::{Database, InboxService, SqlRewardLedger, Store};

/// JWT secret used by every test app.
pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// A running test app and direct handles to its stores.
pub struct TestApp {
    pub server: TestServer,
    pub mail_db: Database,
    pub lock_db: Database,
    pub ledger: SqlRewardLedger,
    pub claims: ClaimCoordinator,
}

/// In-memory stores wired into a coordinator.
pub struct Stores {
    pub mail_db: Database,
    pub lock_db: Database,
    pub ledger: SqlRewardLedger,
    pub claims: ClaimCoordinator,
}

/// Open fresh in-memory stores.
pub async fn open_stores(notifier: Arc<dyn RewardNotifier>) -> Stores {
    let mail_db = Database::open_in_memory(Store::Mail).await.unwrap();
    let lock_db = Database::open_in_memory(Store::Lock).await.unwrap();
    let ledger = SqlRewardLedger::new(Database::open_in_memory(Store::Ledger).await.unwrap());

    let claims = ClaimCoordinator::new(
        mail_db.clone(),
        Arc::new(SqlLockStore::new(lock_db.clone())),
        Arc::new(ledger.clone()),
        notifier,
    );

    Stores {
        mail_db,
        lock_db,
        ledger,
        claims,
    }
}

/// Create a test app with notices disabled.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_notifier(Arc::new(NoopNotifier)).await
}

/// Create a test app with the given notifier.
pub async fn spawn_app_with_notifier(notifier: Arc<dyn RewardNotifier>) -> TestApp {
    let stores = open_stores(notifier).await;

    let app_state = Arc::new(AppState::new(
        InboxService::new(stores.mail_db.clone()),
        stores.claims.clone(),
    ));
    let jwt_state = Arc::new(JwtState::new(TEST_SECRET));
    let router = create_router(app_state, jwt_state, &[], std::time::Duration::from_secs(10));

    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        mail_db: stores.mail_db,
        lock_db: stores.lock_db,
        ledger: stores.ledger,
        claims: stores.claims,
    }
}

/// Bearer header value for a player.
pub fn bearer(userid: i64) -> String {
    format!("Bearer {}", token_for(userid))
}

/// A valid token for a player.
pub fn token_for(userid: i64) -> String {
    encode(
        &Header::default(),
        &JwtClaims::new(userid, 1, 3600),
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

/// A window that is open now.
pub fn open_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now - Duration::hours(1), now + Duration::hours(1))
}

/// A reward of `amount` units of resource type 1.
pub fn gold(amount: i64) -> Reward {
    Reward::new([RewardItem::new(1, amount)]).unwrap()
}

/// Publish a global mail open now.
pub async fn publish_global(db: &Database, reward: Reward) -> i64 {
    let (start, end) = open_window();
    publish(db, NewMail::global("Event", "Thanks for playing", start, end).with_reward(reward)).await
}

/// Publish a personal mail open now.
pub async fn publish_personal(db: &Database, recipients: &[i64], reward: Reward) -> i64 {
    let (start, end) = open_window();
    publish(
        db,
        NewMail::personal("Compensation", "Sorry for the downtime", start, end, recipients.to_vec())
            .with_reward(reward),
    )
    .await
}

/// Publish any mail.
pub async fn publish(db: &Database, mail: NewMail) -> i64 {
    MailCatalog::new(db.pool()).publish(&mail).await.unwrap().id
}

/// Current status code of a player's inbox row, if it exists.
pub async fn status_code(db: &Database, mail_id: i64, user_id: i64) -> Option<i64> {
    sqlx::query_scalar("SELECT status FROM mail_users WHERE mail_id = ? AND user_id = ?")
        .bind(mail_id)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await
        .unwrap()
}

/// Log lines written by a `tracing` subscriber, for asserting on events.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install a subscriber writing into this buffer for the current thread.
    ///
    /// Events are captured until the returned guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Everything captured so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Captured lines containing every one of `needles`.
    pub fn lines_with(&self, needles: &[&str]) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| needles.iter().all(|n| line.contains(n)))
            .map(str::to_string)
            .collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
