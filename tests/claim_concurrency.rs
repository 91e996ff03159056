//! Concurrency tests for reward claims.
//!
//! These tests verify that concurrent claims on the same (player, mail)
//! credit the ledger exactly once, and that a lost status update is never
//! turned into a second credit.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use common::{gold, open_stores, publish_global, status_code, LogCapture};
use mailreward::claim::{ClaimCoordinator, SqlLockStore};
use mailreward::ledger::RewardLedger;
use mailreward::mail::{InboxService, MailUserRepository};
use mailreward::notify::NoopNotifier;
use mailreward::{ClaimOutcome, Database, MailRewardError, SqlRewardLedger, Store};

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    granted: usize,
    already_received: usize,
    busy: usize,
}

fn tally(results: Vec<Result<ClaimOutcome, MailRewardError>>) -> Tally {
    let mut tally = Tally::default();
    for result in results {
        match result {
            Ok(ClaimOutcome::Granted { .. }) => tally.granted += 1,
            Ok(ClaimOutcome::AlreadyReceived) => tally.already_received += 1,
            Err(MailRewardError::Busy(_)) => tally.busy += 1,
            Err(e) => panic!("unexpected claim error: {e}"),
        }
    }
    tally
}

async fn claim_concurrently(
    claims: &ClaimCoordinator,
    user_id: i64,
    mail_id: i64,
    n: usize,
) -> Tally {
    let mut handles = Vec::new();
    for _ in 0..n {
        let claims = claims.clone();
        handles.push(tokio::spawn(async move {
            claims.claim(user_id, mail_id).await
        }));
    }

    let results = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    tally(results)
}

/// N concurrent claims produce exactly one credit and one fresh-claim result,
/// for every N from 2 to 50.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_single_winner() {
    for n in 2..=50 {
        let stores = open_stores(Arc::new(NoopNotifier)).await;
        let mail_id = publish_global(&stores.mail_db, gold(100)).await;

        let result = claim_concurrently(&stores.claims, 42, mail_id, n).await;

        assert_eq!(result.granted, 1, "n = {n}: {result:?}");
        assert_eq!(result.granted + result.already_received + result.busy, n);
        assert_eq!(stores.ledger.balance(42, 1).await.unwrap(), 100, "n = {n}");
        assert_eq!(status_code(&stores.mail_db, mail_id, 42).await, Some(2));
    }
}

/// Same property against file-backed stores with a real connection pool.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_file_backed() {
    let dir = tempfile::tempdir().unwrap();
    let mail_db = Database::open(dir.path().join("mail.db"), Store::Mail)
        .await
        .unwrap();
    let ledger = SqlRewardLedger::new(
        Database::open(dir.path().join("ledger.db"), Store::Ledger)
            .await
            .unwrap(),
    );
    let locks = SqlLockStore::new(
        Database::open(dir.path().join("lock.db"), Store::Lock)
            .await
            .unwrap(),
    );
    let claims = ClaimCoordinator::new(
        mail_db.clone(),
        Arc::new(locks),
        Arc::new(ledger.clone()),
        Arc::new(NoopNotifier),
    );
    let mail_id = publish_global(&mail_db, gold(100)).await;

    let result = claim_concurrently(&claims, 42, mail_id, 17).await;

    assert_eq!(result.granted, 1, "{result:?}");
    assert_eq!(ledger.balance(42, 1).await.unwrap(), 100);
}

/// Different players claiming the same global mail do not block each other.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_players_claim_in_parallel() {
    let stores = open_stores(Arc::new(NoopNotifier)).await;
    let mail_id = publish_global(&stores.mail_db, gold(10)).await;

    let mut handles = Vec::new();
    for user_id in 1..=20 {
        let claims = stores.claims.clone();
        handles.push(tokio::spawn(async move {
            claims.claim(user_id, mail_id).await
        }));
    }

    let results = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let result = tally(results);
    assert_eq!(result.granted, 20);

    for user_id in 1..=20 {
        assert_eq!(stores.ledger.balance(user_id, 1).await.unwrap(), 10);
    }
}

/// Concurrent inbox reads materialize one row per global mail.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sync_single_row() {
    let stores = open_stores(Arc::new(NoopNotifier)).await;
    let mail_id = publish_global(&stores.mail_db, gold(1)).await;
    let inbox = InboxService::new(stores.mail_db.clone());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let inbox = inbox.clone();
        handles.push(tokio::spawn(async move { inbox.list(42).await }));
    }
    for handle in join_all(handles).await {
        assert_eq!(handle.unwrap().unwrap().len(), 1);
    }

    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM mail_users WHERE mail_id = ? AND user_id = ?")
            .bind(mail_id)
            .bind(42)
            .fetch_one(stores.mail_db.pool())
            .await
            .unwrap();
    assert_eq!(rows, 1);
}

/// The status store fails after the ledger committed; the retry must not
/// credit again and must repair the status.
#[tokio::test]
async fn test_lost_status_update_is_not_double_credited() {
    let stores = open_stores(Arc::new(NoopNotifier)).await;
    let mail_id = publish_global(&stores.mail_db, gold(100)).await;

    sqlx::query(
        "CREATE TRIGGER fail_claim_update BEFORE UPDATE OF status ON mail_users
         WHEN NEW.status = 2 BEGIN SELECT RAISE(ABORT, 'status store down'); END",
    )
    .execute(stores.mail_db.pool())
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER fail_claim_insert BEFORE INSERT ON mail_users
         WHEN NEW.status = 2 BEGIN SELECT RAISE(ABORT, 'status store down'); END",
    )
    .execute(stores.mail_db.pool())
    .await
    .unwrap();

    // The ledger committed, so the player still gets the reward
    let logs = LogCapture::default();
    let guard = logs.install();
    let outcome = stores.claims.claim(42, mail_id).await.unwrap();
    drop(guard);
    assert!(matches!(outcome, ClaimOutcome::Granted { .. }));

    let alerts = logs.lines_with(&["ERROR", "needs reconciliation"]);
    assert_eq!(alerts.len(), 1, "captured logs:\n{}", logs.contents());
    assert!(alerts[0].contains("user_id=42"), "{}", alerts[0]);
    assert!(alerts[0].contains(&format!("mail_id={mail_id}")), "{}", alerts[0]);
    assert_eq!(stores.ledger.balance(42, 1).await.unwrap(), 100);
    assert_ne!(status_code(&stores.mail_db, mail_id, 42).await, Some(2));
    assert!(stores
        .ledger
        .intent(mail_id, 42)
        .await
        .unwrap()
        .unwrap()
        .settled_at
        .is_none());

    sqlx::query("DROP TRIGGER fail_claim_update")
        .execute(stores.mail_db.pool())
        .await
        .unwrap();
    sqlx::query("DROP TRIGGER fail_claim_insert")
        .execute(stores.mail_db.pool())
        .await
        .unwrap();

    // Retry: no second credit, status repaired
    let outcome = stores.claims.claim(42, mail_id).await.unwrap();
    assert_eq!(outcome, ClaimOutcome::AlreadyReceived);
    assert_eq!(stores.ledger.balance(42, 1).await.unwrap(), 100);
    assert_eq!(status_code(&stores.mail_db, mail_id, 42).await, Some(2));
    assert!(stores
        .ledger
        .intent(mail_id, 42)
        .await
        .unwrap()
        .unwrap()
        .settled_at
        .is_some());
}

/// The background sweep repairs a lost status update without a retry.
#[tokio::test]
async fn test_reconcile_repairs_lost_status_update() {
    let stores = open_stores(Arc::new(NoopNotifier)).await;
    let mail_id = publish_global(&stores.mail_db, gold(100)).await;

    sqlx::query(
        "CREATE TRIGGER fail_claim_insert BEFORE INSERT ON mail_users
         WHEN NEW.status = 2 BEGIN SELECT RAISE(ABORT, 'status store down'); END",
    )
    .execute(stores.mail_db.pool())
    .await
    .unwrap();

    stores.claims.claim(42, mail_id).await.unwrap();
    assert_eq!(status_code(&stores.mail_db, mail_id, 42).await, None);

    sqlx::query("DROP TRIGGER fail_claim_insert")
        .execute(stores.mail_db.pool())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let report = stores.claims.reconcile(Duration::ZERO, 100).await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(status_code(&stores.mail_db, mail_id, 42).await, Some(2));

    // Nothing left to do
    assert!(stores
        .ledger
        .unsettled(chrono::Utc::now(), 100)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        stores.claims.claim(42, mail_id).await.unwrap(),
        ClaimOutcome::AlreadyReceived
    );
}

/// Status never decreases across any sequence of reads, claims and deletes.
#[tokio::test]
async fn test_status_monotonic_under_mixed_operations() {
    let stores = open_stores(Arc::new(NoopNotifier)).await;
    let mail_id = publish_global(&stores.mail_db, gold(1)).await;
    let inbox = InboxService::new(stores.mail_db.clone());
    let repo = MailUserRepository::new(stores.mail_db.pool());

    let mut last = -1;
    let mut observe = |code: Option<i64>| {
        let code = code.unwrap_or(0);
        assert!(code >= last, "status went from {last} to {code}");
        last = code;
    };

    inbox.list(42).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);
    inbox.mark_read(42, mail_id).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);
    inbox.mark_read(42, mail_id).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);
    stores.claims.claim(42, mail_id).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);
    inbox.mark_read(42, mail_id).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);
    stores.claims.claim(42, mail_id).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);
    inbox.delete(42, mail_id).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);
    inbox.mark_read(42, mail_id).await.unwrap();
    observe(status_code(&stores.mail_db, mail_id, 42).await);

    assert_eq!(last, 3);
    assert_eq!(repo.get(mail_id, 42).await.unwrap().unwrap().status.code(), 3);
}
