//! Transaction runner integration tests against a real Postgres

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use credit_ledger::db::IsolationLevel;
use credit_ledger::{DomainError, TransactionOptions};
use tokio::sync::Barrier;

mod common;

#[tokio::test]
async fn test_dropped_unit_of_work_is_never_committed() {
    let db = common::setup_test_db().await;
    let account = common::create_account(&db, "cancel", 100).await;
    let single = common::single_connection_db();

    let account_id = account.id;
    let stalled = single.transaction(move |conn| {
        Box::pin(async move {
            sqlx::query("UPDATE accounts SET credits = credits - 40 WHERE id = $1")
                .bind(account_id)
                .execute(&mut *conn)
                .await?;
            sqlx::query("SELECT pg_sleep(2)").execute(&mut *conn).await?;
            Ok(())
        })
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(300), stalled).await;
    assert!(timed_out.is_err());

    // Reuses the only pooled connection
    single
        .transaction(|conn| {
            Box::pin(async move {
                sqlx::query("SELECT 1").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    assert_eq!(common::credits_of(&db, account.id).await, 100);
    single.shutdown().await;
}

#[tokio::test]
async fn test_serialization_failure_is_retried_until_commit() {
    let db = common::setup_test_db().await;
    let account = common::create_account(&db, "contended", 0).await;

    let options = TransactionOptions::default()
        .with_isolation_level(IsolationLevel::Serializable)
        .with_retries(3);
    let barrier = Arc::new(Barrier::new(2));
    let calls = Arc::new(AtomicU32::new(0));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..2 {
        let db = db.clone();
        let barrier = barrier.clone();
        let calls = calls.clone();
        let account_id = account.id;

        tasks.spawn(async move {
            let attempts = Arc::new(AtomicU32::new(0));
            db.transaction_with(&options, move |conn| {
                let first_attempt = attempts.fetch_add(1, Ordering::SeqCst) == 0;
                calls.fetch_add(1, Ordering::SeqCst);
                let barrier = barrier.clone();

                Box::pin(async move {
                    // Both snapshots are taken before either side writes
                    sqlx::query("SELECT credits FROM accounts WHERE id = $1")
                        .bind(account_id)
                        .execute(&mut *conn)
                        .await?;
                    if first_attempt {
                        barrier.wait().await;
                    }
                    sqlx::query("UPDATE accounts SET credits = credits + 1 WHERE id = $1")
                        .bind(account_id)
                        .execute(&mut *conn)
                        .await?;
                    Ok::<_, DomainError>(())
                })
            })
            .await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    assert_eq!(common::credits_of(&db, account.id).await, 2);
    assert!(
        calls.load(Ordering::SeqCst) >= 3,
        "one side must have been restarted"
    );
}
