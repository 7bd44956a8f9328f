//! Common test utilities
//!
//! Database-backed tests need `DATABASE_URL`.

#![allow(dead_code)]

use std::time::Duration;

use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use credit_ledger::account::AccountRepository;
use credit_ledger::db::schema::ensure_schema;
use credit_ledger::db::{RetryPolicy, TransactionOptions};
use credit_ledger::domain::NewAccount;
use credit_ledger::{Account, Config, Database};

/// Connect to the test database and make sure the schema exists
pub async fn setup_test_db() -> Database {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let config = Config::from_env().expect("invalid test configuration");
    let db = Database::connect(&config.database, "credit_ledger_test")
        .expect("Failed to build pool");
    ensure_schema(&db).await.expect("Failed to create schema");

    db
}

/// Database limited to one pooled connection, so consecutive units of work
/// are guaranteed to reuse it
pub fn single_connection_db() -> Database {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(&url)
        .expect("Failed to build pool");
    Database::from_pool(pool, RetryPolicy::default(), TransactionOptions::default())
}

/// Database handle that never reaches a server; for paths that fail before
/// any query is sent
pub fn offline_db() -> Database {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(50))
        .connect_lazy("postgres://localhost:1/unused")
        .expect("lazy pool");
    Database::from_pool(
        pool,
        RetryPolicy::new(1, Duration::ZERO),
        TransactionOptions::default(),
    )
}

/// Email that no other test will use
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

pub fn birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 6, 15).unwrap()
}

pub fn new_account(prefix: &str, credits: i32) -> NewAccount {
    NewAccount::new(unique_email(prefix), "hash", prefix, birth_date()).with_credits(credits)
}

/// Insert an account holding `credits`
pub async fn create_account(db: &Database, prefix: &str, credits: i32) -> Account {
    AccountRepository::new(db.clone())
        .create(new_account(prefix, credits))
        .await
        .expect("Failed to create account")
}

pub async fn credits_of(db: &Database, id: Uuid) -> i32 {
    AccountRepository::new(db.clone())
        .find_by_id(id)
        .await
        .expect("lookup failed")
        .expect("account missing")
        .credits
}
