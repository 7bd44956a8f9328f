//! Database module
//!
//! Connection pool lifecycle, error classification, retrying connector
//! and the transaction runner.

pub mod classify;
pub mod connector;
pub mod schema;
pub mod transaction;

use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgConnection, PgPool, Postgres};
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;

use crate::config::DatabaseConfig;
use crate::domain::{DomainError, DomainResult};

pub use classify::{classify, DbErrorKind};
pub use connector::{ConnectionSource, RetryPolicy};
pub use transaction::{AttemptState, IsolationLevel, TransactionControl, TransactionOptions};

/// Shared handle to the connection pool.
///
/// Created once at startup; cloning is cheap. `shutdown` stops new work,
/// waits for in-flight units of work and checkouts, then closes the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    retry: RetryPolicy,
    defaults: TransactionOptions,
    in_flight: TaskTracker,
}

impl Database {
    /// Build the pool from configuration. Connections are opened lazily.
    pub fn connect(config: &DatabaseConfig, application_name: &str) -> DomainResult<Self> {
        let mut connect_options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| DomainError::invalid_argument(format!("DATABASE_URL: {}", e)))?
            .application_name(application_name);
        if config.ssl {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_connections)
            .idle_timeout(config.idle_timeout)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(connect_options);

        tracing::info!(
            max_connections = config.pool_max_connections,
            "Database pool created"
        );

        Ok(Self::from_pool(
            pool,
            config.retry_policy(),
            config.transaction_options(),
        ))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, retry: RetryPolicy, defaults: TransactionOptions) -> Self {
        Self {
            pool,
            retry,
            defaults,
            in_flight: TaskTracker::new(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Configured default options for `transaction`
    pub fn transaction_options(&self) -> TransactionOptions {
        self.defaults
    }

    /// Check out one connection through the retrying connector
    pub async fn acquire(&self) -> DomainResult<Checkout> {
        let token = self.enter()?;
        let conn = connector::acquire(&self.pool, &self.retry).await?;
        Ok(Checkout {
            conn,
            _token: token,
        })
    }

    /// Run a unit of work with the configured default options
    pub async fn transaction<T, F>(&self, unit: F) -> DomainResult<T>
    where
        T: Send,
        F: for<'c> FnMut(&'c mut PgConnection) -> BoxFuture<'c, DomainResult<T>> + Send,
    {
        self.transaction_with(&self.defaults, unit).await
    }

    /// Run a unit of work with explicit options
    pub async fn transaction_with<T, F>(
        &self,
        options: &TransactionOptions,
        unit: F,
    ) -> DomainResult<T>
    where
        T: Send,
        F: for<'c> FnMut(&'c mut PgConnection) -> BoxFuture<'c, DomainResult<T>> + Send,
    {
        let _token = self.enter()?;
        transaction::run(&self.pool, &self.retry, options, unit).await
    }

    /// Simple connectivity check
    pub async fn verify_connection(&self) -> DomainResult<()> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.in_flight.is_closed()
    }

    /// Drain in-flight work, then close every connection
    pub async fn shutdown(&self) {
        self.in_flight.close();
        tracing::info!(
            in_flight = self.in_flight.len(),
            "Waiting for in-flight database work"
        );
        self.in_flight.wait().await;
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }

    fn enter(&self) -> DomainResult<TaskTrackerToken> {
        if self.in_flight.is_closed() {
            return Err(DomainError::ShuttingDown);
        }
        Ok(self.in_flight.token())
    }
}

/// A connection checked out for a single operation; returned to the pool on drop
#[derive(Debug)]
pub struct Checkout {
    conn: PoolConnection<Postgres>,
    _token: TaskTrackerToken,
}

impl Deref for Checkout {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        &self.conn
    }
}

impl DerefMut for Checkout {
    fn deref_mut(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn lazy_database() -> Database {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy("postgres://localhost:1/unused")
            .unwrap();
        Database::from_pool(pool, RetryPolicy::default(), TransactionOptions::default())
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let db = lazy_database();
        assert!(!db.is_shutting_down());

        db.shutdown().await;

        assert!(db.is_shutting_down());
        assert!(matches!(db.acquire().await, Err(DomainError::ShuttingDown)));

        let result = db
            .transaction(|_conn| Box::pin(async move { Ok(()) }))
            .await;
        assert!(matches!(result, Err(DomainError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_defaults_are_exposed() {
        let db = lazy_database();
        assert_eq!(db.transaction_options(), TransactionOptions::default());
        assert_eq!(db.retry_policy(), &RetryPolicy::default());
    }
}
