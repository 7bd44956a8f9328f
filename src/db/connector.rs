//! Retrying Connector
//!
//! Acquires one connection, retrying transient faults with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

use super::classify::{classify, DbErrorKind};
use crate::domain::{DomainError, DomainResult};

/// Something connections can be checked out from
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    type Connection: Send;

    /// Check out a single connection (one attempt, no retry)
    async fn checkout(&self) -> Result<Self::Connection, sqlx::Error>;
}

#[async_trait]
impl ConnectionSource for PgPool {
    type Connection = PoolConnection<Postgres>;

    async fn checkout(&self) -> Result<Self::Connection, sqlx::Error> {
        sqlx::Pool::acquire(self).await
    }
}

/// Bounds for connection acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay after failed attempt `attempt` (numbered from 0)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_millis(1000))
    }
}

/// Acquire a connection, retrying only transient failures
pub async fn acquire<S>(source: &S, policy: &RetryPolicy) -> DomainResult<S::Connection>
where
    S: ConnectionSource + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match source.checkout().await {
            Ok(conn) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Database connection acquired after retry");
                }
                return Ok(conn);
            }
            Err(err) => {
                let kind = classify(&err);
                let attempts = attempt + 1;

                if kind != DbErrorKind::Transient || attempts >= max_attempts {
                    tracing::error!(
                        attempts,
                        kind = %kind,
                        error = %err,
                        "Failed to acquire database connection"
                    );
                    return Err(DomainError::Connection {
                        attempts,
                        source: err,
                    });
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempts,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient connection failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
