//! Transaction Runner
//!
//! Runs a unit of work inside one sqlx transaction on one connection,
//! restarting the whole unit when the store reports a retryable conflict.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Executor, PgConnection, Postgres, Transaction};

use super::connector::{self, ConnectionSource, RetryPolicy};
use crate::domain::{DomainError, DomainResult};

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown isolation level: {0}")]
pub struct ParseIsolationLevelError(String);

impl FromStr for IsolationLevel {
    type Err = ParseIsolationLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "read_committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            _ => Err(ParseIsolationLevelError(s.to_string())),
        }
    }
}

/// Options for one `run` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// `None` keeps the server default
    pub isolation_level: Option<IsolationLevel>,
    /// Whole-transaction retries on conflict (0 = single attempt)
    pub retries: u32,
    pub retry_base_delay: Duration,
}

impl TransactionOptions {
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation_level: None,
            retries: 0,
            retry_base_delay: Duration::from_millis(10),
        }
    }
}

/// Connection that can open a transaction
///
/// The scope returned by `begin` must roll back if it is dropped before
/// `commit` or `rollback` completes, so a cancelled unit of work never
/// leaves an open transaction on a pooled connection.
pub trait TransactionControl: Send {
    /// What the unit of work runs its statements on
    type Conn: ?Sized + Send;

    type Scope<'a>: TransactionScope
    where
        Self: 'a;

    fn begin(&mut self) -> BoxFuture<'_, Result<Self::Scope<'_>, sqlx::Error>>;

    fn scope_connection<'s, 'a>(scope: &'s mut Self::Scope<'a>) -> &'s mut Self::Conn
    where
        Self: 'a;
}

/// An open transaction
pub trait TransactionScope: Send {
    fn execute_control<'s>(
        &'s mut self,
        statement: &'s str,
    ) -> BoxFuture<'s, Result<(), sqlx::Error>>;

    fn commit<'s>(self) -> BoxFuture<'s, Result<(), sqlx::Error>>
    where
        Self: Sized + 's;

    fn rollback<'s>(self) -> BoxFuture<'s, Result<(), sqlx::Error>>
    where
        Self: Sized + 's;
}

impl TransactionControl for PoolConnection<Postgres> {
    type Conn = PgConnection;
    type Scope<'a> = Transaction<'a, Postgres>;

    fn begin(&mut self) -> BoxFuture<'_, Result<Transaction<'_, Postgres>, sqlx::Error>> {
        Connection::begin(&mut **self)
    }

    fn scope_connection<'s, 'a>(scope: &'s mut Transaction<'a, Postgres>) -> &'s mut PgConnection
    where
        Self: 'a,
    {
        &mut **scope
    }
}

// Dropping a `Transaction` queues a ROLLBACK that runs before the
// connection is handed out again.
impl<'t> TransactionScope for Transaction<'t, Postgres> {
    fn execute_control<'s>(
        &'s mut self,
        statement: &'s str,
    ) -> BoxFuture<'s, Result<(), sqlx::Error>> {
        Box::pin(async move {
            (&mut **self).execute(statement).await?;
            Ok(())
        })
    }

    fn commit<'s>(self) -> BoxFuture<'s, Result<(), sqlx::Error>>
    where
        Self: Sized + 's,
    {
        Box::pin(Transaction::commit(self))
    }

    fn rollback<'s>(self) -> BoxFuture<'s, Result<(), sqlx::Error>>
    where
        Self: Sized + 's,
    {
        Box::pin(Transaction::rollback(self))
    }
}

/// State of a single transaction attempt
///
/// `Begin -> Executing -> Committing -> Done` on success;
/// any failure goes through `RollingBack` to `Retry` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Begin,
    Executing,
    Committing,
    RollingBack,
    Retry,
    Done,
    Failed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Done | AttemptState::Failed)
    }

    /// Where an attempt goes once its rollback has been issued
    pub fn after_rollback(err: &DomainError, attempts_remaining: bool) -> Self {
        if err.is_retryable_conflict() && attempts_remaining {
            AttemptState::Retry
        } else {
            AttemptState::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Begin => "BEGIN",
            AttemptState::Executing => "EXECUTING",
            AttemptState::Committing => "COMMITTING",
            AttemptState::RollingBack => "ROLLING_BACK",
            AttemptState::Retry => "RETRY",
            AttemptState::Done => "DONE",
            AttemptState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `unit` inside a transaction.
///
/// The unit of work may be invoked more than once, so it must not have
/// effects outside the transaction. Dropping the returned future rolls the
/// current attempt back.
pub async fn run<S, T, F>(
    source: &S,
    policy: &RetryPolicy,
    options: &TransactionOptions,
    mut unit: F,
) -> DomainResult<T>
where
    S: ConnectionSource + ?Sized,
    S::Connection: TransactionControl,
    T: Send,
    F: for<'c> FnMut(
            &'c mut <S::Connection as TransactionControl>::Conn,
        ) -> BoxFuture<'c, DomainResult<T>>
        + Send,
{
    let max_attempts = options.retries.saturating_add(1);

    for attempt in 0..max_attempts {
        let mut conn = connector::acquire(source, policy).await?;
        let outcome = run_attempt(&mut conn, options, &mut unit).await;
        // released exactly once per attempt
        drop(conn);

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                let attempts_remaining = attempt + 1 < max_attempts;
                match AttemptState::after_rollback(&err, attempts_remaining) {
                    AttemptState::Retry => {
                        let delay = options.retry_delay(attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Transaction conflict, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => return Err(err),
                }
            }
        }
    }

    Err(DomainError::RetriesExhausted {
        attempts: max_attempts,
    })
}

async fn run_attempt<C, T, F>(
    conn: &mut C,
    options: &TransactionOptions,
    unit: &mut F,
) -> DomainResult<T>
where
    C: TransactionControl,
    F: for<'c> FnMut(&'c mut C::Conn) -> BoxFuture<'c, DomainResult<T>>,
{
    let mut state = AttemptState::Begin;
    let mut scope = conn.begin().await?;

    let result: DomainResult<T> = async {
        if let Some(level) = options.isolation_level {
            let statement = format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql());
            scope.execute_control(&statement).await?;
        }

        transition(&mut state, AttemptState::Executing);
        unit(C::scope_connection(&mut scope)).await
    }
    .await;

    match result {
        Ok(value) => {
            transition(&mut state, AttemptState::Committing);
            match scope.commit().await {
                Ok(()) => {
                    transition(&mut state, AttemptState::Done);
                    Ok(value)
                }
                Err(err) => {
                    // the consumed scope rolls back on drop
                    transition(&mut state, AttemptState::RollingBack);
                    Err(err.into())
                }
            }
        }
        Err(err) => {
            let failed_in = state;
            transition(&mut state, AttemptState::RollingBack);
            if let Err(rollback_err) = scope.rollback().await {
                tracing::warn!(
                    error = %rollback_err,
                    failed_in = %failed_in,
                    "Rollback failed, keeping original error"
                );
            }
            Err(err)
        }
    }
}

fn transition(state: &mut AttemptState, next: AttemptState) {
    tracing::debug!(from = %state, to = %next, "transaction state");
    *state = next;
}
