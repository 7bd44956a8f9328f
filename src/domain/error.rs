//! Domain Error Types
//!
//! Caller-facing error taxonomy of the data-access core.

use thiserror::Error;
use uuid::Uuid;

use crate::db::classify::{classify, DbErrorKind};

/// Result type of the data-access core
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors surfaced by the repository, the transaction runner and transfers.
///
/// Raw `sqlx::Error` values only enter through [`DomainError::from_query`]
/// (also used by the `From` impl), so every database fault is classified
/// before it reaches a caller.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Bad amount, same-account transfer or malformed literal input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unique constraint violation
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    /// One or more referenced accounts do not exist
    #[error("Account not found: {}", join_ids(.0))]
    AccountNotFound(Vec<Uuid>),

    /// Source balance does not cover the debit
    #[error("Insufficient balance on account {account_id}: required {required}, available {available}")]
    InsufficientBalance {
        account_id: Uuid,
        required: i64,
        available: i32,
    },

    /// Connection could not be acquired
    #[error("Database connection failed after {attempts} attempt(s)")]
    Connection {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// Serialization failure or deadlock reported by the store
    #[error("Transaction conflict")]
    TransactionConflict(#[source] sqlx::Error),

    /// Database fault with no more specific mapping
    #[error("Database unavailable ({kind})")]
    ServiceUnavailable {
        kind: DbErrorKind,
        #[source]
        source: sqlx::Error,
    },

    #[error("Transaction retries exhausted after {attempts} attempt(s)")]
    RetriesExhausted { attempts: u32 },

    #[error("Database is shutting down")]
    ShuttingDown,
}

impl DomainError {
    /// Translate a raw query failure through the classifier
    pub fn from_query(err: sqlx::Error) -> Self {
        let kind = classify(&err);
        match kind {
            DbErrorKind::UniqueViolation => {
                let message = match &err {
                    sqlx::Error::Database(db_err) => match db_err.constraint() {
                        Some(constraint) => format!("unique constraint {} violated", constraint),
                        None => "unique constraint violated".to_string(),
                    },
                    _ => "unique constraint violated".to_string(),
                };
                Self::Conflict { message, source: err }
            }
            DbErrorKind::ForeignKeyViolation => {
                tracing::debug!(error = %err, "foreign key violation");
                Self::InvalidArgument("foreign key constraint violation".to_string())
            }
            DbErrorKind::InvalidInput => {
                tracing::debug!(error = %err, "invalid text representation");
                Self::InvalidArgument("invalid text representation".to_string())
            }
            DbErrorKind::RetryableConflict => Self::TransactionConflict(err),
            DbErrorKind::Transient
            | DbErrorKind::IntegrityViolation
            | DbErrorKind::Unclassified => Self::ServiceUnavailable { kind, source: err },
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn account_not_found(id: Uuid) -> Self {
        Self::AccountNotFound(vec![id])
    }

    /// Check if restarting the whole transaction may succeed
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::TransactionConflict(_))
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::Conflict { .. }
                | Self::AccountNotFound(_)
                | Self::InsufficientBalance { .. }
        )
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_query(err)
    }
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_transient_query_failure_is_service_unavailable() {
        let err = DomainError::from(sqlx::Error::Io(io::Error::from(
            io::ErrorKind::ConnectionReset,
        )));

        match err {
            DomainError::ServiceUnavailable { kind, .. } => {
                assert_eq!(kind, DbErrorKind::Transient)
            }
            other => panic!("Expected ServiceUnavailable, got: {:?}", other),
        }
    }

    #[test]
    fn test_unclassified_failure_does_not_leak_details() {
        let err = DomainError::from(sqlx::Error::Protocol("secret internals".to_string()));

        assert!(matches!(
            err,
            DomainError::ServiceUnavailable {
                kind: DbErrorKind::Unclassified,
                ..
            }
        ));
        assert!(!err.to_string().contains("secret internals"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_account_not_found_names_every_id() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let err = DomainError::AccountNotFound(vec![a, b]);

        let message = err.to_string();
        assert!(message.contains(&a.to_string()));
        assert!(message.contains(&b.to_string()));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_only_transaction_conflicts_are_retryable() {
        let conflict =
            DomainError::TransactionConflict(sqlx::Error::Protocol("40001".to_string()));
        assert!(conflict.is_retryable_conflict());

        assert!(!DomainError::invalid_argument("bad").is_retryable_conflict());
        assert!(!DomainError::ShuttingDown.is_retryable_conflict());
        assert!(!DomainError::Connection {
            attempts: 3,
            source: sqlx::Error::PoolTimedOut,
        }
        .is_retryable_conflict());
    }

    #[test]
    fn test_insufficient_balance_message() {
        let err = DomainError::InsufficientBalance {
            account_id: Uuid::nil(),
            required: 200,
            available: 100,
        };

        assert!(err.is_client_error());
        assert!(err.to_string().contains("200"));
        assert!(err.to_string().contains("100"));
    }
}
