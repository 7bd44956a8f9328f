//! Database Error Classification
//!
//! Maps raw driver and network failures onto a closed set of kinds.
//! Nothing outside this module looks at SQLSTATE codes or io error kinds.

use std::fmt;
use std::io;

/// Logical kind of a database failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    /// Network or connection level fault (refused, reset, timeout, unreachable)
    Transient,
    UniqueViolation,
    ForeignKeyViolation,
    /// Malformed literal, e.g. bad uuid text
    InvalidInput,
    /// Check constraint violation
    IntegrityViolation,
    /// Serialization failure or deadlock detected by the store
    RetryableConflict,
    Unclassified,
}

impl DbErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbErrorKind::Transient => "transient",
            DbErrorKind::UniqueViolation => "unique_violation",
            DbErrorKind::ForeignKeyViolation => "foreign_key_violation",
            DbErrorKind::InvalidInput => "invalid_input",
            DbErrorKind::IntegrityViolation => "integrity_violation",
            DbErrorKind::RetryableConflict => "retryable_conflict",
            DbErrorKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a sqlx error.
///
/// Transient faults are checked first: they never carry a SQLSTATE.
pub fn classify(err: &sqlx::Error) -> DbErrorKind {
    if is_transient(err) {
        return DbErrorKind::Transient;
    }

    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| classify_sqlstate(&code))
            .unwrap_or(DbErrorKind::Unclassified),
        _ => DbErrorKind::Unclassified,
    }
}

/// Map a PostgreSQL SQLSTATE code to a kind
pub fn classify_sqlstate(code: &str) -> DbErrorKind {
    match code {
        "23505" => DbErrorKind::UniqueViolation,
        "23503" => DbErrorKind::ForeignKeyViolation,
        "22P02" => DbErrorKind::InvalidInput,
        "23514" => DbErrorKind::IntegrityViolation,
        // serialization_failure, deadlock_detected
        "40001" | "40P01" => DbErrorKind::RetryableConflict,
        _ => DbErrorKind::Unclassified,
    }
}

/// Connection level faults worth another attempt
pub fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::TimedOut
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::BrokenPipe
    )
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(io_err) => is_transient_io(io_err.kind()),
        // sqlx keeps retrying refused connects internally until acquire_timeout
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error(kind: io::ErrorKind) -> sqlx::Error {
        sqlx::Error::Io(io::Error::new(kind, "socket failure"))
    }

    #[test]
    fn test_network_faults_are_transient() {
        for kind in [
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::TimedOut,
            io::ErrorKind::HostUnreachable,
            io::ErrorKind::NetworkUnreachable,
            io::ErrorKind::BrokenPipe,
        ] {
            assert_eq!(classify(&io_error(kind)), DbErrorKind::Transient, "{:?}", kind);
        }
    }

    #[test]
    fn test_other_io_errors_are_unclassified() {
        assert_eq!(
            classify(&io_error(io::ErrorKind::PermissionDenied)),
            DbErrorKind::Unclassified
        );
        assert_eq!(
            classify(&io_error(io::ErrorKind::UnexpectedEof)),
            DbErrorKind::Unclassified
        );
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        assert_eq!(classify(&sqlx::Error::PoolTimedOut), DbErrorKind::Transient);
    }

    #[test]
    fn test_shapeless_errors_degrade_to_unclassified() {
        assert_eq!(classify(&sqlx::Error::PoolClosed), DbErrorKind::Unclassified);
        assert_eq!(classify(&sqlx::Error::RowNotFound), DbErrorKind::Unclassified);
        assert_eq!(
            classify(&sqlx::Error::Protocol("unexpected message".to_string())),
            DbErrorKind::Unclassified
        );
    }

    #[test]
    fn test_sqlstate_mapping() {
        assert_eq!(classify_sqlstate("23505"), DbErrorKind::UniqueViolation);
        assert_eq!(classify_sqlstate("23503"), DbErrorKind::ForeignKeyViolation);
        assert_eq!(classify_sqlstate("22P02"), DbErrorKind::InvalidInput);
        assert_eq!(classify_sqlstate("23514"), DbErrorKind::IntegrityViolation);
        assert_eq!(classify_sqlstate("40001"), DbErrorKind::RetryableConflict);
        assert_eq!(classify_sqlstate("40P01"), DbErrorKind::RetryableConflict);
    }

    #[test]
    fn test_unknown_sqlstate_is_unclassified() {
        assert_eq!(classify_sqlstate("42P01"), DbErrorKind::Unclassified);
        assert_eq!(classify_sqlstate(""), DbErrorKind::Unclassified);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DbErrorKind::RetryableConflict.to_string(), "retryable_conflict");
        assert_eq!(DbErrorKind::Transient.to_string(), "transient");
    }
}
