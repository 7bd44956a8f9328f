//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::db::{IsolationLevel, RetryPolicy, TransactionOptions};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name reported to PostgreSQL as application_name
    pub app_name: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub database: DatabaseConfig,
}

/// Pool, connector and transaction settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum database connections in pool
    pub pool_max_connections: u32,

    /// How long an idle connection stays in the pool; `None` keeps it forever
    pub idle_timeout: Option<Duration>,

    /// How long to wait for a connection before giving up on one attempt;
    /// `None` waits without limit
    pub connect_timeout: Option<Duration>,

    /// Total connection attempts, including the first
    pub connect_max_attempts: u32,

    pub connect_retry_base_delay: Duration,

    /// Isolation level for transactions that do not set one
    pub default_isolation_level: Option<IsolationLevel>,

    /// Whole-transaction retries on serialization failure / deadlock
    pub transaction_retries: u32,

    /// Require TLS to the database
    pub ssl: bool,
}

/// Stand-in for "no acquire timeout"; sqlx always needs a deadline
const UNBOUNDED_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(UNBOUNDED_ACQUIRE_TIMEOUT)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.connect_max_attempts, self.connect_retry_base_delay)
    }

    pub fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions {
            isolation_level: self.default_isolation_level,
            retries: self.transaction_retries,
            ..TransactionOptions::default()
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database = DatabaseConfig {
            url,
            pool_max_connections: parse_in_range(&lookup, "DB_POOL_MAX", 10, 1, 100)?,
            idle_timeout: timeout_ms(parse_in_range(
                &lookup,
                "DB_POOL_IDLE_TIMEOUT_MS",
                10_000,
                0,
                30_000,
            )?),
            connect_timeout: timeout_ms(parse_in_range(
                &lookup,
                "DB_POOL_CONNECT_TIMEOUT_MS",
                10_000,
                0,
                30_000,
            )?),
            connect_max_attempts: parse_in_range(&lookup, "DB_CONNECT_MAX_ATTEMPTS", 4, 1, 11)?,
            connect_retry_base_delay: Duration::from_millis(parse_in_range(
                &lookup,
                "DB_CONNECT_RETRY_BASE_DELAY_MS",
                1_000,
                0,
                30_000,
            )?),
            default_isolation_level: match lookup("DB_ISOLATION_LEVEL") {
                Some(value) if !value.trim().is_empty() => Some(
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("DB_ISOLATION_LEVEL"))?,
                ),
                _ => None,
            },
            transaction_retries: parse_in_range(&lookup, "DB_TRANSACTION_RETRIES", 3, 0, 10)?,
            ssl: parse_or(&lookup, "DB_SSL", false)?,
        };

        let app_name = lookup("APP_NAME").unwrap_or_else(|| "credit_ledger".to_string());
        if app_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue("APP_NAME"));
        }

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "PORT", 3000)?;
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        Ok(Self {
            app_name,
            host,
            port,
            environment,
            database,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// 0 disables the timeout
fn timeout_ms(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

fn parse_in_range<F, T>(
    lookup: &F,
    key: &'static str,
    default: T,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd,
{
    let value = parse_or(lookup, key, default)?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange(key));
    }
    Ok(value)
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),

    #[error("Value out of range for environment variable: {0}")]
    OutOfRange(&'static str),
}
