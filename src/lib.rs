//! credit_ledger Library
//!
//! Re-exports modules for integration testing and external use.

pub mod account;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;

pub use config::{Config, ConfigError, DatabaseConfig};
pub use db::{Database, IsolationLevel, TransactionOptions};
pub use domain::{Account, Amount, AmountError, DomainError, DomainResult};
pub use error::{AppError, AppResult};
