//! Domain module
//!
//! Core domain types and the caller-facing error taxonomy.

pub mod account;
pub mod amount;
pub mod error;

pub use account::{Account, AccountPatch, AccountWithCredential, ListParams, NewAccount};
pub use amount::{Amount, AmountError};
pub use error::{DomainError, DomainResult};
