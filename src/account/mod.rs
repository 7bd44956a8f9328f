//! Account module
//!
//! Persistence for account rows.

mod repository;

pub use repository::{select_account, AccountRepository};
