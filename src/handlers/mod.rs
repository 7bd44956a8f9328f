//! Command Handlers module
//!
//! Handlers that orchestrate business operations over the data-access core.

mod commands;
mod transfer_handler;

pub use commands::*;
pub use transfer_handler::{LockedBalance, TransferHandler};
