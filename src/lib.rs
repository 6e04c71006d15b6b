//! LLRP inventory-and-access client for Impinj readers.
//!
//! [`session::run`] connects to a reader, installs an inventory and an access
//! specification, prints tag reports for a bounded time and tears down.

pub mod config;
pub mod error;
pub mod llrp;
pub mod session;

pub use error::{AppError, Result};
