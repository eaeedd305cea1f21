//! Logging utilities.
//!
//! Everything in the crate logs through the `log` facade. Hosts that do not
//! install their own logger can call [`init_logging`] early in `main`.

mod init;

pub use init::{init_logging, LoggingConfig};
