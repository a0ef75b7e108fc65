//! Logging utilities.
//!
//! Components log through the `log` facade; binaries call [`init_logging`]
//! once early in `main` to install the `env_logger` backend.

mod init;

pub use init::{init_logging, LoggingConfig};