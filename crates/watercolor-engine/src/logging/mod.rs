//! Logging setup.
//!
//! The engine itself only talks to the `log` facade; this module wires up
//! `env_logger` for binaries and diagnostics builds.

mod init;

pub use init::{init_logging, LoggingConfig};
