//! Tracing subscriber setup for Melware
//!
//! Middleware in `melware-web` only emits `tracing` events; this crate
//! decides where they go. Use [`init_simple_tracing`] for a plain console
//! subscriber or [`init_logging_from_config`] to honor a [`LoggingConfig`].

pub mod init;

pub use init::{init_logging_from_config, init_simple_tracing, LoggingGuard};
pub use melware_config::{LogFormat, LogLevel, LogTarget, LoggingConfig};
