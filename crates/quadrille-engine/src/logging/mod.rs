//! Logging utilities.
//!
//! Centralizes logger initialization. Subsystems log through the standard
//! `log` facade; filtering by level and by module comes from the
//! `env_logger` backend configured here.

mod init;

pub use init::{init, LogConfig};
