//! Core types, errors, and configuration for DirtOnYou.
//!
//! This crate holds the pieces shared by the ingestion pipeline and the
//! command-line front end: the domain model for trigger words and flagged
//! messages, the configuration file format, and the common error type.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use types::*;
