//! Command-line interface for DirtOnYou.
//!
//! Operates the ingestion pipeline from a terminal: schema setup, trigger
//! word maintenance, purging, one-off backfills and replaying message events.

#![deny(missing_docs, unsafe_code)]

/// CLI command definitions and parsing.
pub mod commands;

/// CLI application entry point and configuration.
pub mod app;

/// Error types for CLI operations.
pub mod error;
