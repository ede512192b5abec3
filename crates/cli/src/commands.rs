//! CLI command definitions for DirtOnYou.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI application.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Logging verbosity; overrides the configured level when given
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "DIRTONYOU_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Database operations
    Db(DbArgs),

    /// Manage trigger words
    Words(WordsArgs),

    /// Delete every flagged message and forget every space
    Purge(PurgeArgs),

    /// Backfill one space now, on this process
    Backfill(BackfillArgs),

    /// Feed JSON-lines message events through the live pipeline
    Ingest(IngestArgs),
}

/// Database arguments.
#[derive(Args, Debug)]
pub struct DbArgs {
    /// Subcommand
    #[command(subcommand)]
    pub command: DbCommand,
}

/// Database subcommands.
#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Create the database file if needed and apply migrations
    Init,
}

/// Trigger word arguments.
#[derive(Args, Debug)]
pub struct WordsArgs {
    /// Subcommand
    #[command(subcommand)]
    pub command: WordsCommand,
}

/// Trigger word subcommands.
#[derive(Subcommand, Debug)]
pub enum WordsCommand {
    /// List every trigger word
    List,

    /// Add a trigger word
    Add {
        /// Word to add; stored lowercased
        #[arg(required = true)]
        word: String,
    },

    /// Remove a trigger word
    Remove {
        /// Word to remove
        #[arg(required = true)]
        word: String,
    },
}

/// Purge arguments.
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Confirm the purge
    #[arg(long)]
    pub yes: bool,
}

/// Backfill arguments.
#[derive(Args, Debug)]
pub struct BackfillArgs {
    /// Space (guild) id to walk
    #[arg(required = true)]
    pub space_id: String,
}

/// Ingest arguments.
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Input file with one JSON message per line; stdin when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Queue depth of each per-space lane
    #[arg(long, default_value_t = 256)]
    pub lane_capacity: usize,
}
