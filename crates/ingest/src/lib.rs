//! Message ingestion for DirtOnYou.
//!
//! Live chat events and historical backfill share one path: match the text
//! against the current trigger snapshot, then persist the message together
//! with the ids of every trigger it hit.

pub mod admin;
pub mod archive;
pub mod backfill;
pub mod database;
pub mod discord;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod monitor;
pub mod persist;
pub mod registry;
pub mod triggers;

pub use admin::AdminCommands;
pub use archive::{ArchiveSource, LogNotifier, OperatorNotifier};
pub use backfill::{BackfillReport, BackfillWalker};
pub use database::{connect, run_migrations, Repository};
pub use discord::DiscordClient;
pub use error::{IngestError, IngestResult};
pub use ingest::{IngestOutcome, Ingestor};
pub use matcher::match_triggers;
pub use monitor::{DispatchStats, Dispatcher, EventRoute, Monitor};
pub use persist::MessagePersister;
pub use registry::{Registration, SpaceRegistry};
pub use triggers::{AddOutcome, RemoveOutcome, TriggerStore};
