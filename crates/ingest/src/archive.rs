//! Seams to the chat platform: reading channel archives and telling the
//! operator what the backfill is doing.

use crate::error::IngestResult;
use async_trait::async_trait;
use dirtonyou_core::{Channel, ChatMessage};
use tracing::info;

/// Read access to a space's channels and their message history.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Human-readable name of the space, used in progress messages.
    async fn space_name(&self, space_id: &str) -> IngestResult<String>;

    /// Every channel in the space, of any kind.
    async fn channels(&self, space_id: &str) -> IngestResult<Vec<Channel>>;

    /// Up to `limit` messages older than `before` (or the newest ones when
    /// `before` is `None`), in whatever order the platform returns them.
    async fn fetch_page(
        &self,
        space_id: &str,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> IngestResult<Vec<ChatMessage>>;
}

/// One-way text channel to the operator.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> IngestResult<()>;
}

/// Notifier that only writes to the log, used when no operator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl OperatorNotifier for LogNotifier {
    async fn notify(&self, text: &str) -> IngestResult<()> {
        info!(target: "operator", "{}", text);
        Ok(())
    }
}
