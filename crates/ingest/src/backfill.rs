//! Historical backfill of a newly observed space.
//!
//! The walker visits every text channel of the space, pages backwards through
//! its history and feeds each message through the same [`Ingestor`] used for
//! live traffic. Messages are processed in the order the archive returns
//! them; the page cursor is the id of the last message of the previous page
//! and says nothing about timestamps.

use crate::archive::{ArchiveSource, OperatorNotifier};
use crate::error::{IngestError, IngestResult};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::registry::SpaceRegistry;
use dirtonyou_core::constants::MAX_PAGE_SIZE;
use dirtonyou_core::{Channel, ChannelKind};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Summary of one space walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    pub space_id: String,
    pub space_name: String,
    /// Channels of any kind in the space.
    pub channels_total: usize,
    /// Text channels walked to the end.
    pub channels_completed: usize,
    /// Text channels aborted by a fetch error.
    pub channels_failed: Vec<String>,
    pub fetches: usize,
    pub messages_seen: usize,
    pub messages_flagged: usize,
    pub persist_failures: usize,
    pub elapsed: Duration,
    /// False when shutdown interrupted the walk.
    pub finished: bool,
}

#[derive(Debug, Default)]
struct ChannelWalk {
    fetches: usize,
    messages: usize,
    flagged: usize,
    persist_failures: usize,
    error: Option<IngestError>,
    interrupted: bool,
}

pub struct BackfillWalker {
    source: Arc<dyn ArchiveSource>,
    notifier: Arc<dyn OperatorNotifier>,
    ingestor: Ingestor,
    registry: SpaceRegistry,
    page_size: usize,
    shutdown: watch::Receiver<bool>,
}

impl BackfillWalker {
    pub fn new(
        source: Arc<dyn ArchiveSource>,
        notifier: Arc<dyn OperatorNotifier>,
        ingestor: Ingestor,
        registry: SpaceRegistry,
        page_size: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            notifier,
            ingestor,
            registry,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            shutdown,
        }
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Walk the whole archive of `space_id`.
    ///
    /// Fails only when the space itself cannot be described (name or channel
    /// list unavailable). A failing channel is logged, counted in the report,
    /// and the walk moves on to the next one.
    pub async fn walk(&self, space_id: &str) -> IngestResult<BackfillReport> {
        let started = Instant::now();

        let space_name = self.source.space_name(space_id).await?;
        let channels = self.source.channels(space_id).await?;

        let mut report = BackfillReport {
            space_id: space_id.to_string(),
            space_name: space_name.clone(),
            channels_total: channels.len(),
            ..BackfillReport::default()
        };

        info!(space = %space_id, name = %space_name, channels = channels.len(), "backfill started");
        self.tell(&format!(
            "I've started backfilling **{}**, found **{}** channels",
            space_name,
            channels.len()
        ))
        .await;

        let mut interrupted = false;
        for channel in channels.iter().filter(|c| c.kind == ChannelKind::Text) {
            if self.stopping() {
                interrupted = true;
                break;
            }

            self.tell(&format!(
                "Started on **{}** in **{}**",
                channel.name, space_name
            ))
            .await;

            let walk = self.walk_channel(space_id, channel).await;
            report.fetches += walk.fetches;
            report.messages_seen += walk.messages;
            report.messages_flagged += walk.flagged;
            report.persist_failures += walk.persist_failures;

            if let Some(err) = &walk.error {
                warn!(
                    space = %space_id,
                    channel = %channel.name,
                    error = %err,
                    "archive fetch failed, abandoning channel"
                );
                report.channels_failed.push(channel.id.clone());
            } else if !walk.interrupted {
                report.channels_completed += 1;
            }

            self.tell(&format!(
                "Done with **{}** in **{}** found **{}** messages.",
                channel.name, space_name, walk.messages
            ))
            .await;

            if walk.interrupted {
                interrupted = true;
                break;
            }
        }

        report.elapsed = started.elapsed();

        if interrupted {
            info!(space = %space_id, messages = report.messages_seen, "backfill interrupted by shutdown");
            self.tell(&format!(
                "Backfill of **{}** was interrupted after **{}** messages",
                space_name, report.messages_seen
            ))
            .await;
            return Ok(report);
        }

        report.finished = true;
        if let Err(err) = self.registry.mark_backfilled(space_id).await {
            warn!(space = %space_id, error = %err, "could not mark space as backfilled");
        }

        info!(
            space = %space_id,
            messages = report.messages_seen,
            flagged = report.messages_flagged,
            failed_channels = report.channels_failed.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "backfill finished"
        );
        self.tell(&format!(
            "Server **{}** has been backfilled. It took {:.2?}. Found a total of **{}** messages",
            space_name, report.elapsed, report.messages_seen
        ))
        .await;

        Ok(report)
    }

    async fn walk_channel(&self, space_id: &str, channel: &Channel) -> ChannelWalk {
        let mut walk = ChannelWalk::default();
        let mut cursor: Option<String> = None;

        loop {
            if self.stopping() {
                walk.interrupted = true;
                break;
            }

            let page = match self
                .source
                .fetch_page(space_id, &channel.id, self.page_size, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    walk.error = Some(err);
                    break;
                }
            };
            walk.fetches += 1;

            if page.is_empty() {
                break;
            }

            for msg in &page {
                match self.ingestor.ingest(msg).await {
                    IngestOutcome::Flagged { .. } => walk.flagged += 1,
                    IngestOutcome::Failed => walk.persist_failures += 1,
                    _ => {}
                }
            }
            walk.messages += page.len();

            debug!(
                channel = %channel.id,
                page = walk.fetches,
                size = page.len(),
                "archive page processed"
            );

            if page.len() < self.page_size {
                break;
            }
            cursor = page.last().map(|m| m.id.clone());
        }

        walk
    }

    async fn tell(&self, text: &str) {
        if let Err(err) = self.notifier.notify(text).await {
            warn!(error = %err, "operator notification failed");
        }
    }
}
