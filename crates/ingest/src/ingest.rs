//! The match-then-persist path shared by live messages and backfill.

use crate::matcher::match_triggers;
use crate::persist::MessagePersister;
use crate::triggers::TriggerStore;
use dirtonyou_core::{ChatMessage, FlaggedMessage, TriggerId};
use tracing::{debug, warn};

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Written by the bot itself.
    OwnMessage,
    /// Trigger snapshot never loaded.
    NotReady,
    NoMatch,
    Flagged {
        message_id: i64,
        trigger_ids: Vec<TriggerId>,
    },
    /// Persistence failed; the message was dropped.
    Failed,
}

impl IngestOutcome {
    pub fn is_flagged(&self) -> bool {
        matches!(self, IngestOutcome::Flagged { .. })
    }
}

#[derive(Clone)]
pub struct Ingestor {
    triggers: TriggerStore,
    persister: MessagePersister,
    self_id: Option<String>,
}

impl Ingestor {
    /// `self_id` is the bot's own user id; its messages are ignored.
    pub fn new(triggers: TriggerStore, persister: MessagePersister, self_id: Option<String>) -> Self {
        Self {
            triggers,
            persister,
            self_id,
        }
    }

    pub fn triggers(&self) -> &TriggerStore {
        &self.triggers
    }

    /// Match `msg` against the current snapshot and store it if anything hit.
    ///
    /// Never returns an error: failures are logged and reported as
    /// [`IngestOutcome::Failed`] so a batch keeps going.
    pub async fn ingest(&self, msg: &ChatMessage) -> IngestOutcome {
        if self.self_id.as_deref() == Some(msg.author_id.as_str()) {
            return IngestOutcome::OwnMessage;
        }

        let Some(snapshot) = self.triggers.snapshot() else {
            debug!(message = %msg.id, "trigger snapshot not loaded yet, skipping");
            return IngestOutcome::NotReady;
        };

        let matched = match_triggers(&msg.content, Some(snapshot.as_ref()));
        if matched.is_empty() {
            return IngestOutcome::NoMatch;
        }

        let flagged = FlaggedMessage {
            author_id: msg.author_id.clone(),
            space_id: msg.space_id.clone(),
            content: msg.content.clone(),
            trigger_ids: matched.into_iter().collect(),
            ts: msg.ts,
        };

        match self.persister.persist(&flagged).await {
            Ok(message_id) => IngestOutcome::Flagged {
                message_id,
                trigger_ids: flagged.trigger_ids,
            },
            Err(err) => {
                warn!(
                    message = %msg.id,
                    space = %msg.space_id,
                    error = %err,
                    connectivity = err.is_connectivity(),
                    "failed to persist flagged message, dropping it"
                );
                IngestOutcome::Failed
            }
        }
    }
}
