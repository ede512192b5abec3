//! Operator-facing commands: trigger word maintenance and the bulk purge.
//!
//! Every method returns the reply text to show the issuer; failures are
//! logged here and rendered into that text.

use crate::database::{with_timeout, PurgeCounts, Repository};
use crate::error::IngestResult;
use crate::triggers::{AddOutcome, RemoveOutcome, TriggerStore};
use dirtonyou_core::constants::UNAUTHORIZED_REPLY;
use dirtonyou_core::TriggerWord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AdminCommands {
    admin_id: Option<String>,
    triggers: TriggerStore,
    repo: Arc<Repository>,
    op_timeout: Duration,
}

impl AdminCommands {
    pub fn new(
        admin_id: Option<String>,
        triggers: TriggerStore,
        repo: Arc<Repository>,
        op_timeout: Duration,
    ) -> Self {
        Self {
            admin_id,
            triggers,
            repo,
            op_timeout,
        }
    }

    /// With no admin configured nobody is an admin.
    pub fn is_admin(&self, issuer: &str) -> bool {
        self.admin_id.as_deref() == Some(issuer)
    }

    pub async fn add_word(&self, issuer: &str, word: &str) -> String {
        if !self.is_admin(issuer) {
            return UNAUTHORIZED_REPLY.to_string();
        }
        let shown = display_word(word);
        match self.triggers.add(word).await {
            Ok(AddOutcome::Added) => {
                info!(word = %shown, "trigger word added");
                format!("Word '{}' added successfully.", shown)
            }
            Ok(AddOutcome::AlreadyExists) => {
                format!("Word '{}' already exists in the database.", shown)
            }
            Err(err) => {
                warn!(word = %shown, error = %err, "trigger word add failed");
                format!("Failed to add word: {}", err)
            }
        }
    }

    pub async fn remove_word(&self, issuer: &str, word: &str) -> String {
        if !self.is_admin(issuer) {
            return UNAUTHORIZED_REPLY.to_string();
        }
        let shown = display_word(word);
        match self.triggers.remove(word).await {
            Ok(RemoveOutcome::Removed) => {
                info!(word = %shown, "trigger word removed");
                format!("Word '{}' removed successfully.", shown)
            }
            Ok(RemoveOutcome::NotFound) => {
                format!("Word '{}' does not exist in the database.", shown)
            }
            Err(err) => {
                warn!(word = %shown, error = %err, "trigger word remove failed");
                format!("Failed to remove word: {}", err)
            }
        }
    }

    /// Open to everyone.
    pub async fn list_words(&self) -> String {
        match self.triggers.list().await {
            Ok(words) => render_word_list(&words),
            Err(err) => {
                warn!(error = %err, "listing trigger words failed");
                "Error processing words.".to_string()
            }
        }
    }

    /// Drop every flagged message and forget every space, so each space is
    /// backfilled again on its next message.
    pub async fn purge(&self, issuer: &str) -> String {
        if !self.is_admin(issuer) {
            return UNAUTHORIZED_REPLY.to_string();
        }
        match self.purge_all().await {
            Ok(counts) => {
                info!(
                    messages = counts.messages,
                    spaces = counts.spaces,
                    "flagged messages purged"
                );
                "All data from messages has been deleted !!!".to_string()
            }
            Err(err) => {
                warn!(error = %err, "purge failed");
                format!("Failed to delete messages: {}", err)
            }
        }
    }

    pub async fn purge_all(&self) -> IngestResult<PurgeCounts> {
        with_timeout(
            self.op_timeout,
            "purge messages",
            self.repo.purge_messages_and_spaces(),
        )
        .await
    }
}

fn display_word(raw: &str) -> String {
    TriggerWord::normalize(raw).unwrap_or_else(|| raw.trim().to_string())
}

fn render_word_list(words: &[TriggerWord]) -> String {
    if words.is_empty() {
        return "No words found.".to_string();
    }
    let joined = words
        .iter()
        .map(|w| w.word.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Words: {}", joined)
}
