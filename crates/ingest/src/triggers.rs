//! Trigger word store with an atomically swapped in-memory snapshot.

use crate::database::{with_timeout, Repository};
use crate::error::{IngestError, IngestResult};
use arc_swap::ArcSwapOption;
use dirtonyou_core::{TriggerSnapshot, TriggerWord};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of adding a trigger word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyExists,
}

/// Result of removing a trigger word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Owner of the trigger word table and its cached snapshot.
///
/// Clones share the same snapshot cell.
#[derive(Clone)]
pub struct TriggerStore {
    repo: Arc<Repository>,
    cache: Arc<ArcSwapOption<TriggerSnapshot>>,
    // held from the table read until the snapshot is stored
    reload_lock: Arc<Mutex<()>>,
    op_timeout: Duration,
}

impl TriggerStore {
    pub fn new(repo: Arc<Repository>, op_timeout: Duration) -> Self {
        Self {
            repo,
            cache: Arc::new(ArcSwapOption::empty()),
            reload_lock: Arc::new(Mutex::new(())),
            op_timeout,
        }
    }

    /// Current snapshot, or `None` if no load has ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<TriggerSnapshot>> {
        self.cache.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.load().is_some()
    }

    /// Replace the cached snapshot with the persisted word set.
    ///
    /// On failure the previous snapshot stays in place. Concurrent reloads
    /// are serialized, so the last one to store read the latest table.
    pub async fn reload(&self) -> IngestResult<usize> {
        let _guard = self.reload_lock.lock().await;
        let words = with_timeout(
            self.op_timeout,
            "load trigger words",
            self.repo.list_trigger_words(),
        )
        .await
        .map_err(|err| {
            warn!(error = %err, "trigger reload failed, keeping previous snapshot");
            err
        })?;

        let count = words.len();
        self.cache.store(Some(Arc::new(TriggerSnapshot::new(words))));
        info!(count, "trigger snapshot reloaded");
        Ok(count)
    }

    /// Insert a word unless it is already present.
    pub async fn add(&self, raw: &str) -> IngestResult<AddOutcome> {
        let word = normalize(raw)?;
        let inserted = with_timeout(
            self.op_timeout,
            "insert trigger word",
            self.repo.insert_trigger_word(&word),
        )
        .await?;

        let outcome = if inserted {
            AddOutcome::Added
        } else {
            AddOutcome::AlreadyExists
        };
        debug!(word = %word, ?outcome, "trigger add");
        self.refresh_after_change().await;
        Ok(outcome)
    }

    /// Delete a word if it is present.
    pub async fn remove(&self, raw: &str) -> IngestResult<RemoveOutcome> {
        let word = normalize(raw)?;
        let deleted = with_timeout(
            self.op_timeout,
            "delete trigger word",
            self.repo.delete_trigger_word(&word),
        )
        .await?;

        let outcome = if deleted {
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotFound
        };
        debug!(word = %word, ?outcome, "trigger remove");
        self.refresh_after_change().await;
        Ok(outcome)
    }

    /// All persisted words, ordered alphabetically.
    pub async fn list(&self) -> IngestResult<Vec<TriggerWord>> {
        with_timeout(
            self.op_timeout,
            "list trigger words",
            self.repo.list_trigger_words(),
        )
        .await
    }

    async fn refresh_after_change(&self) {
        // reload() already logged the failure
        let _ = self.reload().await;
    }
}

fn normalize(raw: &str) -> IngestResult<String> {
    TriggerWord::normalize(raw)
        .ok_or_else(|| IngestError::validation("trigger word must not be empty"))
}
