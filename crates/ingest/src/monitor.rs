//! Event routing: new spaces go to the backfill walker, known spaces to the
//! live path.

use crate::archive::{ArchiveSource, OperatorNotifier};
use crate::backfill::{BackfillReport, BackfillWalker};
use crate::error::{IngestError, IngestResult};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::registry::{Registration, SpaceRegistry};
use dirtonyou_core::{ChatMessage, SpaceState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where an incoming event ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRoute {
    /// First message from this space; a backfill was launched instead.
    BackfillStarted,
    /// Handled inline by the live path.
    Live(IngestOutcome),
    /// The registry could not be consulted; the event was dropped.
    Dropped,
}

pub struct Monitor {
    registry: SpaceRegistry,
    ingestor: Ingestor,
    walker: Arc<BackfillWalker>,
    shutdown_tx: watch::Sender<bool>,
    backfills: Mutex<Vec<JoinHandle<Option<BackfillReport>>>>,
}

impl Monitor {
    pub fn new(
        registry: SpaceRegistry,
        ingestor: Ingestor,
        source: Arc<dyn ArchiveSource>,
        notifier: Arc<dyn OperatorNotifier>,
        page_size: usize,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let walker = Arc::new(BackfillWalker::new(
            source,
            notifier,
            ingestor.clone(),
            registry.clone(),
            page_size,
            shutdown_rx,
        ));
        Self {
            registry,
            ingestor,
            walker,
            shutdown_tx,
            backfills: Mutex::new(Vec::new()),
        }
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    /// Route one incoming message.
    ///
    /// The registry insert decides the route: the single caller that
    /// registers a space launches its backfill, every other event for that
    /// space (including ones arriving while the backfill runs) goes live.
    pub async fn handle_event(&self, msg: &ChatMessage) -> EventRoute {
        match self.registry.register(&msg.space_id).await {
            Ok(Registration::New) => {
                self.spawn_backfill(msg.space_id.clone());
                EventRoute::BackfillStarted
            }
            Ok(Registration::Known) => EventRoute::Live(self.ingestor.ingest(msg).await),
            Err(err) => {
                warn!(
                    space = %msg.space_id,
                    error = %err,
                    connectivity = err.is_connectivity(),
                    "space lookup failed, dropping event"
                );
                EventRoute::Dropped
            }
        }
    }

    /// Launch a background walk of `space_id` without waiting for it.
    pub fn spawn_backfill(&self, space_id: String) {
        let walker = Arc::clone(&self.walker);
        let handle = tokio::spawn(async move {
            match walker.walk(&space_id).await {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!(space = %space_id, error = %err, "backfill abandoned");
                    None
                }
            }
        });

        match self.backfills.lock() {
            Ok(mut guard) => {
                guard.retain(|h| !h.is_finished());
                guard.push(handle);
            }
            Err(_) => error!("backfill task list poisoned; task will not be awaited on shutdown"),
        }
    }

    /// Register `space_id` if needed and walk it on the calling task.
    ///
    /// A space whose walk already completed is refused with
    /// [`IngestError::AlreadyBackfilled`]; a `registering` space (for
    /// example one whose walk was interrupted) is walked.
    pub async fn backfill_now(&self, space_id: &str) -> IngestResult<BackfillReport> {
        match self.registry.state(space_id).await? {
            SpaceState::Known => {
                info!(space = %space_id, "space already backfilled, refusing to walk it again");
                return Err(IngestError::AlreadyBackfilled(space_id.to_string()));
            }
            SpaceState::Registering => {
                info!(space = %space_id, "resuming walk of a registered space");
            }
            SpaceState::Unknown => {
                self.registry.register(space_id).await?;
            }
        }
        self.walker.walk(space_id).await
    }

    /// Wait for every launched backfill to finish on its own.
    pub async fn wait_for_backfills(&self) -> Vec<BackfillReport> {
        let handles = self.take_handles();
        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "backfill task panicked"),
            }
        }
        reports
    }

    /// Ask running backfills to stop at the next page boundary.
    pub fn request_shutdown(&self) {
        // send_replace works even when every receiver is gone
        self.shutdown_tx.send_replace(true);
    }

    /// Request shutdown and wait for every backfill to release its
    /// resources.
    pub async fn shutdown(&self) -> Vec<BackfillReport> {
        self.request_shutdown();
        self.wait_for_backfills().await
    }

    fn take_handles(&self) -> Vec<JoinHandle<Option<BackfillReport>>> {
        match self.backfills.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

/// Counters for one dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub events: usize,
    pub backfills_started: usize,
    pub flagged: usize,
    pub dropped: usize,
    /// Events refused because their space lane was full.
    pub overflowed: usize,
}

impl DispatchStats {
    fn record(&mut self, route: &EventRoute) {
        self.events += 1;
        match route {
            EventRoute::BackfillStarted => self.backfills_started += 1,
            EventRoute::Live(outcome) if outcome.is_flagged() => self.flagged += 1,
            EventRoute::Live(IngestOutcome::Failed) | EventRoute::Dropped => self.dropped += 1,
            EventRoute::Live(_) => {}
        }
    }

    fn merge(&mut self, other: DispatchStats) {
        self.events += other.events;
        self.backfills_started += other.backfills_started;
        self.flagged += other.flagged;
        self.dropped += other.dropped;
        self.overflowed += other.overflowed;
    }
}

/// Fans incoming events out to one ordered lane per space.
///
/// Events of the same space are handled one after another in arrival order;
/// different spaces proceed concurrently. A full lane never blocks the
/// intake: the event is dropped and counted in
/// [`DispatchStats::overflowed`].
pub struct Dispatcher {
    monitor: Arc<Monitor>,
    lane_capacity: usize,
}

impl Dispatcher {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            monitor,
            lane_capacity: 256,
        }
    }

    pub fn with_lane_capacity(mut self, capacity: usize) -> Self {
        self.lane_capacity = capacity.max(1);
        self
    }

    /// Drain `events` until the sender side closes, then wait for every lane
    /// to empty.
    pub async fn run(self, mut events: mpsc::Receiver<ChatMessage>) -> DispatchStats {
        let mut lanes: HashMap<String, mpsc::Sender<ChatMessage>> = HashMap::new();
        let mut workers = Vec::new();
        let mut overflowed = 0usize;

        while let Some(msg) = events.recv().await {
            let lane = lanes.entry(msg.space_id.clone()).or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.lane_capacity);
                workers.push(tokio::spawn(run_lane(Arc::clone(&self.monitor), rx)));
                debug!(space = %msg.space_id, "opened dispatch lane");
                tx
            });
            match lane.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(msg)) => {
                    overflowed += 1;
                    warn!(space = %msg.space_id, message = %msg.id, "dispatch lane full, dropping event");
                }
                Err(TrySendError::Closed(msg)) => {
                    warn!(space = %msg.space_id, "dispatch lane closed unexpectedly, event lost");
                }
            }
        }

        drop(lanes);

        let mut stats = DispatchStats {
            overflowed,
            ..DispatchStats::default()
        };
        for result in futures::future::join_all(workers).await {
            match result {
                Ok(lane_stats) => stats.merge(lane_stats),
                Err(err) => warn!(error = %err, "dispatch lane panicked"),
            }
        }
        info!(
            events = stats.events,
            flagged = stats.flagged,
            backfills = stats.backfills_started,
            dropped = stats.dropped,
            overflowed = stats.overflowed,
            "dispatcher drained"
        );
        stats
    }
}

async fn run_lane(monitor: Arc<Monitor>, mut rx: mpsc::Receiver<ChatMessage>) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(msg) = rx.recv().await {
        let route = monitor.handle_event(&msg).await;
        stats.record(&route);
    }
    stats
}
