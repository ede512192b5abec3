//! Registry of observed spaces.

use crate::database::{with_timeout, Repository};
use crate::error::IngestResult;
use dirtonyou_core::SpaceState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of [`SpaceRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// This call inserted the row; the caller owns the backfill.
    New,
    /// Some earlier call already registered the space.
    Known,
}

#[derive(Clone)]
pub struct SpaceRegistry {
    repo: Arc<Repository>,
    op_timeout: Duration,
}

impl SpaceRegistry {
    pub fn new(repo: Arc<Repository>, op_timeout: Duration) -> Self {
        Self { repo, op_timeout }
    }

    /// Register `space_id` exactly once.
    ///
    /// The insert relies on the primary key, so two concurrent first
    /// messages from the same space cannot both see `New`.
    pub async fn register(&self, space_id: &str) -> IngestResult<Registration> {
        let inserted = with_timeout(
            self.op_timeout,
            "register space",
            self.repo
                .insert_space_if_absent(space_id, SpaceState::Registering.as_str()),
        )
        .await?;

        if inserted {
            info!(space = %space_id, "new space registered");
            Ok(Registration::New)
        } else {
            Ok(Registration::Known)
        }
    }

    pub async fn state(&self, space_id: &str) -> IngestResult<SpaceState> {
        let row = with_timeout(self.op_timeout, "read space", self.repo.get_space(space_id)).await?;
        Ok(row
            .map(|row| SpaceState::from_status(&row.status))
            .unwrap_or(SpaceState::Unknown))
    }

    /// Record that the backfill for `space_id` finished.
    pub async fn mark_backfilled(&self, space_id: &str) -> IngestResult<()> {
        let updated = with_timeout(
            self.op_timeout,
            "mark space backfilled",
            self.repo
                .set_space_status(space_id, SpaceState::Known.as_str()),
        )
        .await?;
        if !updated {
            // purged while the walk was running
            warn!(space = %space_id, "space row vanished before backfill completed");
        }
        Ok(())
    }
}
