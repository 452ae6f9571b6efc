//! Pull job: replace every local table with the server snapshot

use std::sync::Arc;

use serde::Serialize;

use super::gateway::SyncGateway;
use super::{single_flight, SyncError, SyncResult};
use crate::db::{LocalSnapshot, PerKind, Store};

/// Outcome of a successful pull run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Records installed, per kind
    pub installed: PerKind<usize>,
}

/// Destructive bootstrap from server truth.
///
/// All four tables are replaced in one transaction; on any failure the local
/// store is left exactly as it was. With the dirty guard enabled, the job
/// refuses to run while unpushed changes exist.
#[derive(Clone)]
pub struct PullSyncJob {
    store: Store,
    gateway: Arc<dyn SyncGateway>,
    guard_dirty: bool,
}

impl PullSyncJob {
    pub fn new(store: Store, gateway: Arc<dyn SyncGateway>) -> Self {
        Self {
            store,
            gateway,
            guard_dirty: false,
        }
    }

    /// Fail with [`SyncError::DirtyStatePending`] instead of discarding
    /// unpushed local changes
    #[must_use]
    pub const fn guard_dirty(mut self, guard: bool) -> Self {
        self.guard_dirty = guard;
        self
    }

    pub async fn run(&self) -> SyncResult<PullReport> {
        let result = self.pull().await;
        match &result {
            Ok(report) => tracing::info!(
                installed = report.installed.total(),
                "Replaced local records with server snapshot"
            ),
            Err(SyncError::AlreadyRunning) => {
                tracing::debug!("Pull skipped, another sync run holds the lease");
            }
            Err(error) => tracing::warn!("Pull failed: {}", error),
        }
        result
    }

    async fn pull(&self) -> SyncResult<PullReport> {
        let Some(token) = self.gateway.access_token().await else {
            return Err(SyncError::Auth("token_error".to_string()));
        };

        single_flight(&self.store, self.pull_with(&token)).await
    }

    async fn pull_with(&self, token: &str) -> SyncResult<PullReport> {
        if self.guard_dirty {
            self.ensure_clean().await?;
        }

        let snapshot = self
            .gateway
            .fetch_snapshot(token)
            .await?
            .ok_or_else(|| SyncError::Data("empty snapshot body".to_string()))?;
        let local = LocalSnapshot::try_from(snapshot)?;

        let installed = if self.guard_dirty {
            match self.store.replace_all_when_clean(&local).await? {
                Some(installed) => installed,
                // Edited while the snapshot was in flight
                None => return Err(self.pending_error().await),
            }
        } else {
            self.store.replace_all(&local).await?
        };

        Ok(PullReport { installed })
    }

    async fn ensure_clean(&self) -> SyncResult<()> {
        let pending = self.store.dirty_counts().await?.total();
        if pending > 0 {
            return Err(SyncError::DirtyStatePending(pending));
        }
        Ok(())
    }

    async fn pending_error(&self) -> SyncError {
        match self.store.dirty_counts().await {
            Ok(counts) => SyncError::DirtyStatePending(counts.total().max(1)),
            Err(error) => error.into(),
        }
    }
}
