//! Push job: send pending local changes, clear them on acknowledgment

use std::sync::Arc;

use serde::Serialize;

use super::gateway::SyncGateway;
use super::payload::PushPayload;
use super::{single_flight, SyncError, SyncResult};
use crate::db::{Acknowledged, PerKind, Store};

/// Outcome of a successful push run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// Records sent, per kind
    pub sent: PerKind<usize>,
    /// Rows purged or cleaned after the acknowledgment
    pub acknowledged: PerKind<Acknowledged>,
    /// True when nothing was dirty and the round trip was skipped
    pub skipped: bool,
}

impl PushReport {
    pub fn purged(&self) -> usize {
        self.acknowledged.iter().map(|(_, ack)| ack.purged).sum()
    }

    pub fn cleaned(&self) -> usize {
        self.acknowledged.iter().map(|(_, ack)| ack.cleaned).sum()
    }
}

/// Gathers every dirty record, sends one composite push and clears dirty
/// state only after the server reports success.
///
/// Delivery is at-least-once: if the process dies between the request and
/// the acknowledgment, the same changes are sent again on the next run.
#[derive(Clone)]
pub struct PushSyncJob {
    store: Store,
    gateway: Arc<dyn SyncGateway>,
    skip_when_clean: bool,
}

impl PushSyncJob {
    pub fn new(store: Store, gateway: Arc<dyn SyncGateway>) -> Self {
        Self {
            store,
            gateway,
            skip_when_clean: false,
        }
    }

    /// Skip the network round trip when no record is dirty
    #[must_use]
    pub const fn skip_when_clean(mut self, skip: bool) -> Self {
        self.skip_when_clean = skip;
        self
    }

    pub async fn run(&self) -> SyncResult<PushReport> {
        let result = self.push().await;
        match &result {
            Ok(report) if report.skipped => tracing::debug!("Push skipped, nothing to send"),
            Ok(report) => tracing::info!(
                sent = report.sent.total(),
                purged = report.purged(),
                cleaned = report.cleaned(),
                "Push acknowledged"
            ),
            Err(SyncError::AlreadyRunning) => {
                tracing::debug!("Push skipped, another sync run holds the lease");
            }
            Err(error) => tracing::warn!("Push failed: {}", error),
        }
        result
    }

    async fn push(&self) -> SyncResult<PushReport> {
        let Some(token) = self.gateway.access_token().await else {
            return Err(SyncError::Auth("no session token".to_string()));
        };

        single_flight(&self.store, self.push_with(&token)).await
    }

    async fn push_with(&self, token: &str) -> SyncResult<PushReport> {
        let dirty = self.store.dirty_snapshot().await?;
        if dirty.is_empty() && self.skip_when_clean {
            return Ok(PushReport {
                skipped: true,
                ..PushReport::default()
            });
        }

        let payload = PushPayload::from(&dirty);
        let ack = self.gateway.push(token, &payload).await?;
        if !ack.is_success() {
            let message = if ack.message.trim().is_empty() {
                "server reported an error".to_string()
            } else {
                ack.message
            };
            return Err(SyncError::Server(message));
        }

        let acknowledged = self.store.acknowledge(&dirty).await?;
        Ok(PushReport {
            sent: dirty.counts(),
            acknowledged,
            skipped: false,
        })
    }
}
