//! Offline-first sync engine.
//!
//! Local edits are tracked per record by the store. [`PushSyncJob`] sends
//! every pending change in one request and clears dirty state only after
//! the server acknowledges it. [`PullSyncJob`] bootstraps a device by
//! replacing all local tables with the server snapshot. [`PushScheduler`]
//! runs both through a single worker so they never overlap.

mod gateway;
mod http;
mod payload;
mod pull;
mod push;
mod scheduler;

use std::future::Future;

use thiserror::Error;

use crate::db::{Store, SYNC_LEASE};

pub use gateway::{GatewayError, SyncGateway};
pub use http::{HttpSyncGateway, SYNC_PATH};
pub use payload::{
    AckStatus, DailyEntryPayload, MemoPayload, PushAck, PushEntry, PushPayload, RemoteSnapshot,
    Tombstone, UserStylePayload, WeekSummaryPayload,
};
pub use pull::{PullReport, PullSyncJob};
pub use push::{PushReport, PushSyncJob};
pub use scheduler::{PushScheduler, Registration, AUTO_BACKUP_JOB, DEFAULT_PUSH_INTERVAL};

/// Why a sync job run failed. No local state changes on any of these.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or rejected session token
    #[error("Authentication required: {0}")]
    Auth(String),

    /// Transport failure, including timeouts
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status or an `"error"` acknowledgment
    #[error("Server error: {0}")]
    Server(String),

    /// Missing or malformed response body
    #[error("Invalid sync data: {0}")]
    Data(String),

    /// Local store failure while reading or applying a sync result
    #[error("Local transaction failed: {0}")]
    Transaction(#[from] crate::Error),

    /// Pull refused because local changes have not been pushed yet
    #[error("{0} local change(s) have not been pushed yet")]
    DirtyStatePending(usize),

    /// The scheduler worker is no longer running
    #[error("Sync scheduler is shut down")]
    SchedulerStopped,

    /// Another push or pull holds the sync lease on this database
    #[error("sync already running")]
    AlreadyRunning,
}

impl SyncError {
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<GatewayError> for SyncError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Network(message) => Self::Network(message),
            GatewayError::Status { code: 401 | 403, message } => Self::Auth(message),
            GatewayError::Status { message, .. } => Self::Server(message),
            GatewayError::Data(message) => Self::Data(message),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Run `job` while holding the store's sync lease.
///
/// Fails with [`SyncError::AlreadyRunning`] without polling `job` when any
/// other run, in this process or another, holds the lease.
async fn single_flight<T>(
    store: &Store,
    job: impl Future<Output = SyncResult<T>>,
) -> SyncResult<T> {
    let Some(lease) = store.try_acquire_lease(SYNC_LEASE).await? else {
        return Err(SyncError::AlreadyRunning);
    };

    let result = job.await;
    match store.release_lease(&lease).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!("Sync lease {} was taken over mid-run", lease.holder),
        Err(error) => tracing::warn!("Failed to release sync lease: {}", error),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_map_to_taxonomy() {
        let network: SyncError = GatewayError::Network("timed out".to_string()).into();
        assert!(matches!(network, SyncError::Network(_)));

        let server: SyncError = GatewayError::Status {
            code: 500,
            message: "boom (500)".to_string(),
        }
        .into();
        assert!(matches!(server, SyncError::Server(_)));

        let unauthorized: SyncError = GatewayError::Status {
            code: 401,
            message: "expired (401)".to_string(),
        }
        .into();
        assert!(unauthorized.is_auth());

        let data: SyncError = GatewayError::Data("not json".to_string()).into();
        assert!(matches!(data, SyncError::Data(_)));
    }
}
