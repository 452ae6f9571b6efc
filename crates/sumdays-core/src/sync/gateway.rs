//! Network boundary consumed by the sync jobs

use async_trait::async_trait;
use thiserror::Error;

use super::payload::{PushAck, PushPayload, RemoteSnapshot};

/// Transport-level outcome of a gateway call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },
    #[error("malformed response: {0}")]
    Data(String),
}

/// Server access used by [`super::PushSyncJob`] and [`super::PullSyncJob`].
///
/// Retry and timeout policy belong to the implementation; the jobs only see
/// success or failure.
#[async_trait]
pub trait SyncGateway: Send + Sync {
    /// Bearer token of the current session, if any
    async fn access_token(&self) -> Option<String>;

    /// Send one composite push covering all record kinds
    async fn push(&self, token: &str, payload: &PushPayload) -> Result<PushAck, GatewayError>;

    /// Fetch the complete server dataset; `None` when the body is empty
    async fn fetch_snapshot(&self, token: &str) -> Result<Option<RemoteSnapshot>, GatewayError>;
}
