//! Shared sync status types observed by clients.

use serde::Serialize;

/// Coarse sync state shown by clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

/// Latest known outcome of the background sync jobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Unix seconds of the last successful job run
    pub last_success_at: Option<i64>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Offline,
            last_success_at: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

impl SyncStatus {
    pub(crate) fn begin(&mut self) {
        self.state = SyncState::Syncing;
    }

    pub(crate) fn succeed(&mut self, at: i64) {
        self.state = SyncState::Synced;
        self.last_success_at = Some(at);
        self.consecutive_failures = 0;
        self.last_error = None;
    }

    pub(crate) fn fail(&mut self, error: &crate::sync::SyncError) {
        self.state = if error.is_auth() {
            SyncState::Offline
        } else {
            SyncState::Error
        };
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncError;

    #[test]
    fn failures_accumulate_until_success() {
        let mut status = SyncStatus::default();
        status.begin();
        status.fail(&SyncError::Network("timeout".to_string()));
        status.fail(&SyncError::Server("HTTP 500".to_string()));
        assert_eq!(status.state, SyncState::Error);
        assert_eq!(status.consecutive_failures, 2);

        status.succeed(42);
        assert_eq!(status.state, SyncState::Synced);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.last_success_at, Some(42));
        assert!(status.last_error.is_none());
    }

    #[test]
    fn auth_failure_reports_offline() {
        let mut status = SyncStatus::default();
        status.fail(&SyncError::Auth("no session token".to_string()));
        assert_eq!(status.state, SyncState::Offline);
    }
}
