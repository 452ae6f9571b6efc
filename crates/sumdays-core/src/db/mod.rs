//! Local record store for Sumdays

mod changes;
mod connection;
mod jobs;
mod lease;
mod migrations;
mod record;
mod tracker;

pub use changes::{Acknowledged, DirtySet, KindDelta, LocalSnapshot, PerKind};
pub use connection::Store;
pub use jobs::JobDescriptor;
pub use lease::{RunLease, LEASE_TTL_SECS, SYNC_LEASE};
pub use record::SyncRecord;
pub use tracker::{DirtyTracker, SyncMark};
