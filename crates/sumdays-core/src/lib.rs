//! sumdays-core - Core library for Sumdays
//!
//! This crate contains the journaling record models, the local record store
//! with per-record dirty tracking, and the offline-first sync engine that
//! pushes local changes to the Sumdays server and bootstraps new devices from
//! a full server snapshot.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use db::{DirtyTracker, Store};
pub use error::{Error, Result};
pub use models::{DailyEntry, DirtyState, Memo, RecordKind, UserStyle, WeekSummary};
pub use state::{SyncState, SyncStatus};
