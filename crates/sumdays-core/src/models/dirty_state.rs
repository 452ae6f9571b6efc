//! Dirty state of a locally stored record relative to the last confirmed sync

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sync classification of a record.
///
/// Replaces the `isEdited`/`isDeleted` flag pair; the combination
/// "deleted but not edited" has no representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirtyState {
    /// Synced and unchanged since
    #[default]
    Clean,
    /// New or modified locally, not yet acknowledged
    Edited,
    /// Deleted locally, awaiting acknowledged removal
    Tombstoned,
}

impl DirtyState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Edited => "edited",
            Self::Tombstoned => "tombstoned",
        }
    }

    /// Hidden from live queries but kept until the deletion is pushed
    pub const fn is_deleted(self) -> bool {
        matches!(self, Self::Tombstoned)
    }
}

impl fmt::Display for DirtyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirtyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(Self::Clean),
            "edited" => Ok(Self::Edited),
            "tombstoned" => Ok(Self::Tombstoned),
            other => Err(format!("unknown dirty state '{other}'")),
        }
    }
}

/// A record as held by the store, with its dirty state and local revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<R> {
    pub record: R,
    pub state: DirtyState,
    /// Bumped on every local mutation; reset to 0 by a full replace
    pub revision: i64,
}
