//! Data models for Sumdays

mod daily_entry;
mod dirty_state;
mod memo;
mod user_style;
mod week_summary;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use daily_entry::DailyEntry;
pub use dirty_state::{DirtyState, Stored};
pub use memo::{Memo, TEXT_MEMO_TYPE};
pub use user_style::UserStyle;
pub use week_summary::WeekSummary;

/// The four record kinds that participate in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Memo,
    DailyEntry,
    UserStyle,
    WeekSummary,
}

impl RecordKind {
    pub const ALL: [Self; 4] = [
        Self::Memo,
        Self::DailyEntry,
        Self::UserStyle,
        Self::WeekSummary,
    ];

    /// Name of the kind in sync request/response bodies
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Memo => "memo",
            Self::DailyEntry => "dailyEntry",
            Self::UserStyle => "userStyle",
            Self::WeekSummary => "weekSummary",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
