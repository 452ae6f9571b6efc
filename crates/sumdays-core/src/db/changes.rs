//! Cross-kind change sets: what a push sends and what a pull installs

use rusqlite::Connection;
use serde::Serialize;

use super::record::SyncRecord;
use super::tracker::DirtyTracker;
use crate::error::Result;
use crate::models::{DailyEntry, Memo, RecordKind, Stored, UserStyle, WeekSummary};

/// One value per record kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerKind<T> {
    pub memo: T,
    pub daily_entry: T,
    pub user_style: T,
    pub week_summary: T,
}

impl<T> PerKind<T> {
    pub const fn get(&self, kind: RecordKind) -> &T {
        match kind {
            RecordKind::Memo => &self.memo,
            RecordKind::DailyEntry => &self.daily_entry,
            RecordKind::UserStyle => &self.user_style,
            RecordKind::WeekSummary => &self.week_summary,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordKind, &T)> {
        RecordKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

impl PerKind<usize> {
    pub fn total(&self) -> usize {
        self.iter().map(|(_, count)| count).sum()
    }
}

/// Number of records awaiting push, per kind
pub(crate) fn count_dirty(conn: &Connection) -> Result<PerKind<usize>> {
    Ok(PerKind {
        memo: DirtyTracker::<Memo>::new(conn).count_dirty()?,
        daily_entry: DirtyTracker::<DailyEntry>::new(conn).count_dirty()?,
        user_style: DirtyTracker::<UserStyle>::new(conn).count_dirty()?,
        week_summary: DirtyTracker::<WeekSummary>::new(conn).count_dirty()?,
    })
}

/// Rows changed by an acknowledged push
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Acknowledged {
    pub purged: usize,
    pub cleaned: usize,
}

/// Pending changes of one kind
#[derive(Debug, Clone, PartialEq)]
pub struct KindDelta<R> {
    pub tombstones: Vec<Stored<R>>,
    pub edits: Vec<Stored<R>>,
}

impl<R> Default for KindDelta<R> {
    fn default() -> Self {
        Self {
            tombstones: Vec::new(),
            edits: Vec::new(),
        }
    }
}

impl<R: SyncRecord> KindDelta<R> {
    fn load(conn: &Connection) -> Result<Self> {
        let tracker = DirtyTracker::<R>::new(conn);
        Ok(Self {
            tombstones: tracker.dirty_tombstones()?,
            edits: tracker.dirty_edits()?,
        })
    }

    pub fn len(&self) -> usize {
        self.tombstones.len() + self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tombstones.is_empty() && self.edits.is_empty()
    }

    /// Purge acknowledged tombstones, then clean acknowledged edits
    fn acknowledge(&self, conn: &Connection) -> Result<Acknowledged> {
        let tracker = DirtyTracker::<R>::new(conn);
        let tombstones = self.tombstones.iter().map(Stored::mark).collect::<Vec<_>>();
        let edits = self.edits.iter().map(Stored::mark).collect::<Vec<_>>();
        Ok(Acknowledged {
            purged: tracker.purge(&tombstones)?,
            cleaned: tracker.mark_clean(&edits)?,
        })
    }
}

/// Every pending change across the four kinds, as observed at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirtySet {
    pub memo: KindDelta<Memo>,
    pub daily_entry: KindDelta<DailyEntry>,
    pub user_style: KindDelta<UserStyle>,
    pub week_summary: KindDelta<WeekSummary>,
}

impl DirtySet {
    pub(crate) fn load(conn: &Connection) -> Result<Self> {
        Ok(Self {
            memo: KindDelta::load(conn)?,
            daily_entry: KindDelta::load(conn)?,
            user_style: KindDelta::load(conn)?,
            week_summary: KindDelta::load(conn)?,
        })
    }

    pub(crate) fn acknowledge(&self, conn: &Connection) -> Result<PerKind<Acknowledged>> {
        Ok(PerKind {
            memo: self.memo.acknowledge(conn)?,
            daily_entry: self.daily_entry.acknowledge(conn)?,
            user_style: self.user_style.acknowledge(conn)?,
            week_summary: self.week_summary.acknowledge(conn)?,
        })
    }

    pub fn counts(&self) -> PerKind<usize> {
        PerKind {
            memo: self.memo.len(),
            daily_entry: self.daily_entry.len(),
            user_style: self.user_style.len(),
            week_summary: self.week_summary.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }
}

/// Full replacement contents for the four tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSnapshot {
    pub memos: Vec<Memo>,
    pub daily_entries: Vec<DailyEntry>,
    pub user_styles: Vec<UserStyle>,
    pub week_summaries: Vec<WeekSummary>,
}

impl LocalSnapshot {
    pub(crate) fn install(&self, conn: &Connection) -> Result<PerKind<usize>> {
        Ok(PerKind {
            memo: DirtyTracker::<Memo>::new(conn).replace_all(&self.memos)?,
            daily_entry: DirtyTracker::<DailyEntry>::new(conn).replace_all(&self.daily_entries)?,
            user_style: DirtyTracker::<UserStyle>::new(conn).replace_all(&self.user_styles)?,
            week_summary: DirtyTracker::<WeekSummary>::new(conn)
                .replace_all(&self.week_summaries)?,
        })
    }

    pub fn counts(&self) -> PerKind<usize> {
        PerKind {
            memo: self.memos.len(),
            daily_entry: self.daily_entries.len(),
            user_style: self.user_styles.len(),
            week_summary: self.week_summaries.len(),
        }
    }
}
