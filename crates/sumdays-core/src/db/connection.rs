//! Shared record store handle used by clients and sync jobs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::Mutex;

use super::changes::{self, Acknowledged, DirtySet, LocalSnapshot, PerKind};
use super::jobs::{self, JobDescriptor};
use super::lease::{self, RunLease, LEASE_TTL_SECS};
use super::migrations;
use super::record::SyncRecord;
use super::tracker::DirtyTracker;
use crate::error::Result;
use crate::models::Memo;
use crate::util::unix_timestamp_now;

/// Thread-safe handle to the local `SQLite` store.
///
/// Opened once at process start and cloned into every job; all access is
/// serialized through one connection.
///
/// Statements run inside [`tokio::task::block_in_place`], so the store must
/// be used from a multi-threaded runtime.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Store {
    /// Open the store at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        Self::prepare(&conn)?;
        tracing::debug!("Opened record store at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn prepare(conn: &Connection) -> Result<()> {
        // WAL is unavailable for in-memory databases
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Another process may hold the write lock while taking a lease
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::run(conn)
    }

    /// Filesystem path of the store, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` with exclusive access to the connection
    pub async fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().await;
        tokio::task::block_in_place(|| f(&conn))
    }

    /// Run `f` inside one transaction; any error rolls the whole scope back
    pub async fn with_transaction<T>(
        &self,
        behavior: TransactionBehavior,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().await;
        tokio::task::block_in_place(|| -> Result<T> {
            let tx = conn.transaction_with_behavior(behavior)?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Run `f` against the dirty tracker of one kind
    pub async fn with_tracker<R: SyncRecord, T>(
        &self,
        f: impl FnOnce(&DirtyTracker<'_, R>) -> Result<T>,
    ) -> Result<T> {
        self.with_connection(|conn| f(&DirtyTracker::new(conn))).await
    }

    pub async fn insert<R: SyncRecord>(&self, record: &R) -> Result<i64> {
        self.with_tracker(|tracker: &DirtyTracker<'_, R>| tracker.insert(record))
            .await
    }

    pub async fn update<R: SyncRecord>(&self, record: &R) -> Result<i64> {
        self.with_tracker(|tracker: &DirtyTracker<'_, R>| tracker.update(record))
            .await
    }

    pub async fn soft_delete<R: SyncRecord>(&self, key: &R::Key) -> Result<()> {
        self.with_tracker(|tracker: &DirtyTracker<'_, R>| tracker.soft_delete(key))
            .await
    }

    pub async fn get<R: SyncRecord>(&self, key: &R::Key) -> Result<Option<R>> {
        self.with_tracker(|tracker: &DirtyTracker<'_, R>| tracker.get(key))
            .await
    }

    pub async fn live_query<R: SyncRecord>(&self) -> Result<Vec<R>> {
        self.with_tracker(|tracker: &DirtyTracker<'_, R>| tracker.live_query())
            .await
    }

    pub async fn live_query_by<R: SyncRecord>(
        &self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<R>> {
        self.with_tracker(|tracker: &DirtyTracker<'_, R>| tracker.live_query_by(column, value))
            .await
    }

    /// All pending changes, read in a single transaction
    pub async fn dirty_snapshot(&self) -> Result<DirtySet> {
        self.with_transaction(TransactionBehavior::Deferred, |tx| DirtySet::load(tx))
            .await
    }

    /// Apply a server acknowledgment for `pushed`: purge its tombstones, then
    /// mark its edits clean, for all kinds in one transaction
    pub async fn acknowledge(&self, pushed: &DirtySet) -> Result<PerKind<Acknowledged>> {
        self.with_transaction(TransactionBehavior::Immediate, |tx| pushed.acknowledge(tx))
            .await
    }

    /// Replace all four tables with `snapshot` in one transaction
    pub async fn replace_all(&self, snapshot: &LocalSnapshot) -> Result<PerKind<usize>> {
        self.with_transaction(TransactionBehavior::Immediate, |tx| snapshot.install(tx))
            .await
    }

    /// Like [`Self::replace_all`], but leaves every table untouched and
    /// returns `None` when any record is awaiting push
    pub async fn replace_all_when_clean(
        &self,
        snapshot: &LocalSnapshot,
    ) -> Result<Option<PerKind<usize>>> {
        self.with_transaction(TransactionBehavior::Immediate, |tx| {
            if changes::count_dirty(tx)?.total() > 0 {
                return Ok(None);
            }
            snapshot.install(tx).map(Some)
        })
        .await
    }

    /// Number of records awaiting push, per kind
    pub async fn dirty_counts(&self) -> Result<PerKind<usize>> {
        self.with_connection(changes::count_dirty).await
    }

    /// Next free memo id; tombstoned ids stay reserved until purged
    pub async fn next_memo_id(&self) -> Result<i64> {
        self.with_connection(|conn| next_memo_id(conn)).await
    }

    /// Append a text memo to the end of `date`
    pub async fn create_memo(&self, content: &str, date: &str) -> Result<Memo> {
        self.with_transaction(TransactionBehavior::Immediate, |tx| {
            let order: i32 = tx.query_row(
                "SELECT COALESCE(MAX(memo_order) + 1, 0) FROM memos
                 WHERE date = ?1 AND sync_state != 'tombstoned'",
                [date],
                |row| row.get(0),
            )?;
            let memo = Memo::new(next_memo_id(tx)?, content, date, order);
            DirtyTracker::<Memo>::new(tx).insert(&memo)?;
            Ok(memo)
        })
        .await
    }

    /// Live memos of one day in display order
    pub async fn memos_on(&self, date: &str) -> Result<Vec<Memo>> {
        self.live_query_by::<Memo>("date", date.to_string()).await
    }

    /// Persist a periodic job unless one with the same name exists
    pub async fn register_job(&self, descriptor: &JobDescriptor) -> Result<(JobDescriptor, bool)> {
        self.with_connection(|conn| jobs::save_if_absent(conn, descriptor))
            .await
    }

    pub async fn load_job(&self, name: &str) -> Result<Option<JobDescriptor>> {
        self.with_connection(|conn| jobs::load(conn, name)).await
    }

    pub async fn remove_job(&self, name: &str) -> Result<bool> {
        self.with_connection(|conn| jobs::remove(conn, name)).await
    }

    /// Take the named lease, or `None` while another run holds it.
    ///
    /// The lease lives in the database file, so it also excludes other
    /// processes opened on the same path.
    pub async fn try_acquire_lease(&self, name: &str) -> Result<Option<RunLease>> {
        self.with_transaction(TransactionBehavior::Immediate, |tx| {
            lease::try_acquire(tx, name, unix_timestamp_now(), LEASE_TTL_SECS)
        })
        .await
    }

    pub async fn release_lease(&self, held: &RunLease) -> Result<bool> {
        self.with_connection(|conn| lease::release(conn, held)).await
    }

    /// Current holder of the named lease, if any
    pub async fn lease_holder(&self, name: &str) -> Result<Option<String>> {
        self.with_connection(|conn| lease::holder(conn, name)).await
    }
}

fn next_memo_id(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM memos", [], |row| {
        row.get(0)
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SYNC_LEASE;
    use crate::error::Error;
    use crate::models::{DailyEntry, DirtyState};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("sumdays.db");

        let store = Store::open(&path).await.unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_records_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sumdays.db");

        {
            let store = Store::open(&path).await.unwrap();
            store.create_memo("persisted", "2024-05-01").await.unwrap();
        }

        let store = Store::open(&path).await.unwrap();
        let memos = store.memos_on("2024-05-01").await.unwrap();
        assert_eq!(memos.len(), 1);
        assert_eq!(memos[0].content, "persisted");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_memo_appends_within_day() {
        let store = Store::open_in_memory().await.unwrap();

        let first = store.create_memo("first", "2024-05-01").await.unwrap();
        let second = store.create_memo("second", "2024-05-01").await.unwrap();
        let other_day = store.create_memo("other", "2024-05-02").await.unwrap();

        assert_eq!((first.id, first.order), (1, 0));
        assert_eq!((second.id, second.order), (2, 1));
        assert_eq!((other_day.id, other_day.order), (3, 0));
        assert_eq!(store.next_memo_id().await.unwrap(), 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generic_access_by_kind() {
        let store = Store::open_in_memory().await.unwrap();
        let mut entry = DailyEntry::new("2024-05-01");
        entry.diary = Some("Walked by the river".to_string());

        store.insert(&entry).await.unwrap();
        let key = "2024-05-01".to_string();
        assert_eq!(store.get::<DailyEntry>(&key).await.unwrap(), Some(entry));

        store.soft_delete::<DailyEntry>(&key).await.unwrap();
        assert!(store.get::<DailyEntry>(&key).await.unwrap().is_none());
        assert!(matches!(
            store.soft_delete::<DailyEntry>(&key).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dirty_counts_and_acknowledge() {
        let store = Store::open_in_memory().await.unwrap();
        let memo = store.create_memo("a", "2024-05-01").await.unwrap();
        store.create_memo("b", "2024-05-01").await.unwrap();
        store.soft_delete::<Memo>(&memo.id).await.unwrap();
        store.insert(&DailyEntry::new("2024-05-01")).await.unwrap();

        let counts = store.dirty_counts().await.unwrap();
        assert_eq!(counts.memo, 2);
        assert_eq!(counts.daily_entry, 1);

        let dirty = store.dirty_snapshot().await.unwrap();
        let acked = store.acknowledge(&dirty).await.unwrap();
        assert_eq!(acked.memo, Acknowledged { purged: 1, cleaned: 1 });
        assert_eq!(acked.daily_entry, Acknowledged { purged: 0, cleaned: 1 });
        assert_eq!(store.dirty_counts().await.unwrap().total(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_all_is_atomic_across_kinds() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_memo("local", "2024-05-01").await.unwrap();
        store.insert(&DailyEntry::new("2024-05-01")).await.unwrap();

        // Valid memos, but the daily entries collide on their key
        let snapshot = LocalSnapshot {
            memos: vec![Memo::new(10, "server", "2024-05-03", 0)],
            daily_entries: vec![DailyEntry::new("2024-05-03"), DailyEntry::new("2024-05-03")],
            ..LocalSnapshot::default()
        };
        assert!(store.replace_all(&snapshot).await.is_err());

        let memos = store.live_query::<Memo>().await.unwrap();
        assert_eq!(memos.len(), 1);
        assert_eq!(memos[0].content, "local");
        let stored = store
            .with_tracker(|tracker: &DirtyTracker<'_, DailyEntry>| {
                tracker.find_stored(&"2024-05-01".to_string())
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, DirtyState::Edited);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_all_when_clean_refuses_pending_changes() {
        let store = Store::open_in_memory().await.unwrap();
        store.create_memo("unpushed", "2024-05-01").await.unwrap();
        let snapshot = LocalSnapshot::default();

        assert_eq!(store.replace_all_when_clean(&snapshot).await.unwrap(), None);
        assert_eq!(store.live_query::<Memo>().await.unwrap().len(), 1);

        let dirty = store.dirty_snapshot().await.unwrap();
        store.acknowledge(&dirty).await.unwrap();
        let counts = store.replace_all_when_clean(&snapshot).await.unwrap();
        assert_eq!(counts.map(|counts| counts.total()), Some(0));
        assert!(store.live_query::<Memo>().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_job_registration_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let descriptor = JobDescriptor {
            name: "auto_backup".to_string(),
            interval_ms: 10_800_000,
            registered_at: 1_700_000_000,
        };

        let (_, inserted) = store.register_job(&descriptor).await.unwrap();
        assert!(inserted);
        assert_eq!(store.load_job("auto_backup").await.unwrap(), Some(descriptor));
        assert!(store.remove_job("auto_backup").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_lease_excludes_second_process_on_same_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sumdays.db");
        let cli = Store::open(&path).await.unwrap();
        let watcher = Store::open(&path).await.unwrap();

        let held = cli.try_acquire_lease(SYNC_LEASE).await.unwrap().unwrap();
        assert_eq!(watcher.try_acquire_lease(SYNC_LEASE).await.unwrap(), None);
        assert_eq!(
            watcher.lease_holder(SYNC_LEASE).await.unwrap(),
            Some(held.holder.clone())
        );

        assert!(cli.release_lease(&held).await.unwrap());
        assert!(watcher.try_acquire_lease(SYNC_LEASE).await.unwrap().is_some());
    }
}
