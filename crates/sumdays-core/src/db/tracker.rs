//! Dirty-state tracking for one record kind

use std::marker::PhantomData;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;

use super::record::SyncRecord;
use crate::error::{Error, Result};
use crate::models::Stored;

/// A dirty record observed at a given revision.
///
/// Flag clearing after an acknowledged push only applies to rows still at the
/// observed revision, so a change made during the round trip stays dirty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncMark<K> {
    pub key: K,
    pub revision: i64,
}

impl<R: SyncRecord> Stored<R> {
    pub fn mark(&self) -> SyncMark<R::Key> {
        SyncMark {
            key: self.record.key(),
            revision: self.revision,
        }
    }
}

/// Per-kind access contract enforcing dirty-state transitions.
///
/// Every mutation goes through this type; ordinary reads (`get`,
/// `live_query*`) never see tombstones.
pub struct DirtyTracker<'a, R: SyncRecord> {
    conn: &'a Connection,
    _record: PhantomData<R>,
}

impl<'a, R: SyncRecord> DirtyTracker<'a, R> {
    /// Create a tracker over the given connection or transaction
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            _record: PhantomData,
        }
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT {key}, {columns}, sync_state, revision FROM {table} WHERE {filter} ORDER BY {order}",
            key = R::KEY_COLUMN,
            columns = R::COLUMNS.join(", "),
            table = R::TABLE,
            order = R::ORDER_BY,
        )
    }

    fn parse_stored(row: &rusqlite::Row<'_>) -> rusqlite::Result<Stored<R>> {
        let width = R::COLUMNS.len();
        Ok(Stored {
            record: R::from_row(row)?,
            state: row.get(width + 1)?,
            revision: row.get(width + 2)?,
        })
    }

    fn query_stored(&self, filter: &str, params: Vec<Value>) -> Result<Vec<Stored<R>>> {
        let mut stmt = self.conn.prepare(&Self::select_sql(filter))?;
        let rows = stmt
            .query_map(params_from_iter(params), Self::parse_stored)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Upsert by key and mark the record `Edited`. Returns the new revision.
    ///
    /// A tombstoned key written again comes back as a live `Edited` record.
    pub fn insert(&self, record: &R) -> Result<i64> {
        let placeholders = vec!["?"; R::COLUMNS.len() + 1].join(", ");
        let assignments = R::COLUMNS
            .iter()
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {table} ({key}, {columns}, sync_state, revision)
             VALUES ({placeholders}, 'edited', 1)
             ON CONFLICT({key}) DO UPDATE SET {assignments},
                 sync_state = 'edited',
                 revision = {table}.revision + 1
             RETURNING revision",
            table = R::TABLE,
            key = R::KEY_COLUMN,
            columns = R::COLUMNS.join(", "),
        );

        let mut values: Vec<Value> = Vec::with_capacity(R::COLUMNS.len() + 1);
        values.push(record.key().into());
        values.extend(record.to_values()?);

        let revision = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        tracing::debug!(kind = %R::KIND, key = %record.key(), revision, "Record marked edited");
        Ok(revision)
    }

    /// Same contract as [`Self::insert`]; re-updating a dirty record is harmless.
    pub fn update(&self, record: &R) -> Result<i64> {
        self.insert(record)
    }

    /// Tombstone a live record. Absent or already tombstoned keys are `NotFound`.
    pub fn soft_delete(&self, key: &R::Key) -> Result<()> {
        let sql = format!(
            "UPDATE {table} SET sync_state = 'tombstoned', revision = revision + 1
             WHERE {key} = ?1 AND sync_state != 'tombstoned'",
            table = R::TABLE,
            key = R::KEY_COLUMN,
        );
        let key_value: Value = key.clone().into();
        let rows = self.conn.execute(&sql, [key_value])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("{} {key}", R::KIND)));
        }
        tracing::debug!(kind = %R::KIND, %key, "Record tombstoned");
        Ok(())
    }

    /// Get a live record by key
    pub fn get(&self, key: &R::Key) -> Result<Option<R>> {
        Ok(self
            .find_stored(key)?
            .filter(|stored| !stored.state.is_deleted())
            .map(|stored| stored.record))
    }

    /// Get a record by key in any state, tombstones included
    pub fn find_stored(&self, key: &R::Key) -> Result<Option<Stored<R>>> {
        let sql = Self::select_sql(&format!("{} = ?1", R::KEY_COLUMN));
        let key_value: Value = key.clone().into();
        let stored = self
            .conn
            .query_row(&sql, [key_value], Self::parse_stored)
            .optional()?;
        Ok(stored)
    }

    /// All live records
    pub fn live_query(&self) -> Result<Vec<R>> {
        Ok(self
            .query_stored("sync_state != 'tombstoned'", Vec::new())?
            .into_iter()
            .map(|stored| stored.record)
            .collect())
    }

    /// Live records whose `column` equals `value`
    pub fn live_query_by(&self, column: &str, value: impl Into<Value>) -> Result<Vec<R>> {
        if column != R::KEY_COLUMN && !R::COLUMNS.contains(&column) {
            return Err(Error::InvalidInput(format!(
                "unknown {} column '{column}'",
                R::KIND
            )));
        }
        Ok(self
            .query_stored(
                &format!("{column} = ?1 AND sync_state != 'tombstoned'"),
                vec![value.into()],
            )?
            .into_iter()
            .map(|stored| stored.record)
            .collect())
    }

    /// Records pending a deletion push
    pub fn dirty_tombstones(&self) -> Result<Vec<Stored<R>>> {
        self.query_stored("sync_state = 'tombstoned'", Vec::new())
    }

    /// Live records pending an edit push
    pub fn dirty_edits(&self) -> Result<Vec<Stored<R>>> {
        self.query_stored("sync_state = 'edited'", Vec::new())
    }

    /// Number of records that are not `Clean`
    pub fn count_dirty(&self) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE sync_state != 'clean'",
            R::TABLE
        );
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Number of records of this kind in any state
    pub fn count_all(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", R::TABLE);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Physically remove tombstones whose deletion the server acknowledged
    pub fn purge(&self, marks: &[SyncMark<R::Key>]) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {table} WHERE {key} = ?1 AND revision = ?2 AND sync_state = 'tombstoned'",
            table = R::TABLE,
            key = R::KEY_COLUMN,
        );
        self.apply_marks(&sql, marks)
    }

    /// Mark acknowledged edits `Clean`
    pub fn mark_clean(&self, marks: &[SyncMark<R::Key>]) -> Result<usize> {
        let sql = format!(
            "UPDATE {table} SET sync_state = 'clean'
             WHERE {key} = ?1 AND revision = ?2 AND sync_state = 'edited'",
            table = R::TABLE,
            key = R::KEY_COLUMN,
        );
        self.apply_marks(&sql, marks)
    }

    fn apply_marks(&self, sql: &str, marks: &[SyncMark<R::Key>]) -> Result<usize> {
        if marks.is_empty() {
            return Ok(0);
        }
        with_savepoint(self.conn, "apply_marks", || {
            let mut stmt = self.conn.prepare(sql)?;
            let mut applied = 0;
            for mark in marks {
                let key: Value = mark.key.clone().into();
                applied += stmt.execute(params_from_iter([key, Value::Integer(mark.revision)]))?;
            }
            Ok(applied)
        })
    }

    /// Delete every row of this kind and insert `records` as `Clean`
    pub fn replace_all(&self, records: &[R]) -> Result<usize> {
        let insert_sql = format!(
            "INSERT INTO {table} ({key}, {columns}, sync_state, revision)
             VALUES ({placeholders}, 'clean', 0)",
            table = R::TABLE,
            key = R::KEY_COLUMN,
            columns = R::COLUMNS.join(", "),
            placeholders = vec!["?"; R::COLUMNS.len() + 1].join(", "),
        );

        with_savepoint(self.conn, "replace_all", || {
            self.conn.execute(&format!("DELETE FROM {}", R::TABLE), [])?;
            let mut stmt = self.conn.prepare(&insert_sql)?;
            for record in records {
                let mut values: Vec<Value> = Vec::with_capacity(R::COLUMNS.len() + 1);
                values.push(record.key().into());
                values.extend(record.to_values()?);
                stmt.execute(params_from_iter(values))?;
            }
            Ok(records.len())
        })
    }
}

/// Run `f` inside a SQLite savepoint, rolling back to it on error.
///
/// Nests inside an enclosing transaction; at top level it acts as one.
fn with_savepoint<T>(conn: &Connection, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(error) => {
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
                .ok();
            Err(error)
        }
    }
}
