//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Statements of each version, oldest first
const MIGRATIONS: &[&[&str]] = &[MIGRATION_V1, MIGRATION_V2, MIGRATION_V3];

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    for (target, statements) in (1..=CURRENT_VERSION).zip(MIGRATIONS.iter().copied()) {
        if version < target {
            apply(conn, target, statements)?;
        }
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

/// Version 1: the four synced tables
const MIGRATION_V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS memos (
        id INTEGER PRIMARY KEY,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        date TEXT NOT NULL,
        memo_order INTEGER NOT NULL,
        memo_type TEXT NOT NULL DEFAULT 'text',
        sync_state TEXT NOT NULL DEFAULT 'edited'
            CHECK (sync_state IN ('clean', 'edited', 'tombstoned')),
        revision INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_memos_date ON memos(date, memo_order)",
    "CREATE INDEX IF NOT EXISTS idx_memos_sync_state ON memos(sync_state)",
    "CREATE TABLE IF NOT EXISTS daily_entries (
        date TEXT PRIMARY KEY,
        diary TEXT,
        keywords TEXT,
        ai_comment TEXT,
        emotion_score REAL,
        emotion_icon TEXT,
        theme_icon TEXT,
        photo_urls TEXT NOT NULL DEFAULT '[]',
        sync_state TEXT NOT NULL DEFAULT 'edited'
            CHECK (sync_state IN ('clean', 'edited', 'tombstoned')),
        revision INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_daily_entries_sync_state ON daily_entries(sync_state)",
    "CREATE TABLE IF NOT EXISTS user_styles (
        style_id INTEGER PRIMARY KEY,
        style_name TEXT NOT NULL,
        style_vector TEXT NOT NULL DEFAULT '[]',
        style_examples TEXT NOT NULL DEFAULT '[]',
        style_prompt TEXT NOT NULL DEFAULT '{}',
        sample_diary TEXT NOT NULL DEFAULT '',
        sync_state TEXT NOT NULL DEFAULT 'edited'
            CHECK (sync_state IN ('clean', 'edited', 'tombstoned')),
        revision INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_user_styles_sync_state ON user_styles(sync_state)",
    "CREATE TABLE IF NOT EXISTS week_summaries (
        start_date TEXT PRIMARY KEY,
        end_date TEXT NOT NULL,
        diary_count INTEGER NOT NULL DEFAULT 0,
        emotion_analysis TEXT NOT NULL DEFAULT 'null',
        highlights TEXT NOT NULL DEFAULT 'null',
        insights TEXT NOT NULL DEFAULT 'null',
        summary TEXT NOT NULL DEFAULT 'null',
        sync_state TEXT NOT NULL DEFAULT 'edited'
            CHECK (sync_state IN ('clean', 'edited', 'tombstoned')),
        revision INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_week_summaries_sync_state ON week_summaries(sync_state)",
];

/// Version 2: persisted periodic job registrations
const MIGRATION_V2: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS scheduled_jobs (
        name TEXT PRIMARY KEY,
        interval_ms INTEGER NOT NULL CHECK (interval_ms > 0),
        registered_at INTEGER NOT NULL
    )",
];

/// Version 3: run leases keeping push and pull single-flight across processes
const MIGRATION_V3: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS run_leases (
        name TEXT PRIMARY KEY,
        holder TEXT NOT NULL,
        acquired_at INTEGER NOT NULL
    )",
];

fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, []) {
            conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version]) {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute_batch("COMMIT") {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
        for table in ["memos", "daily_entries", "user_styles", "week_summaries"] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn test_every_version_has_statements() {
        assert_eq!(MIGRATIONS.len(), usize::try_from(CURRENT_VERSION).unwrap());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v2_creates_scheduled_jobs_table() {
        let conn = setup();
        run(&conn).unwrap();
        assert!(table_exists(&conn, "scheduled_jobs"));
    }

    #[test]
    fn test_upgrade_from_v2_adds_run_leases() {
        let conn = setup();
        apply(&conn, 1, MIGRATION_V1).unwrap();
        apply(&conn, 2, MIGRATION_V2).unwrap();
        assert!(!table_exists(&conn, "run_leases"));

        run(&conn).unwrap();

        assert!(table_exists(&conn, "run_leases"));
        assert_eq!(get_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_sync_state_check_rejects_unknown_values() {
        let conn = setup();
        run(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO memos (id, content, timestamp, date, memo_order, sync_state)
             VALUES (1, 'x', '09:00', '2024-05-01', 0, 'deleted')",
            [],
        );
        assert!(result.is_err());
    }
}
