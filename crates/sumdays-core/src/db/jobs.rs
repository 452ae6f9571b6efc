//! Persisted periodic job registrations

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::Result;

/// A periodic job registered with the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    pub name: String,
    pub interval_ms: u64,
    /// Unix seconds
    pub registered_at: i64,
}

pub(crate) fn load(conn: &Connection, name: &str) -> Result<Option<JobDescriptor>> {
    let descriptor = conn
        .query_row(
            "SELECT name, interval_ms, registered_at FROM scheduled_jobs WHERE name = ?1",
            [name],
            |row| {
                let interval: i64 = row.get(1)?;
                Ok(JobDescriptor {
                    name: row.get(0)?,
                    interval_ms: u64::try_from(interval).unwrap_or_default(),
                    registered_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(descriptor)
}

/// Insert the descriptor unless one with the same name exists.
/// Returns the descriptor now stored and whether it was newly inserted.
pub(crate) fn save_if_absent(
    conn: &Connection,
    descriptor: &JobDescriptor,
) -> Result<(JobDescriptor, bool)> {
    let interval = i64::try_from(descriptor.interval_ms).unwrap_or(i64::MAX);
    let inserted = conn.execute(
        "INSERT INTO scheduled_jobs (name, interval_ms, registered_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO NOTHING",
        params![descriptor.name, interval, descriptor.registered_at],
    )? == 1;

    let stored = load(conn, &descriptor.name)?.unwrap_or_else(|| descriptor.clone());
    Ok((stored, inserted))
}

pub(crate) fn remove(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM scheduled_jobs WHERE name = ?1", [name])? == 1)
}
