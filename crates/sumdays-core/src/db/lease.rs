//! Named run leases shared by every process using the same database file

use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Lease held for the duration of one push or pull run
pub const SYNC_LEASE: &str = "sync";

/// Seconds after which a lease left behind by a crashed process may be taken
pub const LEASE_TTL_SECS: i64 = 600;

static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

/// Proof of holding a named lease; give it back with `Store::release_lease`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLease {
    pub name: String,
    pub holder: String,
}

impl RunLease {
    fn fresh(name: &str) -> Self {
        let serial = NEXT_HOLDER.fetch_add(1, Ordering::Relaxed);
        Self {
            name: name.to_string(),
            holder: format!("{}:{serial}", std::process::id()),
        }
    }
}

/// Take the lease unless a holder acquired it less than `ttl_secs` ago.
/// Callers run this inside an immediate transaction.
pub(crate) fn try_acquire(
    conn: &Connection,
    name: &str,
    now: i64,
    ttl_secs: i64,
) -> Result<Option<RunLease>> {
    let lease = RunLease::fresh(name);
    let taken = conn.execute(
        "INSERT INTO run_leases (name, holder, acquired_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE
            SET holder = excluded.holder, acquired_at = excluded.acquired_at
            WHERE run_leases.acquired_at <= ?4",
        params![name, lease.holder, now, now - ttl_secs],
    )? == 1;

    Ok(taken.then_some(lease))
}

/// Release the lease if `lease` still holds it
pub(crate) fn release(conn: &Connection, lease: &RunLease) -> Result<bool> {
    Ok(conn.execute(
        "DELETE FROM run_leases WHERE name = ?1 AND holder = ?2",
        params![lease.name, lease.holder],
    )? == 1)
}

pub(crate) fn holder(conn: &Connection, name: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT holder FROM run_leases WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?)
}
