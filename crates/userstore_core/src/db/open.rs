//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open the store once at construction time and bootstrap its schema.
//! - Open short-lived per-operation connections afterwards.
//!
//! # Invariants
//! - Per-operation connections never create a missing database file.
//! - Every connection waits on busy locks instead of failing immediately.

use super::schema::bootstrap_schema;
use super::DbResult;
use log::{debug, error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) a SQLite database file and bootstraps the schema.
///
/// # Side effects
/// - Creates the database file and the `users` table when absent.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    match Connection::open(path) {
        Ok(conn) => finish_open(conn, "file", started_at),
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

/// Opens an in-memory SQLite database and bootstraps the schema.
///
/// The database lives only as long as the returned connection.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    match Connection::open_in_memory() {
        Ok(conn) => finish_open(conn, "memory", started_at),
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

/// Opens a connection to an existing, already bootstrapped database file.
///
/// Used once per repository operation; the caller drops it before returning.
pub fn open_connection(path: &Path) -> DbResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    debug!("event=db_connect module=db status=ok");
    Ok(conn)
}

fn finish_open(mut conn: Connection, mode: &str, started_at: Instant) -> DbResult<Connection> {
    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    bootstrap_schema(conn)?;
    Ok(())
}
