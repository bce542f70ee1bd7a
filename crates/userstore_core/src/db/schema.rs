//! Idempotent schema bootstrap for the user store.
//!
//! # Responsibility
//! - Create the `users` table and its id index when absent.
//! - Refuse databases stamped by a newer schema than this binary knows.
//!
//! # Invariants
//! - Bootstrap is safe to run on every open; existing rows are untouched.
//! - The applied version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// Table holding every live user row.
pub const USERS_TABLE: &str = "users";

/// Index over `users(id)` created alongside the table.
pub const USER_ID_INDEX: &str = "user_id_idx";

/// Schema version written by this binary.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Creates the table and index if they do not exist yet.
pub fn bootstrap_schema(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    if current_version > SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: SCHEMA_VERSION,
        });
    }

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    if current_version < SCHEMA_VERSION {
        tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
