//! SQLite-backed user repository (the storage engine).
//!
//! # Responsibility
//! - Bootstrap the `users` schema when constructed.
//! - Run each contract operation on its own short-lived connection.
//! - Map SQLite outcomes onto the repository error taxonomy.
//!
//! # Invariants
//! - The database path is the only state shared between calls.
//! - All values reach SQL through bound parameters.
//! - The duplicate check and the insert commit or roll back together.
//! - Listing skips undecodable rows; single-row reads fail on them.

use crate::context::Context;
use crate::db::schema::USERS_TABLE;
use crate::db::{open_connection, open_db, DbError, DbResult};
use crate::model::user::{User, UserId};
use crate::repo::{EntityId, Listing, RepoError, RepoResult, Repository, SkippedRow};
use log::{debug, info, warn};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::ffi::c_int;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// VM instructions between cancellation checks on a running statement.
const PROGRESS_CHECK_OPS: c_int = 1_000;

const USER_SELECT_SQL: &str = "SELECT id, surname, name, age FROM users";

/// Storage engine persisting `User` rows in a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    path: PathBuf,
}

impl SqliteUserRepository {
    /// Opens the database at `path`, creating the schema when absent.
    ///
    /// # Errors
    /// - Returns `DbError` when the file cannot be opened or the schema cannot
    ///   be bootstrapped. Callers should treat this as a startup failure.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_db(&path)?;
        drop(conn);
        info!(
            "event=user_repo_init module=repo status=ok table={}",
            USERS_TABLE
        );
        Ok(Self { path })
    }

    /// Location of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self, ctx: &Context) -> RepoResult<Connection> {
        if let Some(cause) = ctx.err() {
            return Err(cause.into());
        }
        let conn = open_connection(&self.path)?;
        let watched = ctx.clone();
        conn.progress_handler(PROGRESS_CHECK_OPS, Some(move || watched.is_done()));
        Ok(conn)
    }

    fn list_rows(&self, ctx: &Context) -> RepoResult<Listing<User>> {
        let conn = self.connect(ctx)?;
        let mut stmt = conn
            .prepare(&format!("{USER_SELECT_SQL};"))
            .map_err(|err| map_sqlite_error(err, ctx))?;
        let mut rows = stmt.query([]).map_err(|err| map_sqlite_error(err, ctx))?;

        let mut listing = Listing::new();
        let mut row_index = 0;
        while let Some(row) = rows.next().map_err(|err| map_sqlite_error(err, ctx))? {
            match parse_user_row(row) {
                Ok(user) => listing.items.push(user),
                Err(err) => {
                    let row_id = row.get::<_, EntityId>("id").ok();
                    warn!(
                        "event=list_row_skipped module=repo row_index={} row_id={} error={}",
                        row_index,
                        row_id.map_or_else(|| "unknown".to_string(), |id| id.to_string()),
                        err
                    );
                    listing.skipped.push(SkippedRow {
                        row_index,
                        row_id,
                        reason: err.to_string(),
                    });
                }
            }
            row_index += 1;
        }

        Ok(listing)
    }

    fn get_row(&self, ctx: &Context, id: UserId) -> RepoResult<User> {
        let conn = self.connect(ctx)?;
        let user = conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                params![id],
                parse_user_row,
            )
            .optional()
            .map_err(|err| map_sqlite_error(err, ctx))?;
        user.ok_or(RepoError::NotFound(id))
    }

    fn insert_row(&self, ctx: &Context, user: &User) -> RepoResult<UserId> {
        let mut conn = self.connect(ctx)?;
        // IMMEDIATE takes the write lock up front, so concurrent inserters of
        // the same tuple serialize on the duplicate check.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| map_sqlite_error(err, ctx))?;

        let existing_id = tx
            .query_row(
                "SELECT id FROM users
                 WHERE surname = ?1 AND name = ?2 AND age = ?3
                 LIMIT 1;",
                params![user.surname, user.name, user.age],
                |row| row.get::<_, UserId>(0),
            )
            .optional()
            .map_err(|err| map_sqlite_error(err, ctx))?;
        if let Some(existing_id) = existing_id {
            return Err(RepoError::AlreadyExists { existing_id });
        }

        if let Some(cause) = ctx.err() {
            return Err(cause.into());
        }

        tx.execute(
            "INSERT INTO users (surname, name, age) VALUES (?1, ?2, ?3);",
            params![user.surname, user.name, user.age],
        )
        .map_err(|err| map_sqlite_error(err, ctx))?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(|err| map_sqlite_error(err, ctx))?;

        Ok(id)
    }

    fn update_row(&self, ctx: &Context, id: UserId, user: &User) -> RepoResult<()> {
        let conn = self.connect(ctx)?;
        let changed = conn
            .execute(
                "UPDATE users
                 SET surname = ?1, name = ?2, age = ?3
                 WHERE id = ?4;",
                params![user.surname, user.name, user.age, id],
            )
            .map_err(|err| map_sqlite_error(err, ctx))?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn delete_row(&self, ctx: &Context, id: UserId) -> RepoResult<()> {
        let conn = self.connect(ctx)?;
        let changed = conn
            .execute("DELETE FROM users WHERE id = ?1;", params![id])
            .map_err(|err| map_sqlite_error(err, ctx))?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

impl Repository<User> for SqliteUserRepository {
    fn list(&self, ctx: &Context) -> RepoResult<Listing<User>> {
        let started_at = Instant::now();
        let result = self.list_rows(ctx);
        match &result {
            Ok(listing) => debug!(
                "event=user_list module=repo status=ok count={} skipped={} duration_ms={}",
                listing.items.len(),
                listing.skipped.len(),
                started_at.elapsed().as_millis()
            ),
            Err(_) => log_outcome("user_list", 0, started_at, &result),
        }
        result
    }

    fn get_by_id(&self, ctx: &Context, id: EntityId) -> RepoResult<User> {
        let started_at = Instant::now();
        let result = self.get_row(ctx, id);
        log_outcome("user_get", id, started_at, &result);
        result
    }

    fn insert(&self, ctx: &Context, entity: &User) -> RepoResult<EntityId> {
        let started_at = Instant::now();
        let result = self.insert_row(ctx, entity);
        let id = *result.as_ref().unwrap_or(&0);
        log_outcome("user_insert", id, started_at, &result);
        result
    }

    fn update(&self, ctx: &Context, id: EntityId, entity: &User) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.update_row(ctx, id, entity);
        log_outcome("user_update", id, started_at, &result);
        result
    }

    fn delete(&self, ctx: &Context, id: EntityId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.delete_row(ctx, id);
        log_outcome("user_delete", id, started_at, &result);
        result
    }
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        surname: row.get("surname")?,
        name: row.get("name")?,
        age: row.get("age")?,
    })
}

/// Maps a SQLite failure onto the repository taxonomy.
///
/// An interrupted statement is reported with the context's own cause.
fn map_sqlite_error(err: rusqlite::Error, ctx: &Context) -> RepoError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::OperationInterrupted =>
        {
            ctx.err().map_or(RepoError::Cancelled, Into::into)
        }
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepoError::ConstraintViolation(message.unwrap_or_else(|| failure.to_string()))
        }
        err @ (rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..)) => RepoError::Decode(err.to_string()),
        other => RepoError::Connectivity(DbError::Sqlite(other)),
    }
}

/// Repository-level trace of each call. Failures are reported to operators by
/// the service layer, so this stays at debug.
fn log_outcome<T>(event: &str, id: EntityId, started_at: Instant, result: &RepoResult<T>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => debug!(
            "event={} module=repo status=ok id={} duration_ms={}",
            event, id, duration_ms
        ),
        Err(err) => debug!(
            "event={} module=repo status=error duration_ms={} error_code={}",
            event,
            duration_ms,
            err.kind()
        ),
    }
}
