//! Repository contract and its storage backends.
//!
//! # Responsibility
//! - Define the five-operation contract every entity backend implements.
//! - Define the error taxonomy callers branch on (`ErrorKind`).
//! - Isolate SQL details from the service layer.
//!
//! # Invariants
//! - Backends return sentinel errors (`NotFound`, `AlreadyExists`, ...)
//!   instead of folding them into transport failures.
//! - Every operation honours the caller's `Context` before touching storage.

use crate::context::{CancelCause, Context};
use crate::db::DbError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory_repo;
pub mod user_repo;

/// Identifier type shared by all repository-managed entities.
pub type EntityId = i64;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// No live row has the requested id.
    NotFound(EntityId),
    /// A live row already holds the unique field tuple being inserted.
    AlreadyExists { existing_id: EntityId },
    /// The store could not be reached or a statement could not run.
    Connectivity(DbError),
    /// The store rejected a write through a schema constraint.
    ConstraintViolation(String),
    /// A stored row could not be mapped onto the entity.
    Decode(String),
    Cancelled,
    DeadlineExceeded,
}

/// Copyable error category, stable across wrapping layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Connectivity,
    ConstraintViolation,
    Decode,
    Cancelled,
    DeadlineExceeded,
}

impl ErrorKind {
    /// Stable snake_case code used in log events and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Connectivity => "connectivity",
            Self::ConstraintViolation => "constraint_violation",
            Self::Decode => "decode",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }

    /// Whether the failure describes caller input rather than a broken store.
    pub fn is_sentinel(self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::AlreadyExists | Self::ConstraintViolation
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "record not found: id={id}"),
            Self::AlreadyExists { existing_id } => {
                write!(f, "record already exists: existing_id={existing_id}")
            }
            Self::Connectivity(err) => write!(f, "storage failure: {err}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Decode(message) => write!(f, "invalid persisted data: {message}"),
            Self::Cancelled => write!(f, "{}", CancelCause::Cancelled),
            Self::DeadlineExceeded => write!(f, "{}", CancelCause::DeadlineExceeded),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connectivity(err) => Some(err),
            Self::NotFound(_)
            | Self::AlreadyExists { .. }
            | Self::ConstraintViolation(_)
            | Self::Decode(_)
            | Self::Cancelled
            | Self::DeadlineExceeded => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Connectivity(value)
    }
}

impl From<CancelCause> for RepoError {
    fn from(value: CancelCause) -> Self {
        match value {
            CancelCause::Cancelled => Self::Cancelled,
            CancelCause::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Row skipped while listing because it could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// Zero-based position of the row in the scan.
    pub row_index: usize,
    /// Row id, when the id column itself was readable.
    pub row_id: Option<EntityId>,
    pub reason: String,
}

/// Result of a full-table scan.
///
/// Undecodable rows do not abort the scan; they are reported in `skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub skipped: Vec<SkippedRow>,
}

impl<T> Listing<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage contract for one entity type.
///
/// Implementations hold no per-call state; every operation is an
/// independent unit of work that may run concurrently with others.
pub trait Repository<T> {
    /// Returns every live entity, in unspecified order.
    fn list(&self, ctx: &Context) -> RepoResult<Listing<T>>;

    /// Fails with `NotFound` when no live row has `id`.
    fn get_by_id(&self, ctx: &Context, id: EntityId) -> RepoResult<T>;

    /// Persists `entity` and returns the store-assigned id.
    ///
    /// Any id carried by `entity` is ignored.
    fn insert(&self, ctx: &Context, entity: &T) -> RepoResult<EntityId>;

    /// Replaces every field of the row with `id` except the id itself.
    fn update(&self, ctx: &Context, id: EntityId, entity: &T) -> RepoResult<()>;

    /// Removes the row with `id`; a second delete fails with `NotFound`.
    fn delete(&self, ctx: &Context, id: EntityId) -> RepoResult<()>;
}

impl<T, R: Repository<T> + ?Sized> Repository<T> for std::sync::Arc<R> {
    fn list(&self, ctx: &Context) -> RepoResult<Listing<T>> {
        (**self).list(ctx)
    }

    fn get_by_id(&self, ctx: &Context, id: EntityId) -> RepoResult<T> {
        (**self).get_by_id(ctx, id)
    }

    fn insert(&self, ctx: &Context, entity: &T) -> RepoResult<EntityId> {
        (**self).insert(ctx, entity)
    }

    fn update(&self, ctx: &Context, id: EntityId, entity: &T) -> RepoResult<()> {
        (**self).update(ctx, id, entity)
    }

    fn delete(&self, ctx: &Context, id: EntityId) -> RepoResult<()> {
        (**self).delete(ctx, id)
    }
}
