//! User use-case service.
//!
//! # Responsibility
//! - Provide the five CRUD entry points consumed by outer surfaces.
//! - Delegate persistence to a `Repository<User>` implementation.
//! - Attach the attempted operation name to every failure.
//!
//! # Invariants
//! - The repository error kind survives wrapping unchanged.
//! - The caller's `Context` is forwarded as-is.
//! - The service holds no state beyond its repository.

use crate::context::Context;
use crate::model::user::{User, UserId};
use crate::repo::{ErrorKind, Listing, RepoError, Repository};
use log::{log, warn, Level};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const OP_LIST: &str = "service.users.list";
pub const OP_GET_BY_ID: &str = "service.users.get_by_id";
pub const OP_INSERT: &str = "service.users.insert";
pub const OP_UPDATE: &str = "service.users.update";
pub const OP_DELETE: &str = "service.users.delete";

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Repository failure tagged with the service operation that hit it.
#[derive(Debug)]
pub struct ServiceError {
    op: &'static str,
    source: RepoError,
}

impl ServiceError {
    pub fn new(op: &'static str, source: RepoError) -> Self {
        Self { op, source }
    }

    /// Name of the operation that failed, e.g. `service.users.insert`.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Kind of the wrapped repository error.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn repo_error(&self) -> &RepoError {
        &self.source
    }

    pub fn into_repo_error(self) -> RepoError {
        self.source
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.op, self.source)
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Use-case service wrapper for user CRUD operations.
pub struct UserService<R: Repository<User>> {
    repo: R,
}

impl<R: Repository<User>> UserService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Lists every live user; undecodable rows are reported, not fatal.
    pub fn list(&self, ctx: &Context) -> ServiceResult<Listing<User>> {
        self.repo.list(ctx).map_err(|err| wrap(OP_LIST, err))
    }

    pub fn get_by_id(&self, ctx: &Context, id: UserId) -> ServiceResult<User> {
        self.repo
            .get_by_id(ctx, id)
            .map_err(|err| wrap(OP_GET_BY_ID, err))
    }

    /// Inserts a user and returns the store-assigned id.
    pub fn insert(&self, ctx: &Context, user: &User) -> ServiceResult<UserId> {
        self.repo
            .insert(ctx, user)
            .map_err(|err| wrap(OP_INSERT, err))
    }

    /// Replaces every field of user `id`; `user.id` is ignored.
    pub fn update(&self, ctx: &Context, id: UserId, user: &User) -> ServiceResult<()> {
        self.repo
            .update(ctx, id, user)
            .map_err(|err| wrap(OP_UPDATE, err))
    }

    pub fn delete(&self, ctx: &Context, id: UserId) -> ServiceResult<()> {
        self.repo
            .delete(ctx, id)
            .map_err(|err| wrap(OP_DELETE, err))
    }
}

/// Logs the failure once, here, and tags it with `op`.
fn wrap(op: &'static str, err: RepoError) -> ServiceError {
    let kind = err.kind();
    match failure_level(kind) {
        Level::Warn => warn!(
            "event=service_call module=service op={} status=error error_code={}",
            op, kind
        ),
        level => log!(
            level,
            "event=service_call module=service op={} status=error error_code={} error={}",
            op,
            kind,
            err
        ),
    }
    ServiceError::new(op, err)
}

/// Expected outcomes (sentinels) are warnings; everything else is an error.
fn failure_level(kind: ErrorKind) -> Level {
    if kind.is_sentinel() {
        Level::Warn
    } else {
        Level::Error
    }
}
