//! In-process user repository.
//!
//! Keeps users in a `BTreeMap` behind a mutex. Useful for service tests and
//! throwaway runs; nothing survives the process.

use crate::context::Context;
use crate::model::user::{User, UserId};
use crate::repo::{EntityId, Listing, RepoError, RepoResult, Repository};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    next_id: UserId,
}

/// Repository keeping users in memory with the same error semantics as the
/// SQLite engine.
#[derive(Debug)]
pub struct InMemoryUserRepository {
    state: Mutex<MemoryState>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                users: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave a half-written entry,
        // so the state stays usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository<User> for InMemoryUserRepository {
    fn list(&self, ctx: &Context) -> RepoResult<Listing<User>> {
        ensure_live(ctx)?;
        let state = self.lock();
        let mut listing = Listing::new();
        listing.items = state.users.values().cloned().collect();
        Ok(listing)
    }

    fn get_by_id(&self, ctx: &Context, id: EntityId) -> RepoResult<User> {
        ensure_live(ctx)?;
        self.lock()
            .users
            .get(&id)
            .cloned()
            .ok_or(RepoError::NotFound(id))
    }

    fn insert(&self, ctx: &Context, entity: &User) -> RepoResult<EntityId> {
        ensure_live(ctx)?;
        check_age(entity)?;
        let mut state = self.lock();

        let duplicate = state.users.values().find(|existing| {
            existing.surname == entity.surname
                && existing.name == entity.name
                && existing.age == entity.age
        });
        if let Some(existing) = duplicate {
            return Err(RepoError::AlreadyExists {
                existing_id: existing.id,
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        let mut stored = entity.clone();
        stored.id = id;
        state.users.insert(id, stored);
        Ok(id)
    }

    fn update(&self, ctx: &Context, id: EntityId, entity: &User) -> RepoResult<()> {
        ensure_live(ctx)?;
        check_age(entity)?;
        let mut state = self.lock();
        let stored = state.users.get_mut(&id).ok_or(RepoError::NotFound(id))?;
        *stored = User {
            id,
            ..entity.clone()
        };
        Ok(())
    }

    fn delete(&self, ctx: &Context, id: EntityId) -> RepoResult<()> {
        ensure_live(ctx)?;
        self.lock()
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound(id))
    }
}

fn ensure_live(ctx: &Context) -> RepoResult<()> {
    match ctx.err() {
        Some(cause) => Err(cause.into()),
        None => Ok(()),
    }
}

fn check_age(user: &User) -> RepoResult<()> {
    if user.age <= 0 {
        return Err(RepoError::ConstraintViolation(format!(
            "CHECK constraint failed: age_lt_0 (age={})",
            user.age
        )));
    }
    Ok(())
}
