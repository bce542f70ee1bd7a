//! Domain model for persisted user records.
//!
//! # Responsibility
//! - Define the canonical entity shape shared by storage, service and CLI.
//!
//! # Invariants
//! - Every persisted user is identified by a store-assigned `UserId`.
//! - Deletion is a hard delete; ids are never handed out again.

pub mod user;
