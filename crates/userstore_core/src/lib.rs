//! Core persistence logic for the user store.
//! This crate owns the `users` schema and every rule about how rows map to
//! `User` values.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{load_config, resolve_config_path, Config, ConfigError, Env};
pub use context::{CancelCause, Context};
pub use logging::init_logging;
pub use model::user::{User, UserId, UserValidationError};
pub use repo::memory_repo::InMemoryUserRepository;
pub use repo::user_repo::SqliteUserRepository;
pub use repo::{
    EntityId, ErrorKind, Listing, RepoError, RepoResult, Repository, SkippedRow,
};
pub use service::user_service::{ServiceError, ServiceResult, UserService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
