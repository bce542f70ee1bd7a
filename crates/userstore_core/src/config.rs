//! Application configuration loaded from YAML.
//!
//! # Responsibility
//! - Resolve the config file location from a flag or `CONFIG_PATH`.
//! - Parse and sanity-check settings consumed at process start.
//!
//! # Invariants
//! - `storage_path` is never empty in a loaded `Config`.
//! - Loading never panics; every failure is a `ConfigError`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 4_000;

/// Deployment environment; selects default log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    #[default]
    Local,
    Dev,
    Prod,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub env: Env,
    /// SQLite database file.
    pub storage_path: PathBuf,
    /// Absolute directory for rolling log files; logging is off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingPath,
    NotFound(PathBuf),
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_yaml::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPath => write!(
                f,
                "config path is empty; pass --config or set {CONFIG_PATH_ENV}"
            ),
            Self::NotFound(path) => write!(f, "config file does not exist: {}", path.display()),
            Self::Io { path, source } => {
                write!(f, "cannot read config file {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "cannot parse config file {}: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::MissingPath | Self::NotFound(_) | Self::Invalid(_) => None,
        }
    }
}

impl Config {
    /// Parses YAML text; field checks run in `load_config`.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Log level to use: explicit `log_level`, otherwise derived from `env`.
    pub fn effective_log_level(&self) -> &str {
        match (&self.log_level, self.env) {
            (Some(level), _) => level.as_str(),
            (None, Env::Local | Env::Dev) => "debug",
            (None, Env::Prod) => "info",
        }
    }

    /// Deadline applied to each store operation.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage_path is required".to_string()));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "operation_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Picks the config path: explicit flag first, then `CONFIG_PATH`.
pub fn resolve_config_path(flag: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    let from_env = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    pick_config_path(flag, from_env)
}

fn pick_config_path(
    flag: Option<PathBuf>,
    from_env: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    flag.into_iter()
        .chain(from_env)
        .find(|path| !path.as_os_str().is_empty())
        .ok_or(ConfigError::MissingPath)
}

/// Reads and validates the YAML config at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = Config::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}
