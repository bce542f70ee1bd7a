//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start size-rotated file logging once per process.
//! - Route panics through the logger before the default hook runs.
//!
//! # Invariants
//! - A second `init_logging` with the same level and directory is a no-op.
//! - A second `init_logging` with a different level or directory fails.
//! - Log lines carry ids, counts and error codes, never user names.

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "userstore";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    level: LevelFilter,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn check_matches(&self, level: LevelFilter, log_dir: &Path) -> Result<(), String> {
        if self.log_dir != log_dir {
            return Err(format!(
                "logging already writes to `{}`; cannot switch to `{}`",
                self.log_dir.display(),
                log_dir.display()
            ));
        }
        if self.level != level {
            return Err(format!(
                "logging already runs at `{}`; cannot switch to `{}`",
                self.level, level
            ));
        }
        Ok(())
    }
}

/// Starts rolling file logs under `log_dir` at `level`.
///
/// Warnings and errors are also mirrored to stderr.
///
/// # Errors
/// - `level` is not one of off|error|warn|warning|info|debug|trace.
/// - `log_dir` is not an absolute path or cannot be created.
/// - Logging was already started with another level or directory.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let level = parse_level(level)?;
    let log_dir = parse_log_dir(log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start_logger(level, &log_dir))?;
    active.check_matches(level, &log_dir)
}

fn start_logger(level: LevelFilter, log_dir: &Path) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(log_dir)
        .map_err(|err| format!("cannot create log directory `{}`: {err}", log_dir.display()))?;

    let spec = level.as_str().to_ascii_lowercase();
    let handle = Logger::try_with_str(&spec)
        .map_err(|err| format!("invalid log level `{spec}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .duplicate_to_stderr(Duplicate::Warn)
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("cannot start logger: {err}"))?;

    install_panic_logging();
    info!(
        "event=logging_init module=logging status=ok version={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        spec,
        log_dir.display()
    );

    Ok(ActiveLogger {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    let trimmed = level.trim();
    let canonical = if trimmed.eq_ignore_ascii_case("warning") {
        "warn"
    } else {
        trimmed
    };
    LevelFilter::from_str(canonical).map_err(|_| format!("unsupported log level `{trimmed}`"))
}

fn parse_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(log_dir.trim());
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{log_dir}`"));
    }
    Ok(path)
}

/// Only called from `start_logger`, which runs once per process.
fn install_panic_logging() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let location = panic
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        let payload: &str = if let Some(message) = panic.payload().downcast_ref::<&str>() {
            message
        } else if let Some(message) = panic.payload().downcast_ref::<String>() {
            message
        } else {
            "non-string panic payload"
        };
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            one_line(payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        default_hook(panic);
    }));
}

/// Flattens `text` onto one line and caps it at `max_chars`.
fn one_line(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c });
    let mut flat: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        flat.push_str("...");
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::{init_logging, one_line, parse_level, parse_log_dir};
    use log::LevelFilter;

    #[test]
    fn levels_parse_case_insensitively_with_warning_alias() {
        assert_eq!(parse_level("INFO").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level(" warning ").unwrap(), LevelFilter::Warn);
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn log_dir_must_be_absolute() {
        assert!(parse_log_dir("logs/dev").unwrap_err().contains("absolute"));
        assert!(parse_log_dir("  ").is_err());
    }

    #[test]
    fn one_line_flattens_and_caps_text() {
        assert_eq!(one_line("a\nb\rc", 10), "a b c");
        assert_eq!(one_line("abcdefgh", 4), "abcd...");
        assert_eq!(one_line("abcd", 4), "abcd");
    }

    #[test]
    fn repeated_init_accepts_same_settings_and_rejects_changes() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let first_dir = first.path().join("logs");
        let first_dir = first_dir.to_str().unwrap();

        init_logging("info", first_dir).unwrap();
        init_logging(" INFO ", first_dir).unwrap();

        let level_err = init_logging("debug", first_dir).unwrap_err();
        assert!(level_err.contains("cannot switch"));

        let dir_err = init_logging("info", second.path().to_str().unwrap()).unwrap_err();
        assert!(dir_err.contains("cannot switch"));

        assert!(std::path::Path::new(first_dir).is_dir());
    }
}
