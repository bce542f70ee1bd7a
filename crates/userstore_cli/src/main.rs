//! `userstore` command-line entry point.
//!
//! # Responsibility
//! - Load config, start logging and open the storage engine.
//! - Run one user-service operation per invocation and print JSON.
//!
//! # Invariants
//! - Storage open failures abort before any command runs.
//! - Exit codes distinguish not-found, duplicates, invalid input and
//!   cancellation from other failures.

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use userstore_core::{
    init_logging, load_config, resolve_config_path, Context, ErrorKind, Repository,
    ServiceError, SqliteUserRepository, User, UserId, UserService, UserValidationError,
};

#[derive(Parser)]
#[command(name = "userstore", about = "Manage users persisted in SQLite", version)]
struct Cli {
    /// YAML config file; falls back to the CONFIG_PATH environment variable.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every stored user.
    List,
    /// Show one user.
    Get { id: UserId },
    /// Create a user and print its assigned id.
    Insert(UserArgs),
    /// Replace every field of an existing user.
    Update {
        id: UserId,
        #[command(flatten)]
        user: UserArgs,
    },
    /// Remove a user.
    Delete { id: UserId },
}

#[derive(Args)]
struct UserArgs {
    #[arg(long)]
    surname: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    age: i64,
}

impl UserArgs {
    fn into_user(self) -> Result<User, UserValidationError> {
        let user = User::new(self.surname, self.name, self.age);
        user.validate()?;
        Ok(user)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config)?;
    let config = load_config(&config_path)?;

    if let Some(log_dir) = &config.log_dir {
        init_logging(config.effective_log_level(), &log_dir.to_string_lossy())
            .map_err(anyhow::Error::msg)
            .context("failed to initialize logging")?;
    }

    if let Some(parent) = config.storage_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create storage directory {}", parent.display())
            })?;
        }
    }
    let repo = SqliteUserRepository::open(&config.storage_path).with_context(|| {
        format!(
            "failed to open storage at {}",
            config.storage_path.display()
        )
    })?;
    let service = UserService::new(repo);
    let ctx = Context::with_timeout(config.operation_timeout());

    let output = dispatch(&service, &ctx, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn dispatch<R: Repository<User>>(
    service: &UserService<R>,
    ctx: &Context,
    command: Command,
) -> Result<Value> {
    let output = match command {
        Command::List => {
            info!("event=cli_command module=cli command=list status=start");
            let listing = service.list(ctx)?;
            json!({ "users": listing.items, "skipped": listing.skipped })
        }
        Command::Get { id } => {
            info!("event=cli_command module=cli command=get status=start id={id}");
            serde_json::to_value(service.get_by_id(ctx, id)?)?
        }
        Command::Insert(args) => {
            info!("event=cli_command module=cli command=insert status=start");
            let id = service.insert(ctx, &args.into_user()?)?;
            json!({ "id": id })
        }
        Command::Update { id, user } => {
            info!("event=cli_command module=cli command=update status=start id={id}");
            service.update(ctx, id, &user.into_user()?)?;
            json!({ "id": id })
        }
        Command::Delete { id } => {
            info!("event=cli_command module=cli command=delete status=start id={id}");
            service.delete(ctx, id)?;
            json!({ "id": id })
        }
    };
    Ok(output)
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<UserValidationError>().is_some() {
        return 4;
    }
    match err.downcast_ref::<ServiceError>().map(ServiceError::kind) {
        Some(ErrorKind::NotFound) => 2,
        Some(ErrorKind::AlreadyExists) => 3,
        Some(ErrorKind::ConstraintViolation) => 4,
        Some(ErrorKind::Cancelled | ErrorKind::DeadlineExceeded) => 5,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{dispatch, exit_code, Cli, Command, UserArgs};
    use clap::Parser;
    use userstore_core::{Context, InMemoryUserRepository, UserService};

    fn user_args(surname: &str, name: &str, age: i64) -> UserArgs {
        UserArgs {
            surname: surname.to_string(),
            name: name.to_string(),
            age,
        }
    }

    #[test]
    fn parses_update_with_flattened_fields() {
        let cli = Cli::try_parse_from([
            "userstore", "update", "3", "--surname", "Doe", "--name", "Jane", "--age", "31",
        ])
        .unwrap();
        match cli.command {
            Command::Update { id, user } => {
                assert_eq!(id, 3);
                assert_eq!(user.name, "Jane");
                assert_eq!(user.age, 31);
            }
            _ => panic!("expected update command"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn dispatch_prints_assigned_id_and_listing() {
        let service = UserService::new(InMemoryUserRepository::new());
        let ctx = Context::background();

        let inserted = dispatch(&service, &ctx, Command::Insert(user_args("Doe", "John", 30)))
            .unwrap();
        assert_eq!(inserted["id"], 1);

        let listed = dispatch(&service, &ctx, Command::List).unwrap();
        assert_eq!(listed["users"][0]["name"], "John");
        assert_eq!(listed["skipped"].as_array().map(Vec::len), Some(0));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let service = UserService::new(InMemoryUserRepository::new());
        let ctx = Context::background();

        let missing = dispatch(&service, &ctx, Command::Get { id: 9 }).unwrap_err();
        assert_eq!(exit_code(&missing), 2);

        dispatch(&service, &ctx, Command::Insert(user_args("Doe", "John", 30))).unwrap();
        let duplicate =
            dispatch(&service, &ctx, Command::Insert(user_args("Doe", "John", 30))).unwrap_err();
        assert_eq!(exit_code(&duplicate), 3);

        let invalid =
            dispatch(&service, &ctx, Command::Insert(user_args("", "John", 30))).unwrap_err();
        assert_eq!(exit_code(&invalid), 4);
    }
}
