//! hms-smoke CLI - smoke tests for a deployed Hive Metastore.

use hms_smoke_core::config::{HarnessConfig, LogFormat};
use hms_smoke_core::{console, Error, Suite};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod args;
mod commands;

use args::Cli;

/// Exit codes for CLI operations.
///
/// - 0: every check passed
/// - 2: bad arguments or configuration, nothing was contacted
/// - -1 (255): a check failed or an unexpected error occurred
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Usage or configuration error
    UsageError = 2,
    /// Assertion failure or unexpected error
    Failure = -1,
}

impl ExitCode {
    /// Map an error to an exit code by inspecting its type.
    fn from_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<Error>() {
            Some(Error::Usage(_)) | Some(Error::Config(_)) => ExitCode::UsageError,
            _ => ExitCode::Failure,
        }
    }
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = match args::parse_arguments(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::UsageError
            } else {
                ExitCode::Success
            };
        }
    };

    let file_config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            console::error(e.to_string());
            return ExitCode::UsageError;
        }
    };

    init_logging(
        cli.verbose,
        cli.log_format.unwrap_or(file_config.monitoring.log_format),
    );

    match execute_command(cli, file_config).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            console::error(failure_message(&e));
            ExitCode::from_error(&e)
        }
    }
}

/// Verdict line for a failed command.
///
/// Only the outermost message: wrapped errors already embed their source.
fn failure_message(error: &anyhow::Error) -> String {
    error.to_string()
}

/// Initialize logging on stderr; stdout carries the verdict lines.
fn init_logging(verbose: u8, log_format: LogFormat) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    match log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli, file_config: HarnessConfig) -> anyhow::Result<()> {
    match cli.command.run_config(&file_config) {
        Some(config) => match config.suite {
            Suite::Schema { .. } => commands::smoke::run(config).await?,
            Suite::AuthorizationDenied => commands::authz::run(config).await?,
        },
        None => {
            file_config.validate()?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}

/// Load the config file if one was given, otherwise use defaults.
fn load_config(path: &Option<PathBuf>) -> hms_smoke_core::Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::from_file(path),
        None => Ok(HarnessConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hms_smoke_core::MetastoreError;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as i32, 0);
        assert_eq!(ExitCode::Failure as i32, -1);
    }

    #[test]
    fn test_exit_code_from_error() {
        let usage = anyhow::Error::from(Error::Usage("missing host".into()));
        assert_eq!(ExitCode::from_error(&usage), ExitCode::UsageError);

        let mismatch = anyhow::Error::from(Error::SchemaMismatch {
            scenario: "local".into(),
            actual: "[]".into(),
            expected: "[]".into(),
        });
        assert_eq!(ExitCode::from_error(&mismatch), ExitCode::Failure);

        let denied = anyhow::Error::from(Error::AuthorizationNotEnforced {
            database: "db_not_allowed".into(),
        });
        assert_eq!(ExitCode::from_error(&denied), ExitCode::Failure);

        let transport = anyhow::Error::from(Error::from(MetastoreError::Transport("eof".into())));
        assert_eq!(ExitCode::from_error(&transport), ExitCode::Failure);

        let other = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_error(&other), ExitCode::Failure);
    }

    #[test]
    fn test_failure_message_names_cause_once() {
        let err = anyhow::Error::from(Error::from(MetastoreError::Connection {
            address: "127.0.0.1:1".into(),
            message: "Connection refused".into(),
        }));

        let message = failure_message(&err);
        assert_eq!(
            message,
            "Metastore error: Connection failed to 127.0.0.1:1: Connection refused"
        );
        assert_eq!(message.matches("Connection failed").count(), 1);
    }

    #[test]
    fn test_missing_config_file() {
        let result = load_config(&Some(PathBuf::from("/nonexistent/hms-smoke.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(load_config(&None).is_ok());
    }
}
