//! Command-line arguments.

use clap::{Args, Parser, Subcommand};
use hms_smoke_core::config::{
    HarnessConfig, LogFormat, DEFAULT_DENIED_DATABASE, DEFAULT_SCHEMA_DATABASE,
};
use hms_smoke_core::{ConnectionConfig, RunConfig, StorageScenario, Suite};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hms-smoke")]
#[command(about = "Smoke tests for a deployed Hive Metastore", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to an optional configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (text or json), overrides the config file
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create one table per storage location and verify the stored schemas
    Smoke {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Scenarios to run (local, s3, hdfs); defaults to local,s3 or local,hdfs with --kerberos
        #[arg(long = "scenario", value_delimiter = ',')]
        scenarios: Vec<StorageScenario>,
    },

    /// Expect the authorization layer to deny creating a database
    Authz {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Validate configuration file
    Validate,
}

/// Where the metastore is and how to talk to it.
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Metastore server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Test database name
    #[arg(short, long)]
    pub database: Option<String>,

    #[command(flatten)]
    pub target: Target,

    /// Use the SASL/GSSAPI (Kerberos) transport
    #[arg(long)]
    pub kerberos: bool,
}

/// Exactly one of an explicit host or a namespace.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// The host or service to connect to
    #[arg(short, long)]
    pub metastore: Option<String>,

    /// The namespace the metastore runs in; the pod host is derived from it
    #[arg(short, long)]
    pub namespace: Option<String>,
}

impl ConnectionArgs {
    fn connection_config(&self, file: &HarnessConfig) -> ConnectionConfig {
        let host = match (&self.target.metastore, &self.target.namespace) {
            (Some(host), _) => host.clone(),
            (None, Some(namespace)) => file.connection.host_for_namespace(namespace),
            // clap enforces the group
            (None, None) => String::new(),
        };
        let port = self.port.unwrap_or(file.connection.port);

        let config = ConnectionConfig::plain(host, port);
        if self.kerberos {
            config.with_kerberos(file.kerberos.clone())
        } else {
            config
        }
    }
}

impl Commands {
    /// Merge the arguments with the config file into a run description.
    ///
    /// `None` for commands that do not talk to a metastore.
    pub fn run_config(&self, file: &HarnessConfig) -> Option<RunConfig> {
        match self {
            Commands::Smoke {
                connection,
                scenarios,
            } => {
                let scenarios = if scenarios.is_empty() {
                    StorageScenario::defaults(connection.kerberos)
                } else {
                    scenarios.clone()
                };
                Some(RunConfig {
                    connection: connection.connection_config(file),
                    database: connection
                        .database
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SCHEMA_DATABASE.to_string()),
                    suite: Suite::Schema { scenarios },
                    scenarios: file.scenarios.clone(),
                })
            }
            Commands::Authz { connection } => Some(RunConfig {
                connection: connection.connection_config(file),
                database: connection
                    .database
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DENIED_DATABASE.to_string()),
                suite: Suite::AuthorizationDenied,
                scenarios: file.scenarios.clone(),
            }),
            Commands::Validate => None,
        }
    }
}

/// Parse `argv` without exiting the process.
pub fn parse_arguments<I, T>(argv: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn run_config(argv: &[&str]) -> RunConfig {
        parse_arguments(argv.iter().copied())
            .unwrap()
            .command
            .run_config(&HarnessConfig::default())
            .unwrap()
    }

    #[test]
    fn test_smoke_defaults() {
        let config = run_config(&["hms-smoke", "smoke", "-m", "hive-metastore"]);

        assert_eq!(
            config.connection,
            ConnectionConfig::plain("hive-metastore", 9083)
        );
        assert_eq!(config.database, "test_metastore");
        assert_eq!(
            config.suite,
            Suite::Schema {
                scenarios: vec![StorageScenario::Local, StorageScenario::S3]
            }
        );
    }

    #[test]
    fn test_kerberos_defaults_to_hdfs() {
        let config = run_config(&[
            "hms-smoke",
            "smoke",
            "--metastore",
            "hive-metastore-default-0.hive-metastore-default.ns.svc.cluster.local",
            "--kerberos",
            "-p",
            "9084",
        ]);

        let kerberos = config.connection.kerberos.as_ref().unwrap();
        assert_eq!(
            kerberos.principal_host(&config.connection.host),
            "hive.ns.svc.cluster.local"
        );
        assert_eq!(config.connection.port, 9084);
        assert_eq!(
            config.suite,
            Suite::Schema {
                scenarios: vec![StorageScenario::Local, StorageScenario::Hdfs]
            }
        );
    }

    #[test]
    fn test_namespace_derives_host() {
        let config = run_config(&["hms-smoke", "smoke", "-n", "kuttl-test", "-d", "other_db"]);

        assert_eq!(
            config.connection.host,
            "hive-postgres-s3-metastore-default-0.hive-postgres-s3-metastore-default.kuttl-test.svc.cluster.local"
        );
        assert_eq!(config.database, "other_db");
    }

    #[test]
    fn test_explicit_scenarios() {
        let config = run_config(&["hms-smoke", "smoke", "-m", "h", "--scenario", "s3,hdfs"]);
        assert_eq!(
            config.suite,
            Suite::Schema {
                scenarios: vec![StorageScenario::S3, StorageScenario::Hdfs]
            }
        );

        let err = parse_arguments(["hms-smoke", "smoke", "-m", "h", "--scenario", "ftp"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_authz_defaults() {
        let config = run_config(&["hms-smoke", "authz", "-m", "hive"]);
        assert_eq!(config.database, "db_not_allowed");
        assert_eq!(config.suite, Suite::AuthorizationDenied);
    }

    #[test]
    fn test_missing_target_is_usage_error() {
        let err = parse_arguments(["hms-smoke", "smoke", "-p", "9083"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = parse_arguments(["hms-smoke", "authz"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_host_and_namespace_conflict() {
        let err = parse_arguments(["hms-smoke", "smoke", "-m", "h", "-n", "ns"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_invalid_port() {
        let err = parse_arguments(["hms-smoke", "smoke", "-m", "h", "-p", "http"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_config_file_port_applies() {
        let mut file = HarnessConfig::default();
        file.connection.port = 9999;

        let cli = parse_arguments(["hms-smoke", "smoke", "-m", "h"]).unwrap();
        let config = cli.command.run_config(&file).unwrap();
        assert_eq!(config.connection.port, 9999);

        let cli = parse_arguments(["hms-smoke", "smoke", "-m", "h", "-p", "9083"]).unwrap();
        let config = cli.command.run_config(&file).unwrap();
        assert_eq!(config.connection.port, 9083);
    }

    #[test]
    fn test_global_flags() {
        let cli =
            parse_arguments(["hms-smoke", "validate", "-vv", "--log-format", "json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(cli.command.run_config(&HarnessConfig::default()).is_none());
    }
}
