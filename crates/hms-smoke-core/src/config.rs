//! Configuration structures for hms-smoke.
//!
//! Configuration is loaded from an optional TOML file and overridden via CLI
//! flags. The result of that merge is a [`RunConfig`], a pure value handed to
//! the harness.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default metastore Thrift port.
pub const DEFAULT_PORT: u16 = 9083;
/// Database used by the schema suite unless overridden.
pub const DEFAULT_SCHEMA_DATABASE: &str = "test_metastore";
/// Database the authorization policy is expected to reject.
pub const DEFAULT_DENIED_DATABASE: &str = "db_not_allowed";

/// Main configuration file structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HarnessConfig {
    /// Connection defaults
    #[serde(default)]
    pub connection: ConnectionDefaults,

    /// Kerberos principal settings
    #[serde(default)]
    pub kerberos: KerberosConfig,

    /// Scenario storage locations
    #[serde(default)]
    pub scenarios: ScenarioConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Defaults applied when the CLI does not say otherwise.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ConnectionDefaults {
    /// Metastore port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Service name used to derive a pod host from a namespace
    #[serde(default = "default_namespace_service")]
    pub namespace_service: String,

    /// Role group used to derive a pod host from a namespace
    #[serde(default = "default_role_group")]
    pub role_group: String,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            port: default_port(),
            namespace_service: default_namespace_service(),
            role_group: default_role_group(),
        }
    }
}

impl ConnectionDefaults {
    /// Host of the first metastore pod in `namespace`.
    ///
    /// `hive-postgres-s3-metastore-default-0.hive-postgres-s3-metastore-default.<ns>.svc.cluster.local`
    pub fn host_for_namespace(&self, namespace: &str) -> String {
        let service = format!("{}-{}", self.namespace_service, self.role_group);
        format!("{service}-0.{service}.{namespace}.svc.cluster.local")
    }
}

/// Kerberos principal settings for the SASL transport.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KerberosConfig {
    /// First component of the metastore service principal
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Prefix of the pod DNS name that gets rewritten
    #[serde(default = "default_pod_host_prefix")]
    pub pod_host_prefix: String,

    /// Replacement giving the host component of the principal
    #[serde(default = "default_principal_host_prefix")]
    pub principal_host_prefix: String,
}

impl Default for KerberosConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            pod_host_prefix: default_pod_host_prefix(),
            principal_host_prefix: default_principal_host_prefix(),
        }
    }
}

impl KerberosConfig {
    /// Map the pod DNS host onto the host component of the service principal.
    ///
    /// `hive-metastore-default-0.hive-metastore-default.<ns>.svc.cluster.local`
    /// becomes `hive.<ns>.svc.cluster.local`.
    pub fn principal_host(&self, host: &str) -> String {
        if self.pod_host_prefix.is_empty() {
            return host.to_string();
        }
        host.replace(&self.pod_host_prefix, &self.principal_host_prefix)
    }

    /// `service/host` as it appears in the keytab.
    pub fn service_principal(&self, host: &str) -> String {
        format!("{}/{}", self.service_name, self.principal_host(host))
    }
}

/// Storage locations used by the schema scenarios.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Root under which local tables are placed
    #[serde(default = "default_warehouse_root")]
    pub warehouse_root: String,

    /// Location of the S3 table
    #[serde(default = "default_s3_location")]
    pub s3_location: String,

    /// Location of the HDFS table
    #[serde(default = "default_hdfs_location")]
    pub hdfs_location: String,

    /// Create `EXTERNAL_TABLE`s instead of managed ones
    #[serde(default)]
    pub external_tables: bool,

    /// Mark the storage descriptors as compressed
    #[serde(default)]
    pub compressed: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            warehouse_root: default_warehouse_root(),
            s3_location: default_s3_location(),
            hdfs_location: default_hdfs_location(),
            external_tables: false,
            compressed: false,
        }
    }
}

/// Monitoring configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MonitoringConfig {
    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(crate::Error::Config(format!(
                "Unknown log format '{other}', expected 'text' or 'json'"
            ))),
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_namespace_service() -> String {
    "hive-postgres-s3-metastore".into()
}
fn default_role_group() -> String {
    "default".into()
}
fn default_service_name() -> String {
    "hive".into()
}
fn default_pod_host_prefix() -> String {
    "hive-metastore-default-0.hive-metastore-default".into()
}
fn default_principal_host_prefix() -> String {
    "hive".into()
}
fn default_warehouse_root() -> String {
    "/stackable/warehouse".into()
}
fn default_s3_location() -> String {
    "s3a://hive/".into()
}
fn default_hdfs_location() -> String {
    "hdfs://hdfs/access-hive/hive".into()
}

impl HarnessConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: HarnessConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.connection.port == 0 {
            return Err(crate::Error::Config("Port must not be 0".into()));
        }

        if self.connection.namespace_service.is_empty() {
            return Err(crate::Error::Config(
                "Namespace service name is required".into(),
            ));
        }

        if self.kerberos.service_name.is_empty() {
            return Err(crate::Error::Config(
                "Kerberos service name is required".into(),
            ));
        }

        let scenarios = &self.scenarios;
        for (name, value) in [
            ("warehouse_root", &scenarios.warehouse_root),
            ("s3_location", &scenarios.s3_location),
            ("hdfs_location", &scenarios.hdfs_location),
        ] {
            if value.is_empty() {
                return Err(crate::Error::Config(format!("{name} must not be empty")));
            }
        }

        if self.kerberos.pod_host_prefix.is_empty() {
            tracing::warn!("Empty Kerberos pod host prefix, principal host equals the target host");
        }

        Ok(())
    }
}

/// Where and how to reach the metastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// SASL/GSSAPI settings; `None` means a plain transport
    pub kerberos: Option<KerberosConfig>,
}

impl ConnectionConfig {
    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            kerberos: None,
        }
    }

    pub fn with_kerberos(mut self, kerberos: KerberosConfig) -> Self {
        self.kerberos = Some(kerberos);
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage backend exercised by a schema scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScenario {
    Local,
    S3,
    Hdfs,
}

impl StorageScenario {
    /// Name of the table the scenario creates.
    pub fn table_name(&self) -> &'static str {
        match self {
            StorageScenario::Local => "one_column_table",
            StorageScenario::S3 => "s3_one_column_table",
            StorageScenario::Hdfs => "hdfs_one_column_table",
        }
    }

    /// Label used in console output.
    pub fn label(&self) -> &'static str {
        match self {
            StorageScenario::Local => "local",
            StorageScenario::S3 => "s3",
            StorageScenario::Hdfs => "HDFS",
        }
    }

    /// Storage location of the scenario's table in `database`.
    pub fn location(&self, scenarios: &ScenarioConfig, database: &str) -> String {
        match self {
            StorageScenario::Local => format!(
                "{}/location_{}_{}",
                scenarios.warehouse_root.trim_end_matches('/'),
                database,
                self.table_name()
            ),
            StorageScenario::S3 => scenarios.s3_location.clone(),
            StorageScenario::Hdfs => scenarios.hdfs_location.clone(),
        }
    }

    /// Scenarios run when none are requested explicitly.
    pub fn defaults(kerberos: bool) -> Vec<StorageScenario> {
        if kerberos {
            vec![StorageScenario::Local, StorageScenario::Hdfs]
        } else {
            vec![StorageScenario::Local, StorageScenario::S3]
        }
    }
}

impl fmt::Display for StorageScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StorageScenario {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageScenario::Local),
            "s3" => Ok(StorageScenario::S3),
            "hdfs" => Ok(StorageScenario::Hdfs),
            other => Err(crate::Error::Usage(format!(
                "Unknown scenario '{other}', expected one of local, s3, hdfs"
            ))),
        }
    }
}

/// Which group of checks a run performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suite {
    /// Create tables and compare their schemas
    Schema { scenarios: Vec<StorageScenario> },
    /// Expect the policy layer to reject database creation
    AuthorizationDenied,
}

/// Everything one harness run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub connection: ConnectionConfig,
    pub database: String,
    pub suite: Suite,
    pub scenarios: ScenarioConfig,
}
