//! hms-smoke core - smoke tests for a deployed Hive Metastore
//!
//! This library drives a fixed sequence of metastore calls and checks what
//! comes back:
//!
//! - Idempotent database and table creation for local, S3 and HDFS locations
//! - Exact, ordered comparison of the stored schema
//! - A negative scenario expecting an authorization layer to deny access
//! - Plain or SASL/GSSAPI (Kerberos) Thrift transports

pub mod client;
pub mod config;
pub mod console;
pub mod descriptor;
pub mod error;
pub mod harness;

// Re-export commonly used types
pub use client::{connect, DatabaseOutcome, MetastoreClient, TableOutcome};
pub use config::{ConnectionConfig, HarnessConfig, RunConfig, StorageScenario, Suite};
pub use descriptor::{build_table_descriptor, ColumnDescriptor, ExpectedSchema, TableDescriptor};
pub use error::{Error, MetastoreError, Result};
pub use harness::{AuthorizationOutcome, ScenarioReport, SuiteReport};
