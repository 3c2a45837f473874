//! Metastore client seam.
//!
//! The harness only talks to a [`MetastoreClient`]. Two transports implement
//! it:
//!
//! - [`HiveThriftClient`]: plain binary Thrift via the `hive_metastore` crate
//! - [`SaslThriftClient`]: Thrift over a SASL/GSSAPI-wrapped socket for
//!   Kerberized metastores
//!
//! Conditions the smoke tests expect are returned as outcome values rather
//! than errors, so callers branch on data.

mod hive;
pub mod kerberos;
pub mod sasl;
mod sasl_client;
pub mod thrift_codec;

pub use hive::HiveThriftClient;
pub use sasl_client::SaslThriftClient;

use crate::config::ConnectionConfig;
use crate::descriptor::{ExpectedSchema, TableDescriptor};
use crate::Result;
use async_trait::async_trait;
use tracing::info;

/// Result of an idempotent database creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOutcome {
    Created,
    AlreadyExisted,
}

/// Result of a table creation that tolerates an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOutcome {
    Created,
    AlreadyExisted,
}

/// Trait defining the metastore operations the harness uses.
#[async_trait]
pub trait MetastoreClient: Send + Sync {
    /// Create a database, reporting an existing one as [`DatabaseOutcome::AlreadyExisted`].
    async fn create_database_if_not_exists(&self, name: &str) -> Result<DatabaseOutcome>;

    /// Create a managed or external table, depending on the descriptor's kind.
    async fn create_table(&self, descriptor: &TableDescriptor) -> Result<TableOutcome>;

    /// Fetch the columns currently stored for `db.table`, in order.
    async fn get_schema(&self, db: &str, table: &str) -> Result<ExpectedSchema>;

    /// Short transport name for logs.
    fn transport(&self) -> &'static str;

    /// Release the connection. Calling it twice is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Open a connection using the transport selected by `config`.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn MetastoreClient>> {
    let client: Box<dyn MetastoreClient> = match &config.kerberos {
        None => Box::new(HiveThriftClient::connect(config).await?),
        Some(kerberos) => {
            let mechanism = kerberos::gssapi_mechanism(kerberos, &config.host)?;
            Box::new(SaslThriftClient::connect(config, mechanism).await?)
        }
    };

    info!(
        address = %config.address(),
        transport = client.transport(),
        "Connected to Hive Metastore"
    );
    Ok(client)
}
