//! Plain Thrift transport.
//!
//! Talks to the Hive Metastore (HMS) with the volo-thrift client generated in
//! the `hive_metastore` crate, using the buffered (unframed) binary codec HMS
//! listens with by default.

use crate::client::{DatabaseOutcome, MetastoreClient, TableOutcome};
use crate::config::ConnectionConfig;
use crate::descriptor::{ColumnDescriptor, ExpectedSchema, TableDescriptor, TableKind};
use crate::{MetastoreError, Result};
use async_trait::async_trait;
use hive_metastore::{
    ThriftHiveMetastoreClient, ThriftHiveMetastoreClientBuilder,
    ThriftHiveMetastoreCreateDatabaseException, ThriftHiveMetastoreCreateTableException,
};
use std::fmt::Debug;
use std::net::SocketAddr;
use tokio::sync::RwLock;
use tracing::debug;
use volo_thrift::MaybeException;

/// Hive Metastore client over a plain socket.
pub struct HiveThriftClient {
    /// `None` once closed
    client: RwLock<Option<ThriftHiveMetastoreClient>>,
    address: SocketAddr,
}

impl HiveThriftClient {
    /// Resolve the metastore address and build the client.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let address = resolve(config).await?;

        // volo connects lazily; probe once so an unreachable metastore fails here.
        tokio::net::TcpStream::connect(address)
            .await
            .map_err(|e| MetastoreError::Connection {
                address: config.address(),
                message: e.to_string(),
            })?;

        debug!(host = %config.host, address = %address, "Building Hive Metastore client");

        let client = ThriftHiveMetastoreClientBuilder::new("hms-smoke")
            .address(address)
            .make_codec(volo_thrift::codec::default::DefaultMakeCodec::buffered())
            .build();

        Ok(Self {
            client: RwLock::new(Some(client)),
            address,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }
}

/// Resolve `host:port`, taking the first address returned.
async fn resolve(config: &ConnectionConfig) -> Result<SocketAddr> {
    let address = config.address();
    let mut addrs = tokio::net::lookup_host(address.clone())
        .await
        .map_err(|e| MetastoreError::Connection {
            address: address.clone(),
            message: e.to_string(),
        })?;

    addrs.next().ok_or_else(|| {
        MetastoreError::Connection {
            address,
            message: "host resolved to no addresses".into(),
        }
        .into()
    })
}

/// Build the HMS table struct for a descriptor.
fn hive_table(descriptor: &TableDescriptor) -> hive_metastore::Table {
    let columns: Vec<hive_metastore::FieldSchema> = descriptor
        .columns
        .iter()
        .map(|c| hive_metastore::FieldSchema {
            name: Some(c.name.clone().into()),
            r#type: Some(c.r#type.clone().into()),
            comment: Some(c.comment.clone().into()),
        })
        .collect();

    let storage_descriptor = hive_metastore::StorageDescriptor {
        cols: Some(columns),
        location: Some(descriptor.location.clone().into()),
        input_format: Some(descriptor.input_format.clone().into()),
        output_format: Some(descriptor.output_format.clone().into()),
        compressed: Some(descriptor.compressed),
        num_buckets: Some(-1),
        serde_info: Some(hive_metastore::SerDeInfo {
            name: None,
            serialization_lib: Some(descriptor.serialization_lib.clone().into()),
            ..Default::default()
        }),
        stored_as_sub_directories: Some(false),
        ..Default::default()
    };

    let parameters = match descriptor.kind {
        TableKind::Managed => None,
        TableKind::External => {
            let mut parameters = ahash::AHashMap::new();
            parameters.insert(
                faststr::FastStr::from_static_str("EXTERNAL"),
                faststr::FastStr::from_static_str("TRUE"),
            );
            Some(parameters)
        }
    };

    hive_metastore::Table {
        table_name: Some(descriptor.table.clone().into()),
        db_name: Some(descriptor.database.clone().into()),
        create_time: Some(chrono::Utc::now().timestamp() as i32),
        last_access_time: Some(0),
        retention: Some(0),
        sd: Some(storage_descriptor),
        partition_keys: Some(Vec::new()),
        parameters,
        table_type: Some(descriptor.kind.as_hive_type().into()),
        ..Default::default()
    }
}

fn column_from_field(field: &hive_metastore::FieldSchema) -> ColumnDescriptor {
    ColumnDescriptor {
        name: field.name.as_ref().map(|s| s.to_string()).unwrap_or_default(),
        r#type: field
            .r#type
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_default(),
        comment: field
            .comment
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_default(),
    }
}

fn exception(operation: &str, e: impl Debug) -> MetastoreError {
    let message = format!("{:?}", e);
    let kind = if MetastoreError::is_already_exists_kind(&message) {
        "AlreadyExistsException"
    } else {
        "ThriftException"
    };
    MetastoreError::Exception {
        operation: operation.into(),
        kind: kind.into(),
        message,
    }
}

fn transport_error(operation: &str, e: impl std::fmt::Display) -> MetastoreError {
    MetastoreError::Transport(format!("Failed to {}: {}", operation, e))
}

#[async_trait]
impl MetastoreClient for HiveThriftClient {
    async fn create_database_if_not_exists(&self, name: &str) -> Result<DatabaseOutcome> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(MetastoreError::Closed)?;

        let database = hive_metastore::Database {
            name: Some(name.to_string().into()),
            ..Default::default()
        };

        match client.create_database(database).await {
            Ok(MaybeException::Ok(())) => Ok(DatabaseOutcome::Created),
            Ok(MaybeException::Exception(ThriftHiveMetastoreCreateDatabaseException::O1(_))) => {
                debug!(database = %name, "Hive database already exists");
                Ok(DatabaseOutcome::AlreadyExisted)
            }
            Ok(MaybeException::Exception(e)) => Err(exception("create_database", e).into()),
            Err(e) if MetastoreError::is_already_exists_kind(&e.to_string()) => {
                Ok(DatabaseOutcome::AlreadyExisted)
            }
            Err(e) => Err(transport_error("create database", e).into()),
        }
    }

    async fn create_table(&self, descriptor: &TableDescriptor) -> Result<TableOutcome> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(MetastoreError::Closed)?;

        match client.create_table(hive_table(descriptor)).await {
            Ok(MaybeException::Ok(())) => {
                debug!(table = %descriptor.qualified_name(), "Created Hive table");
                Ok(TableOutcome::Created)
            }
            Ok(MaybeException::Exception(ThriftHiveMetastoreCreateTableException::O1(_))) => {
                Ok(TableOutcome::AlreadyExisted)
            }
            Ok(MaybeException::Exception(e)) => Err(exception("create_table", e).into()),
            Err(e) if MetastoreError::is_already_exists_kind(&e.to_string()) => {
                Ok(TableOutcome::AlreadyExisted)
            }
            Err(e) => Err(transport_error("create table", e).into()),
        }
    }

    async fn get_schema(&self, db: &str, table: &str) -> Result<ExpectedSchema> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(MetastoreError::Closed)?;

        match client
            .get_schema(db.to_string().into(), table.to_string().into())
            .await
        {
            Ok(MaybeException::Ok(fields)) => {
                Ok(fields.iter().map(column_from_field).collect::<Vec<_>>().into())
            }
            Ok(MaybeException::Exception(e)) => Err(exception("get_schema", e).into()),
            Err(e) => Err(transport_error("get schema", e).into()),
        }
    }

    fn transport(&self) -> &'static str {
        "plain"
    }

    async fn close(&self) -> Result<()> {
        if self.client.write().await.take().is_some() {
            debug!(address = %self.address, "Hive Metastore client closed");
        }
        Ok(())
    }
}
