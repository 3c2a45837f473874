//! Metastore client over a negotiated SASL transport.

use crate::client::sasl::{SaslMechanism, SaslTransport};
use crate::client::thrift_codec::{self, Call, RemoteException, Reply};
use crate::client::{DatabaseOutcome, MetastoreClient, TableOutcome};
use crate::config::ConnectionConfig;
use crate::descriptor::{ExpectedSchema, TableDescriptor};
use crate::{MetastoreError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Hive Metastore client speaking Thrift through SASL frames.
pub struct SaslThriftClient<S = TcpStream> {
    /// `None` once closed
    transport: Mutex<Option<SaslTransport<S>>>,
    sequence: AtomicI32,
}

impl SaslThriftClient<TcpStream> {
    /// Open a socket to the metastore and negotiate SASL on it.
    pub async fn connect(
        config: &ConnectionConfig,
        mut mechanism: Box<dyn SaslMechanism>,
    ) -> Result<Self> {
        let address = config.address();
        debug!(address = %address, mechanism = mechanism.name(), "Opening SASL connection");

        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| MetastoreError::Connection {
                address: address.clone(),
                message: e.to_string(),
            })?;

        let transport = SaslTransport::negotiate(stream, mechanism.as_mut()).await?;
        Ok(Self::from_transport(transport))
    }
}

impl<S> SaslThriftClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already negotiated transport.
    pub fn from_transport(transport: SaslTransport<S>) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            sequence: AtomicI32::new(1),
        }
    }

    fn next_sequence(&self) -> i32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one request frame and wait for its reply frame.
    async fn round_trip(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(MetastoreError::Closed)?;

        transport.write_frame(&request).await?;
        transport.read_frame().await
    }

    async fn call_void(&self, call: &Call, seq: i32, request: Vec<u8>) -> Result<Reply<()>> {
        let reply = self.round_trip(request).await?;
        Ok(thrift_codec::decode_void_reply(call, seq, &reply)?)
    }
}

fn remote_error(operation: &str, e: RemoteException) -> crate::Error {
    MetastoreError::Exception {
        operation: operation.into(),
        kind: e.kind,
        message: e.message,
    }
    .into()
}

#[async_trait]
impl<S> MetastoreClient for SaslThriftClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn create_database_if_not_exists(&self, name: &str) -> Result<DatabaseOutcome> {
        let seq = self.next_sequence();
        let request = thrift_codec::encode_create_database(seq, name)?;

        match self
            .call_void(&thrift_codec::CREATE_DATABASE, seq, request)
            .await?
        {
            Ok(()) => Ok(DatabaseOutcome::Created),
            Err(e) if e.is_already_exists() => {
                debug!(database = %name, "Hive database already exists");
                Ok(DatabaseOutcome::AlreadyExisted)
            }
            Err(e) => Err(remote_error("create_database", e)),
        }
    }

    async fn create_table(&self, descriptor: &TableDescriptor) -> Result<TableOutcome> {
        let seq = self.next_sequence();
        let create_time = chrono::Utc::now().timestamp() as i32;
        let request = thrift_codec::encode_create_table(seq, descriptor, create_time)?;

        match self
            .call_void(&thrift_codec::CREATE_TABLE, seq, request)
            .await?
        {
            Ok(()) => Ok(TableOutcome::Created),
            Err(e) if e.is_already_exists() => Ok(TableOutcome::AlreadyExisted),
            Err(e) => Err(remote_error("create_table", e)),
        }
    }

    async fn get_schema(&self, db: &str, table: &str) -> Result<ExpectedSchema> {
        let seq = self.next_sequence();
        let request = thrift_codec::encode_get_schema(seq, db, table)?;
        let reply = self.round_trip(request).await?;

        match thrift_codec::decode_get_schema_reply(seq, &reply)? {
            Ok(columns) => Ok(columns.into()),
            Err(e) => Err(remote_error("get_schema", e)),
        }
    }

    fn transport(&self) -> &'static str {
        "sasl"
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut transport) = self.transport.lock().await.take() {
            if let Err(e) = transport.shutdown().await {
                warn!(error = %e, "Failed to shut down SASL transport cleanly");
            }
            debug!("SASL metastore client closed");
        }
        Ok(())
    }
}
