//! SASL-wrapped Thrift transport.
//!
//! Kerberized metastores expect the TSaslTransport wire format. During
//! negotiation every message is `status: u8 | length: u32 BE | payload`.
//! Once negotiation completes with the `auth` quality of protection, each
//! Thrift message travels as one `length: u32 BE | payload` frame.

use crate::{MetastoreError, Result};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Largest frame accepted from the server.
pub const MAX_FRAME_LENGTH: usize = 104_857_600;

/// Negotiation status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NegotiationStatus {
    Start = 1,
    Ok = 2,
    Bad = 3,
    Error = 4,
    Complete = 5,
}

impl NegotiationStatus {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(NegotiationStatus::Start),
            2 => Ok(NegotiationStatus::Ok),
            3 => Ok(NegotiationStatus::Bad),
            4 => Ok(NegotiationStatus::Error),
            5 => Ok(NegotiationStatus::Complete),
            other => Err(
                MetastoreError::Sasl(format!("invalid negotiation status byte {other}")).into(),
            ),
        }
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationStatus::Start => "START",
            NegotiationStatus::Ok => "OK",
            NegotiationStatus::Bad => "BAD",
            NegotiationStatus::Error => "ERROR",
            NegotiationStatus::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// Client side of a SASL mechanism.
pub trait SaslMechanism: Send {
    /// Mechanism name sent with `START`, e.g. `GSSAPI`.
    fn name(&self) -> &str;

    /// Response sent right after `START`.
    fn initial_response(&mut self) -> Result<Vec<u8>>;

    /// Answer a server challenge.
    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Vec<u8>>;

    /// Whether the client side has finished.
    fn is_complete(&self) -> bool;
}

/// A negotiated SASL stream carrying length-prefixed frames.
pub struct SaslTransport<S> {
    stream: S,
}

impl<S> SaslTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run the client negotiation over `stream`.
    pub async fn negotiate(stream: S, mechanism: &mut dyn SaslMechanism) -> Result<Self> {
        let mut transport = Self { stream };

        debug!(mechanism = mechanism.name(), "Starting SASL negotiation");
        transport
            .send_negotiation(NegotiationStatus::Start, mechanism.name().as_bytes())
            .await?;

        let initial = match mechanism.initial_response() {
            Ok(initial) => initial,
            Err(e) => return Err(transport.abort(e).await),
        };
        let status = if mechanism.is_complete() {
            NegotiationStatus::Complete
        } else {
            NegotiationStatus::Ok
        };
        transport.send_negotiation(status, &initial).await?;

        let mut last_status = None;
        while !mechanism.is_complete() {
            let (status, payload) = transport.recv_negotiation().await?;
            last_status = Some(status);

            let response = match mechanism.evaluate_challenge(&payload) {
                Ok(response) => response,
                Err(e) => return Err(transport.abort(e).await),
            };

            if status == NegotiationStatus::Complete {
                continue;
            }

            let status = if mechanism.is_complete() {
                NegotiationStatus::Complete
            } else {
                NegotiationStatus::Ok
            };
            transport.send_negotiation(status, &response).await?;
        }

        // Client finished first; the server still owes its COMPLETE.
        if last_status != Some(NegotiationStatus::Complete) {
            let (status, _) = transport.recv_negotiation().await?;
            if status != NegotiationStatus::Complete {
                return Err(MetastoreError::Sasl(format!(
                    "expected SASL COMPLETE, got {status}"
                ))
                .into());
            }
        }

        debug!(mechanism = mechanism.name(), "SASL negotiation complete");
        Ok(transport)
    }

    async fn send_negotiation(&mut self, status: NegotiationStatus, payload: &[u8]) -> Result<()> {
        trace!(status = %status, len = payload.len(), "Sending SASL message");
        let mut message = Vec::with_capacity(5 + payload.len());
        message.push(status as u8);
        message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        message.extend_from_slice(payload);

        self.stream.write_all(&message).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv_negotiation(&mut self) -> Result<(NegotiationStatus, Vec<u8>)> {
        let status = NegotiationStatus::from_byte(self.stream.read_u8().await?)?;
        let payload = self.read_payload().await?;
        trace!(status = %status, len = payload.len(), "Received SASL message");

        match status {
            NegotiationStatus::Ok | NegotiationStatus::Complete => Ok((status, payload)),
            NegotiationStatus::Bad | NegotiationStatus::Error => Err(MetastoreError::Sasl(
                format!("server sent {status}: {}", String::from_utf8_lossy(&payload)),
            )
            .into()),
            NegotiationStatus::Start => Err(MetastoreError::Sasl(
                "server sent START during negotiation".into(),
            )
            .into()),
        }
    }

    /// Tell the server the client gave up, then hand back the original error.
    async fn abort(&mut self, err: crate::Error) -> crate::Error {
        let message = err.to_string();
        if let Err(e) = self
            .send_negotiation(NegotiationStatus::Error, message.as_bytes())
            .await
        {
            debug!(error = %e, "Failed to report SASL error to server");
        }
        err
    }

    async fn read_payload(&mut self) -> Result<Vec<u8>> {
        let len = self.stream.read_u32().await? as usize;
        if len > MAX_FRAME_LENGTH {
            return Err(MetastoreError::Protocol(format!(
                "frame of {len} bytes exceeds limit of {MAX_FRAME_LENGTH}"
            ))
            .into());
        }

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        Ok(payload)
    }

    /// Send one Thrift message.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.stream.write_u32(payload.len() as u32).await?;
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive one Thrift message.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
        self.read_payload().await
    }

    /// Shut down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
