//! The per-connection state machine (§4.3): handshake, then a Ready/Busy
//! cycle driving Parse/Describe/Execute/Sync requests.
//!
//! Generic over the transport via a trait object-free generic bound, so any
//! `AsyncRead + AsyncWrite` stream type slots in without a second connection
//! type.

mod handshake;
mod query;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::buffer::{ReadMessageBuffer, WriteMessageBuffer};
use crate::codec::CodecRegistry;
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::protocol::TransactionStatus;

pub use query::QueryResult;

/// Connection lifecycle phase (§4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    TcpConnected,
    Ready,
    Busy,
    Closed,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Uninitialized => "Uninitialized",
            Phase::TcpConnected => "TcpConnected",
            Phase::Ready => "Ready",
            Phase::Busy => "Busy",
            Phase::Closed => "Closed",
        }
    }
}

pub struct Connection<T> {
    stream: BufWriter<T>,
    read_buf: ReadMessageBuffer,
    registry: CodecRegistry,
    phase: Phase,
    server_settings: HashMap<String, Vec<u8>>,
    server_key_data: Option<[u8; 32]>,
    transaction_status: TransactionStatus,
    last_status: Option<String>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: T) -> Self {
        Self {
            stream: BufWriter::new(stream),
            read_buf: ReadMessageBuffer::new(),
            registry: CodecRegistry::new(),
            phase: Phase::TcpConnected,
            server_settings: HashMap::new(),
            server_key_data: None,
            transaction_status: TransactionStatus::Idle,
            last_status: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn server_settings(&self) -> &HashMap<String, Vec<u8>> {
        &self.server_settings
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    /// Performs the handshake (§4.3.2), moving the connection from
    /// `TcpConnected` to `Ready`.
    pub async fn handshake(&mut self, user: &str, database: &str) -> Result<()> {
        if self.phase != Phase::TcpConnected {
            return Err(ProtocolError::WrongPhase {
                expected: "TcpConnected",
                actual: self.phase.name(),
            }
            .into());
        }
        let result = handshake::run(self, user, database).await;
        match &result {
            Ok(()) => self.transition(Phase::Ready),
            Err(_) => self.transition(Phase::Closed),
        }
        result
    }

    /// Runs one Parse/Describe/Execute/Sync cycle (§4.3.3) and decodes the
    /// result rows with the output codec.
    pub async fn query(
        &mut self,
        text: &str,
        json_mode: bool,
        expect_one: bool,
        args: &crate::codec::value::Value,
    ) -> Result<QueryResult> {
        if self.phase != Phase::Ready {
            return Err(ProtocolError::WrongPhase {
                expected: "Ready",
                actual: self.phase.name(),
            }
            .into());
        }
        self.transition(Phase::Busy);
        let result = query::run(self, text, json_mode, expect_one, args).await;
        match &result {
            Ok(_) => self.transition(Phase::Ready),
            Err(_) => self.transition(Phase::Closed),
        }
        result
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        let mut write_buf = WriteMessageBuffer::new();
        write_buf.begin_message(crate::protocol::constants::client_tag::TERMINATE)?;
        write_buf.end_message()?;
        let bytes = write_buf.unwrap()?;
        let _ = self.stream.write_all(&bytes).await;
        let _ = self.stream.shutdown().await;
        self.transition(Phase::Closed);
        Ok(())
    }

    fn transition(&mut self, to: Phase) {
        debug!(from = self.phase.name(), to = to.name(), "connection phase transition");
        self.phase = to;
    }

    async fn send(&mut self, write_buf: &mut WriteMessageBuffer) -> Result<()> {
        let bytes = std::mem::replace(write_buf, WriteMessageBuffer::new()).unwrap()?;
        self.stream.write_all(&bytes).await.map_err(TransportError::from)?;
        self.stream.flush().await.map_err(TransportError::from)?;
        Ok(())
    }

    /// Reads from the transport until at least one complete frame is
    /// buffered, per §5's suspension contract: exactly one of a parsable
    /// frame or a transport error wakes the caller.
    async fn wait_for_message(&mut self) -> Result<()> {
        use tokio::io::AsyncReadExt;

        loop {
            if self.read_buf.take_message() {
                return Ok(());
            }
            let mut chunk = vec![0u8; 4096];
            let n = match self.stream.read(&mut chunk).await {
                Ok(n) => n,
                Err(err) => {
                    self.transition(Phase::Closed);
                    return Err(Error::Transport(TransportError::from(err)));
                }
            };
            if n == 0 {
                self.transition(Phase::Closed);
                return Err(Error::Transport(TransportError::ClosedByPeer));
            }
            chunk.truncate(n);
            if self.read_buf.feed(chunk.into()) {
                // Ring at capacity; in a real transport this is where
                // `stream.pause()` would apply backpressure (§5). The
                // buffered-reader path here simply proceeds to drain it.
                debug!("inbound message ring at capacity");
            }
        }
    }
}
