//! Half-duplex byte transport over TCP or serial, with frame-atomic reads
// (c) 2026 OpenNetty contributors

mod serial;

pub use serial::SerialSettings;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::TransportError;
use crate::frame::{extract_frame, Frame};

/// Where to connect, and how.
#[derive(Debug, Clone)]
pub enum TransportDescriptor {
    /// Plain TCP, no TLS.
    Tcp {
        /// hostname or IP
        host: String,
        /// TCP port
        port: u16,
    },
    /// A local serial port.
    Serial {
        /// device path, e.g. `/dev/ttyUSB0`
        path: String,
        /// line settings
        settings: SerialSettings,
    },
}

/// Internal byte-stream handle, abstracting over TCP and serial.
enum Io {
    Tcp(tokio::net::TcpStream),
    Serial(tokio_serial::SerialStream),
}

/// A half-duplex byte transport to one gateway. Owned exclusively by its
/// [`Session`](crate::session::Session); only one writer and one reader
/// task may use it concurrently (enforced by the Session, not by this
/// type).
pub struct Connection {
    io: Io,
    read_buf: Vec<u8>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.read_buf.len())
            .finish()
    }
}

impl Connection {
    /// Opens a connection per `descriptor`, failing if `deadline` elapses
    /// first.
    pub async fn open(
        descriptor: &TransportDescriptor,
        deadline: Duration,
    ) -> Result<Self, TransportError> {
        let io = tokio::time::timeout(deadline, async {
            match descriptor {
                TransportDescriptor::Tcp { host, port } => {
                    let stream = tokio::net::TcpStream::connect((host.as_str(), *port)).await?;
                    Ok::<_, TransportError>(Io::Tcp(stream))
                }
                TransportDescriptor::Serial { path, settings } => {
                    let stream = serial::open(path, *settings)?;
                    Ok(Io::Serial(stream))
                }
            }
        })
        .await
        .map_err(|_| TransportError::DeadlineElapsed)??;
        Ok(Self {
            io,
            read_buf: Vec::with_capacity(256),
        })
    }

    /// Serializes and writes exactly one frame.
    pub async fn send(&mut self, frame: &Frame, cancel: &CancellationToken) -> Result<(), TransportError> {
        let bytes = frame.serialize();
        tokio::select! {
            () = cancel.cancelled() => Err(TransportError::Cancelled),
            result = write_all(&mut self.io, &bytes) => result,
        }
    }

    /// Returns the next complete frame, reading more bytes as needed.
    /// Partial frames remain buffered across calls.
    pub async fn receive(&mut self, cancel: &CancellationToken) -> Result<Frame, TransportError> {
        loop {
            match extract_frame(&self.read_buf) {
                Some(Ok((frame, consumed))) => {
                    self.read_buf.drain(..consumed);
                    trace!(bytes = consumed, "frame extracted");
                    return Ok(frame);
                }
                Some(Err((error, consumed))) => {
                    warn!(%error, bytes = consumed, "dropping malformed frame, resyncing stream");
                    self.read_buf.drain(..consumed);
                    continue;
                }
                None => {}
            }
            let mut chunk = [0_u8; 512];
            let n = tokio::select! {
                () = cancel.cancelled() => return Err(TransportError::Cancelled),
                result = read_some(&mut self.io, &mut chunk) => result?,
            };
            if n == 0 {
                return Err(TransportError::Closed);
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Releases the OS handle. Idempotent: subsequent sends/receives will
    /// simply fail with [`TransportError::Closed`]-shaped errors from the
    /// underlying OS handle.
    pub async fn close(&mut self) {
        match &mut self.io {
            Io::Tcp(s) => {
                let _ = s.shutdown().await;
            }
            Io::Serial(s) => {
                let _ = s.shutdown().await;
            }
        }
    }
}

async fn write_all(io: &mut Io, bytes: &[u8]) -> Result<(), TransportError> {
    match io {
        Io::Tcp(s) => s.write_all(bytes).await.map_err(TransportError::Io),
        Io::Serial(s) => s.write_all(bytes).await.map_err(TransportError::Io),
    }
}

async fn read_some(io: &mut Io, buf: &mut [u8]) -> Result<usize, TransportError> {
    match io {
        Io::Tcp(s) => s.read(buf).await.map_err(TransportError::Io),
        Io::Serial(s) => s.read(buf).await.map_err(TransportError::Io),
    }
}
