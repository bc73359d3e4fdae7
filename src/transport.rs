//! TCP transport plumbing.
//!
//! The connected stream splits once: the read half is owned by the reader
//! fiber, the write half sits behind a shared mutex so authentication and
//! the writer fiber serialize their writes. Taking the write half out of the
//! slot is how shutdown makes later sends observe `NotConnected`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::error::{RconError, Result};
use crate::protocol::{Packet, PacketBuffer};

/// Bytes pulled off the socket per read.
const READ_CHUNK_LEN: usize = 4096;

/// The session's write half; `None` once the connection is torn down.
pub(crate) type SharedStream = Arc<Mutex<Option<OwnedWriteHalf>>>;

/// Dial the endpoint, bounding the attempt by `connect_timeout`.
pub(crate) async fn dial(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(err)) => Err(RconError::Dial(err)),
        Err(_) => Err(RconError::Dial(io::Error::new(
            io::ErrorKind::TimedOut,
            "connect timed out",
        ))),
    }
}

/// Write one encoded frame in full.
pub(crate) async fn send_frame(stream: &SharedStream, frame: &[u8]) -> Result<()> {
    let mut guard = stream.lock().await;
    let stream = guard.as_mut().ok_or(RconError::NotConnected)?;
    stream.write_all(frame).await.map_err(normalize_io)?;
    Ok(())
}

/// Read until one complete packet is available. No deadline; the reader
/// fiber relies on the termination signal to unblock.
pub(crate) async fn read_packet<R>(reader: &mut R, buffer: &mut PacketBuffer) -> Result<Packet>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(packet) = buffer.try_extract()? {
            return Ok(packet);
        }

        let mut chunk = [0u8; READ_CHUNK_LEN];
        let read = reader.read(&mut chunk).await.map_err(normalize_io)?;

        if read == 0 {
            if buffer.is_empty() {
                return Err(RconError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
            }
            // EOF mid-frame. Drop the partial data so the next read reports
            // a plain EOF instead of truncation forever.
            buffer.clear();
            return Err(RconError::Truncated);
        }

        buffer.extend(&chunk[..read]);
    }
}

/// Deadlined variant of [`read_packet`], used for the authentication
/// response. A deadline expiry surfaces as a fresh `Authentication` error.
pub(crate) async fn read_packet_timeout<R>(
    reader: &mut R,
    buffer: &mut PacketBuffer,
    deadline: Duration,
) -> Result<Packet>
where
    R: AsyncRead + Unpin,
{
    match timeout(deadline, read_packet(reader, buffer)).await {
        Ok(result) => result,
        Err(_) => Err(RconError::Authentication),
    }
}

/// Fold errors from a locally closed socket into `NotConnected`.
pub(crate) fn normalize_io(err: io::Error) -> RconError {
    if err.kind() == io::ErrorKind::NotConnected {
        RconError::NotConnected
    } else {
        RconError::Io(err)
    }
}

/// Errors that mean the peer is gone and the session must disconnect.
pub(crate) fn is_connection_fatal(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}
