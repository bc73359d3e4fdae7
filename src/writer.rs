//! Writer fiber.
//!
//! Drains the send queue one packet at a time onto the transport. The queue
//! is unbuffered, so producers block (bounded by the queue-write timeout)
//! until the writer picks their packet up; that back-pressures callers
//! instead of growing an unbounded outbox.
//!
//! Write failures are logged and do not terminate the session. If the
//! socket is really gone the reader observes it and drives the disconnect.

use tokio::sync::{mpsc, watch};

use crate::protocol::Packet;
use crate::transport::{self, SharedStream};

pub(crate) async fn write_loop(
    stream: SharedStream,
    mut queue: mpsc::Receiver<Packet>,
    mut terminate: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            packet = queue.recv() => {
                let Some(packet) = packet else { break };
                if let Err(err) = send(&stream, &packet).await {
                    tracing::debug!(id = packet.id(), error = %err, "could not write packet");
                }
            }
            _ = terminate.changed() => {
                tracing::debug!("writer fiber received termination signal");
                break;
            }
        }
    }

    tracing::debug!("writer fiber terminated");
}

async fn send(stream: &SharedStream, packet: &Packet) -> crate::Result<()> {
    let frame = packet.encode()?;
    transport::send_frame(stream, &frame).await
}
