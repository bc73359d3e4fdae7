//! Per-request response mailboxes.
//!
//! Every in-flight command owns one mailbox keyed by its packet ID. The
//! reader fiber delivers responses into mailboxes; the calling fiber waits
//! on its own. A mailbox is a single-slot channel: created before the
//! request is enqueued, removed by the caller after receive-or-timeout.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::error::{RconError, Result};
use crate::protocol::Packet;

pub(crate) struct MailboxTable {
    slots: Mutex<HashMap<i32, mpsc::Sender<Packet>>>,
    queue_write_timeout: Duration,
    queue_read_timeout: Duration,
}

impl MailboxTable {
    pub(crate) fn new(queue_write_timeout: Duration, queue_read_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            queue_write_timeout,
            queue_read_timeout,
        }
    }

    /// Insert a mailbox for `id` and hand its receiving end to the caller.
    /// At most one mailbox may exist per ID.
    pub(crate) async fn create(&self, id: i32) -> mpsc::Receiver<Packet> {
        let (tx, rx) = mpsc::channel(1);
        let previous = self.slots.lock().await.insert(id, tx);
        debug_assert!(previous.is_none(), "duplicate mailbox for id {id}");
        rx
    }

    /// Attempt to hand `packet` to the mailbox matching its ID.
    ///
    /// Returns `false` when no mailbox exists or the slot did not free up
    /// within the queue-write timeout; the packet is dropped either way.
    pub(crate) async fn deliver(&self, packet: Packet) -> bool {
        let sender = { self.slots.lock().await.get(&packet.id()).cloned() };
        let Some(sender) = sender else {
            return false;
        };
        sender
            .send_timeout(packet, self.queue_write_timeout)
            .await
            .is_ok()
    }

    /// Wait for a response in `mailbox` under the queue-read timeout.
    ///
    /// A closed mailbox means the session shut down underneath the caller.
    pub(crate) async fn receive(&self, mailbox: &mut mpsc::Receiver<Packet>) -> Result<Packet> {
        match timeout(self.queue_read_timeout, mailbox.recv()).await {
            Ok(Some(packet)) => Ok(packet),
            Ok(None) => Err(RconError::NotConnected),
            Err(_) => Err(RconError::ReadTimeout),
        }
    }

    /// Delete the mailbox for `id`. Called exactly once per `create`, by
    /// the same caller, whatever the receive outcome was.
    pub(crate) async fn remove(&self, id: i32) {
        self.slots.lock().await.remove(&id);
    }

    /// Drop every mailbox so pending receivers observe the shutdown
    /// immediately instead of waiting out their read timeout.
    pub(crate) async fn close_all(&self) {
        self.slots.lock().await.clear();
    }
}
