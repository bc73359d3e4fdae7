//! Client builder and session lifecycle.
//!
//! An [`RconClient`] owns one authenticated TCP session and its two fibers:
//! the reader, which decodes every inbound packet and routes it to a
//! response mailbox or the broadcast handler, and the writer, which drains
//! the send queue onto the socket. The lifecycle is strictly linear:
//!
//! ```text
//! Fresh → Dialing → Authenticating → Ready → Closing → Closed
//! ```
//!
//! A session is never reused after it closes; build a new client to
//! reconnect.
//!
//! # Example
//!
//! ```ignore
//! use srcon::{presets, RconClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> srcon::Result<()> {
//!     let client = RconClientBuilder::new("127.0.0.1", 27015, "password")
//!         .restricted_ids(presets::MORDHAU_RESTRICTED_IDS)
//!         .broadcast_checker(presets::mordhau_broadcast_checker)
//!         .broadcast_handler(|msg| println!("broadcast: {msg}"))
//!         .build();
//!
//!     client.connect().await?;
//!     println!("{}", client.exec_command("playerlist").await?);
//!
//!     client.close().await?;
//!     client.wait().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{RconError, Result};
use crate::mailbox::MailboxTable;
use crate::protocol::{
    Endianness, IdAllocator, Packet, PacketBuffer, PacketType, AUTH_FAILED_ID,
};
use crate::transport::{self, SharedStream};
use crate::writer;

/// Called with the body of every inbound packet the broadcast checker
/// classifies as a broadcast. May run concurrently with command responses.
pub type BroadcastHandler = Box<dyn Fn(String) + Send + Sync>;

/// Decides whether an inbound packet is a server broadcast rather than a
/// response to one of our requests.
pub type BroadcastChecker = Box<dyn Fn(&Packet) -> bool + Send + Sync>;

/// Called exactly once when the session ends, with the propagating error
/// and whether the disconnect was expected (user-initiated).
pub type DisconnectHandler = Box<dyn Fn(Option<RconError>, bool) + Send + Sync>;

/// Default connect timeout and queue-read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default bound on handing a packet to the writer or a mailbox.
pub const DEFAULT_QUEUE_WRITE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Fresh,
    Dialing,
    Authenticating,
    Ready,
    Closing,
    Closed,
}

struct Config {
    host: String,
    port: u16,
    password: String,
    endianness: Endianness,
    connect_timeout: Duration,
    queue_write_timeout: Duration,
    broadcast_checker: BroadcastChecker,
    broadcast_handler: Option<BroadcastHandler>,
    disconnect_handler: Option<DisconnectHandler>,
}

/// Builder for configuring and creating an [`RconClient`].
pub struct RconClientBuilder {
    host: String,
    port: u16,
    password: String,
    endianness: Endianness,
    connect_timeout: Duration,
    queue_write_timeout: Duration,
    queue_read_timeout: Duration,
    restricted_ids: Vec<i32>,
    broadcast_checker: BroadcastChecker,
    broadcast_handler: Option<BroadcastHandler>,
    disconnect_handler: Option<DisconnectHandler>,
}

impl RconClientBuilder {
    /// Start a builder for the given endpoint and password.
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            endianness: Endianness::default(),
            connect_timeout: DEFAULT_TIMEOUT,
            queue_write_timeout: DEFAULT_QUEUE_WRITE_TIMEOUT,
            queue_read_timeout: DEFAULT_TIMEOUT,
            restricted_ids: Vec::new(),
            broadcast_checker: Box::new(|_| false),
            broadcast_handler: None,
            disconnect_handler: None,
        }
    }

    /// Wire byte order. Valve games use little-endian; some others don't.
    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Timeout for the TCP dial and the authentication read.
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// How long producers wait to hand a packet to the writer, and how long
    /// the reader waits to deliver a response into a mailbox. Higher values
    /// can stall the reader when unexpected packets arrive.
    pub fn queue_write_timeout(mut self, queue_write_timeout: Duration) -> Self {
        self.queue_write_timeout = queue_write_timeout;
        self
    }

    /// How long a command caller waits for its response.
    pub fn queue_read_timeout(mut self, queue_read_timeout: Duration) -> Self {
        self.queue_read_timeout = queue_read_timeout;
        self
    }

    /// Packet IDs the server reserves for its own signalling. Outbound
    /// packets never use these.
    pub fn restricted_ids(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.restricted_ids = ids.into_iter().collect();
        self
    }

    /// Classifier deciding which inbound packets are broadcasts.
    pub fn broadcast_checker<F>(mut self, checker: F) -> Self
    where
        F: Fn(&Packet) -> bool + Send + Sync + 'static,
    {
        self.broadcast_checker = Box::new(checker);
        self
    }

    /// Receiver for broadcast message bodies.
    pub fn broadcast_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.broadcast_handler = Some(Box::new(handler));
        self
    }

    /// Receiver for the end-of-session notification.
    pub fn disconnect_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Option<RconError>, bool) + Send + Sync + 'static,
    {
        self.disconnect_handler = Some(Box::new(handler));
        self
    }

    /// Build the client. No I/O happens until [`RconClient::connect`].
    pub fn build(self) -> RconClient {
        let (send_queue, send_queue_rx) = mpsc::channel(1);
        let (terminate, _) = watch::channel(false);

        RconClient {
            shared: Arc::new(Shared {
                ids: IdAllocator::new(self.restricted_ids),
                mailboxes: MailboxTable::new(self.queue_write_timeout, self.queue_read_timeout),
                config: Config {
                    host: self.host,
                    port: self.port,
                    password: self.password,
                    endianness: self.endianness,
                    connect_timeout: self.connect_timeout,
                    queue_write_timeout: self.queue_write_timeout,
                    broadcast_checker: self.broadcast_checker,
                    broadcast_handler: self.broadcast_handler,
                    disconnect_handler: self.disconnect_handler,
                },
                state: Mutex::new(SessionState::Fresh),
                send_queue,
                send_queue_rx: Mutex::new(Some(send_queue_rx)),
                terminate,
                stream: Arc::new(Mutex::new(None)),
                fibers: Mutex::new(Vec::new()),
            }),
        }
    }
}

struct Shared {
    config: Config,
    ids: IdAllocator,
    mailboxes: MailboxTable,
    state: Mutex<SessionState>,
    send_queue: mpsc::Sender<Packet>,
    send_queue_rx: Mutex<Option<mpsc::Receiver<Packet>>>,
    terminate: watch::Sender<bool>,
    stream: SharedStream,
    fibers: Mutex<Vec<JoinHandle<()>>>,
}

/// One RCON session: connect, run commands, receive broadcasts, close.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct RconClient {
    shared: Arc<Shared>,
}

impl RconClient {
    /// Create a new client builder.
    pub fn builder(
        host: impl Into<String>,
        port: u16,
        password: impl Into<String>,
    ) -> RconClientBuilder {
        RconClientBuilder::new(host, port, password)
    }

    /// Dial the server, authenticate, and start the session fibers.
    ///
    /// Fails with [`RconError::Dial`] when the endpoint is unreachable and
    /// [`RconError::Authentication`] when the server rejects the password;
    /// a failed session never becomes ready.
    pub async fn connect(&self) -> Result<()> {
        let shared = &self.shared;

        {
            let mut state = shared.state.lock().await;
            if *state != SessionState::Fresh {
                return Err(RconError::NotConnected);
            }
            *state = SessionState::Dialing;
        }

        let stream = transport::dial(
            &shared.config.host,
            shared.config.port,
            shared.config.connect_timeout,
        )
        .await?;
        tracing::debug!("dial successful, connection established");

        let (mut read_half, write_half) = stream.into_split();
        *shared.stream.lock().await = Some(write_half);
        *shared.state.lock().await = SessionState::Authenticating;

        let mut buffer = PacketBuffer::new(shared.config.endianness);
        shared.authenticate(&mut read_half, &mut buffer).await?;

        let send_queue_rx = shared
            .send_queue_rx
            .lock()
            .await
            .take()
            .ok_or(RconError::NotConnected)?;

        let mut fibers = shared.fibers.lock().await;
        tracing::debug!("starting writer fiber");
        fibers.push(tokio::spawn(writer::write_loop(
            Arc::clone(&shared.stream),
            send_queue_rx,
            shared.terminate.subscribe(),
        )));
        tracing::debug!("starting reader fiber");
        fibers.push(tokio::spawn(read_loop(
            Arc::clone(shared),
            read_half,
            buffer,
            shared.terminate.subscribe(),
        )));
        drop(fibers);

        {
            // The reader may already have observed a dead peer; never move
            // a closing session back to ready.
            let mut state = shared.state.lock().await;
            if *state == SessionState::Authenticating {
                *state = SessionState::Ready;
            }
        }
        Ok(())
    }

    /// Run `command` and wait for its response body.
    pub async fn exec_command(&self, command: &str) -> Result<String> {
        let shared = &self.shared;
        shared.ensure_ready().await?;

        let packet = shared.new_packet(PacketType::COMMAND, command)?;
        let id = packet.id();
        tracing::debug!(id, command, "executing command");

        let mut mailbox = shared.mailboxes.create(id).await;
        let result = match shared.enqueue(packet).await {
            Ok(()) => shared.mailboxes.receive(&mut mailbox).await,
            Err(err) => Err(err),
        };
        shared.mailboxes.remove(id).await;

        let response = result?;
        Ok(String::from_utf8_lossy(response.body()).into_owned())
    }

    /// Run `command` without waiting for (or correlating) a response.
    pub async fn exec_command_no_response(&self, command: &str) -> Result<()> {
        let shared = &self.shared;
        shared.ensure_ready().await?;

        let packet = shared.new_packet(PacketType::COMMAND, command)?;
        tracing::debug!(id = packet.id(), command, "executing command (no response)");

        shared.enqueue(packet).await
    }

    /// Shut the session down and notify the disconnect handler with an
    /// expected disconnect. Returns [`RconError::NotConnected`] when the
    /// session was never opened or is already closed.
    pub async fn close(&self) -> Result<()> {
        tracing::debug!("close called");

        {
            let state = self.shared.state.lock().await;
            if !matches!(
                *state,
                SessionState::Authenticating | SessionState::Ready
            ) {
                return Err(RconError::NotConnected);
            }
        }

        if self.shared.disconnect(None).await {
            Ok(())
        } else {
            Err(RconError::NotConnected)
        }
    }

    /// Wait for both session fibers to drain and exit. Meaningful once per
    /// session; later calls return immediately.
    pub async fn wait(&self) {
        let fibers: Vec<JoinHandle<()>> = {
            let mut guard = self.shared.fibers.lock().await;
            guard.drain(..).collect()
        };
        for fiber in fibers {
            let _ = fiber.await;
        }
    }
}

impl Shared {
    fn new_packet(&self, packet_type: PacketType, body: &str) -> Result<Packet> {
        let id = self.ids.next()?;
        Ok(Packet::from_parts(
            self.config.endianness,
            packet_type,
            id,
            body.as_bytes(),
        ))
    }

    async fn ensure_ready(&self) -> Result<()> {
        match *self.state.lock().await {
            SessionState::Ready => Ok(()),
            _ => Err(RconError::NotConnected),
        }
    }

    /// Hand a packet to the writer fiber under the queue-write timeout.
    async fn enqueue(&self, packet: Packet) -> Result<()> {
        match self
            .send_queue
            .send_timeout(packet, self.config.queue_write_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(packet)) => {
                tracing::debug!(id = packet.id(), "packet queue timed out");
                Err(RconError::QueueTimeout)
            }
            Err(SendTimeoutError::Closed(_)) => Err(RconError::NotConnected),
        }
    }

    async fn authenticate(
        &self,
        read_half: &mut OwnedReadHalf,
        buffer: &mut PacketBuffer,
    ) -> Result<()> {
        let packet = self.new_packet(PacketType::AUTH, &self.config.password)?;
        let frame = packet.encode()?;
        transport::send_frame(&self.stream, &frame).await?;

        let response = transport::read_packet_timeout(
            read_half,
            buffer,
            self.config.connect_timeout,
        )
        .await?;

        if response.packet_type() != PacketType::AUTH_RESPONSE {
            return Err(RconError::Authentication);
        }
        if response.id() == AUTH_FAILED_ID {
            return Err(RconError::Authentication);
        }

        tracing::debug!("authenticated successfully");
        Ok(())
    }

    /// Tear the session down. Fires the termination signal, closes the
    /// socket, wakes pending mailboxes, and notifies the disconnect
    /// handler, in that order, at most once per session.
    ///
    /// Returns `false` when another fiber already started the teardown.
    async fn disconnect(&self, err: Option<RconError>) -> bool {
        {
            let mut state = self.state.lock().await;
            if matches!(*state, SessionState::Closing | SessionState::Closed) {
                return false;
            }
            *state = SessionState::Closing;
        }

        self.terminate.send_replace(true);

        if let Some(mut stream) = self.stream.lock().await.take() {
            use tokio::io::AsyncWriteExt;
            if let Err(err) = stream.shutdown().await {
                tracing::debug!(error = %err, "error shutting down socket");
            }
        }

        self.mailboxes.close_all().await;

        *self.state.lock().await = SessionState::Closed;

        if let Some(handler) = &self.config.disconnect_handler {
            let expected = err.is_none();
            handler(err, expected);
        }

        true
    }

    /// Route one decoded inbound packet.
    async fn dispatch(&self, packet: Packet) {
        let id = packet.id();

        if (self.config.broadcast_checker)(&packet) {
            tracing::debug!(id, "inbound packet classified as broadcast");
            if let Some(handler) = &self.config.broadcast_handler {
                handler(String::from_utf8_lossy(packet.body()).into_owned());
            }
            return;
        }

        if !self.mailboxes.deliver(packet).await {
            tracing::warn!(id, "unexpected packet dropped (no open mailbox)");
        }
    }
}

/// Reader fiber: decode every inbound packet and route it, until the
/// termination signal fires or the peer goes away.
async fn read_loop(
    shared: Arc<Shared>,
    mut read_half: OwnedReadHalf,
    mut buffer: PacketBuffer,
    mut terminate: watch::Receiver<bool>,
) {
    loop {
        let result = tokio::select! {
            result = transport::read_packet(&mut read_half, &mut buffer) => result,
            _ = terminate.changed() => {
                tracing::debug!("reader fiber received termination signal");
                break;
            }
        };

        match result {
            Ok(packet) => shared.dispatch(packet).await,
            // Shutdown is underway; the termination signal ends the loop.
            Err(RconError::NotConnected) => continue,
            Err(RconError::Io(err)) if transport::is_connection_fatal(&err) => {
                tracing::error!(error = %err, "disconnected by the server");
                shared.disconnect(Some(RconError::Io(err))).await;
                break;
            }
            Err(err) => {
                tracing::debug!(error = %err, "reader error");
                continue;
            }
        }
    }

    tracing::debug!("reader fiber terminated");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_before_connect_is_not_connected() {
        let client = RconClientBuilder::new("127.0.0.1", 1, "pw").build();
        let err = client.exec_command("status").await.unwrap_err();
        assert!(matches!(err, RconError::NotConnected));
    }

    #[tokio::test]
    async fn close_before_connect_is_not_connected() {
        let client = RconClientBuilder::new("127.0.0.1", 1, "pw").build();
        let err = client.close().await.unwrap_err();
        assert!(matches!(err, RconError::NotConnected));
    }

    #[tokio::test]
    async fn dial_failure_is_reported() {
        // Port 1 on loopback is almost certainly closed; a refused
        // connection and a timeout both surface as Dial.
        let client = RconClientBuilder::new("127.0.0.1", 1, "pw")
            .connect_timeout(Duration::from_millis(200))
            .build();
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, RconError::Dial(_)));
    }
}
