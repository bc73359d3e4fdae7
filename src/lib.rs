//! # srcon
//!
//! Async client for the Source RCON wire protocol, with support for the
//! unsolicited "broadcast" packets some games layer on top of it.
//!
//! One [`RconClient`] owns one authenticated TCP session. Commands are
//! correlated to their responses by packet ID, so several callers can run
//! commands concurrently; inbound packets an injected checker classifies as
//! broadcasts are routed to a broadcast handler instead. When the session
//! ends, whether by [`RconClient::close`] or because the server went away,
//! a disconnect handler fires exactly once. The client never reconnects by
//! itself.
//!
//! ## Example
//!
//! ```ignore
//! use srcon::{presets, RconClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> srcon::Result<()> {
//!     let client = RconClientBuilder::new("127.0.0.1", 7779, "RconPassword")
//!         .restricted_ids(presets::MORDHAU_RESTRICTED_IDS)
//!         .broadcast_checker(presets::mordhau_broadcast_checker)
//!         .broadcast_handler(|msg| println!("broadcast: {msg}"))
//!         .disconnect_handler(|err, expected| {
//!             if !expected {
//!                 eprintln!("unexpected disconnect: {err:?}");
//!             }
//!         })
//!         .build();
//!
//!     client.connect().await?;
//!     let res = client.exec_command("listen chat").await?;
//!     println!("{res}");
//!
//!     client.close().await?;
//!     client.wait().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod presets;
pub mod protocol;

mod client;
mod heartbeat;
mod mailbox;
mod transport;
mod writer;

pub use client::{
    BroadcastChecker, BroadcastHandler, DisconnectHandler, RconClient, RconClientBuilder,
    DEFAULT_QUEUE_WRITE_TIMEOUT, DEFAULT_TIMEOUT,
};
pub use error::{RconError, Result};
pub use heartbeat::Heartbeat;
pub use protocol::{Endianness, Packet, PacketType};
