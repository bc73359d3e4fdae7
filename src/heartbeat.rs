//! Keep-alive helper.
//!
//! Some game servers drop RCON connections that stay silent. This helper
//! periodically enqueues a no-op command through the public API; it is not
//! part of the session core and the client works fine without it.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::client::RconClient;
use crate::error::RconError;

/// A running keep-alive fiber for one client.
pub struct Heartbeat {
    fiber: JoinHandle<()>,
}

impl Heartbeat {
    /// Send `command` every `period`, without waiting for responses.
    ///
    /// The fiber stops on its own once the client reports it is no longer
    /// connected.
    pub fn start(client: RconClient, period: Duration, command: impl Into<String>) -> Self {
        let command = command.into();
        let fiber = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so the heartbeat
            // starts one full period after the session does.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match client.exec_command_no_response(&command).await {
                    Ok(()) => {}
                    Err(RconError::NotConnected) => {
                        tracing::debug!("heartbeat stopping, client disconnected");
                        break;
                    }
                    Err(err) => tracing::debug!(error = %err, "heartbeat command failed"),
                }
            }
        });

        Self { fiber }
    }

    /// Stop the keep-alive fiber.
    pub fn stop(self) {
        self.fiber.abort();
    }
}
