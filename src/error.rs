//! Error types for srcon.

use thiserror::Error;

/// Main error type for all RCON operations.
#[derive(Debug, Error)]
pub enum RconError {
    /// TCP-level failure to reach the endpoint (refused, unroutable, or
    /// dial timeout).
    #[error("tcp dial failure: {0}")]
    Dial(#[source] std::io::Error),

    /// The server rejected the password, answered with something other
    /// than an auth response, or never answered within the deadline.
    #[error("authentication failed")]
    Authentication,

    /// The session socket is gone; operating against a closed or
    /// never-opened connection.
    #[error("not connected")]
    NotConnected,

    /// Outbound packet would exceed the wire format's frame limit.
    #[error("packet of {size} bytes exceeds the maximum frame size")]
    FrameTooLarge { size: usize },

    /// The peer closed the stream in the middle of a frame.
    #[error("truncated packet")]
    Truncated,

    /// An inbound frame announced a body shorter than the wire format allows.
    #[error("empty packet body received")]
    EmptyBody,

    /// A packet could not be handed to the writer within the queue-write
    /// timeout.
    #[error("packet queue operation timed out")]
    QueueTimeout,

    /// No response arrived in the mailbox within the queue-read timeout.
    #[error("mailbox read operation timed out")]
    ReadTimeout,

    /// Every allocatable packet ID is in the restricted set.
    #[error("packet id space exhausted by restricted ids")]
    IdExhaustion,

    /// Any other transport error, with its original kind preserved.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using RconError.
pub type Result<T> = std::result::Result<T, RconError>;
