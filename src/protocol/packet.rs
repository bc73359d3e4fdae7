//! RCON packet value and wire encoding.
//!
//! One packet is laid out on the wire as:
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬────────────┬──────┬──────┐
//! │ size     │ id       │ type     │ body       │ 0x00 │ 0x00 │
//! │ int32    │ int32    │ int32    │ size-10 B  │      │      │
//! └──────────┴──────────┴──────────┴────────────┴──────┴──────┘
//! ```
//!
//! `size` counts everything after itself: 8 bytes of id/type, the body, and
//! the two trailing null bytes. All integers use the session's byte order.

use bytes::{BufMut, Bytes, BytesMut};

use super::endian::Endianness;
use crate::error::{RconError, Result};

/// Largest size a packet may announce on the wire. Outbound packets at or
/// above this limit fail to build.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Reserved ID the server answers with when authentication fails.
pub const AUTH_FAILED_ID: i32 = -1;

/// Bytes of `size`/`id`/`type` at the front of a frame.
pub(crate) const HEADER_LEN: usize = 12;

/// Bytes of id + type counted by the `size` field.
pub(crate) const SIZE_FIELD_OVERHEAD: usize = 8;

const PAD_LEN: usize = 2;

/// The 32-bit type tag of a packet.
///
/// `AUTH_RESPONSE` and `COMMAND` share the value 2; inbound and outbound
/// direction disambiguates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(pub i32);

impl PacketType {
    /// Authentication request, client to server.
    pub const AUTH: PacketType = PacketType(3);
    /// Authentication response, server to client.
    pub const AUTH_RESPONSE: PacketType = PacketType(2);
    /// Command request, client to server.
    pub const COMMAND: PacketType = PacketType(2);
    /// Command response, server to client.
    pub const COMMAND_RESPONSE: PacketType = PacketType(0);

    /// The raw wire value.
    #[inline]
    pub fn value(self) -> i32 {
        self.0
    }
}

/// An immutable RCON packet.
///
/// The in-memory `body` never carries the wire padding; trailing null and
/// newline bytes are stripped on decode and re-appended on encode. The
/// endianness tag is carried so a decoded packet re-encodes byte-identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    packet_type: PacketType,
    body: Bytes,
    endianness: Endianness,
}

impl Packet {
    /// Create a packet from an owned body.
    pub fn new(endianness: Endianness, packet_type: PacketType, id: i32, body: Bytes) -> Self {
        Self {
            id,
            packet_type,
            body,
            endianness,
        }
    }

    /// Create a packet, copying the body out of a slice.
    pub fn from_parts(
        endianness: Endianness,
        packet_type: PacketType,
        id: i32,
        body: &[u8],
    ) -> Self {
        Self::new(endianness, packet_type, id, Bytes::copy_from_slice(body))
    }

    /// The packet ID used to correlate responses to requests.
    #[inline]
    pub fn id(&self) -> i32 {
        self.id
    }

    /// The type tag.
    #[inline]
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// The body without wire padding.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// A cheap clone of the body.
    #[inline]
    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// The byte order this packet encodes with.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// The value of the wire `size` field: 8 + body length + 2.
    #[inline]
    pub fn size(&self) -> i32 {
        (SIZE_FIELD_OVERHEAD + self.body.len() + PAD_LEN) as i32
    }

    /// Serialize the packet for the wire.
    ///
    /// Fails with [`RconError::FrameTooLarge`] when the announced size would
    /// reach [`MAX_PACKET_SIZE`].
    pub fn encode(&self) -> Result<Bytes> {
        let size = self.size() as usize;
        if size >= MAX_PACKET_SIZE {
            return Err(RconError::FrameTooLarge {
                size: HEADER_LEN + self.body.len() + PAD_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.body.len() + PAD_LEN);
        self.endianness.put_i32(&mut buf, self.size());
        self.endianness.put_i32(&mut buf, self.id);
        self.endianness.put_i32(&mut buf, self.packet_type.value());
        buf.put_slice(&self.body);
        buf.put_u8(0);
        buf.put_u8(0);

        Ok(buf.freeze())
    }
}
