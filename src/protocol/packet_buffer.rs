//! Incremental packet decoder.
//!
//! Accumulates raw socket bytes and extracts complete packets as they become
//! available. A state machine handles fragmented reads:
//! - `WaitingForHeader`: need the 12 size/id/type bytes
//! - `WaitingForBody`: header parsed, need `size - 8` more bytes
//!
//! Decoded bodies are trimmed of trailing null bytes and then of trailing
//! newlines before they are handed up.

use bytes::{Buf, BytesMut};

use super::endian::Endianness;
use super::packet::{Packet, PacketType, HEADER_LEN, SIZE_FIELD_OVERHEAD};
use crate::error::{RconError, Result};

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForHeader,
    WaitingForBody {
        id: i32,
        packet_type: PacketType,
        remaining: usize,
    },
}

/// Buffer for accumulating inbound bytes and extracting complete packets.
pub struct PacketBuffer {
    buffer: BytesMut,
    state: State,
    endianness: Endianness,
}

impl PacketBuffer {
    /// Create an empty buffer decoding in the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            state: State::WaitingForHeader,
            endianness,
        }
    }

    /// Append raw bytes from a socket read.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single packet from the buffered bytes.
    ///
    /// Returns `Ok(None)` when more data is needed. A frame announcing a
    /// size below 8 fails with [`RconError::EmptyBody`]; framing cannot be
    /// recovered after that, so the buffer resets itself.
    pub fn try_extract(&mut self) -> Result<Option<Packet>> {
        match self.state {
            State::WaitingForHeader => {
                if self.buffer.len() < HEADER_LEN {
                    return Ok(None);
                }

                let mut header = &self.buffer[..HEADER_LEN];
                let size = self.endianness.get_i32(&mut header);
                let id = self.endianness.get_i32(&mut header);
                let packet_type = PacketType(self.endianness.get_i32(&mut header));

                let body_len = size as i64 - SIZE_FIELD_OVERHEAD as i64;
                if body_len < 0 {
                    self.clear();
                    return Err(RconError::EmptyBody);
                }

                self.buffer.advance(HEADER_LEN);
                self.state = State::WaitingForBody {
                    id,
                    packet_type,
                    remaining: body_len as usize,
                };

                self.try_extract()
            }

            State::WaitingForBody {
                id,
                packet_type,
                remaining,
            } => {
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let mut body = self.buffer.split_to(remaining);
                trim_trailing(&mut body, 0x00);
                trim_trailing(&mut body, b'\n');

                self.state = State::WaitingForHeader;

                Ok(Some(Packet::new(
                    self.endianness,
                    packet_type,
                    id,
                    body.freeze(),
                )))
            }
        }
    }

    /// True when no bytes are buffered and no frame is in progress.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && matches!(self.state, State::WaitingForHeader)
    }

    /// Drop buffered bytes and reset to the header state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }
}

fn trim_trailing(buf: &mut BytesMut, byte: u8) {
    while buf.last() == Some(&byte) {
        buf.truncate(buf.len() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(packet_type: PacketType, id: i32, body: &[u8]) -> Vec<u8> {
        Packet::from_parts(Endianness::Little, packet_type, id, body)
            .encode()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn single_complete_packet() {
        let mut buffer = PacketBuffer::new(Endianness::Little);
        buffer.extend(&frame(PacketType::COMMAND_RESPONSE, 1, b"Hello, world!"));

        let packet = buffer.try_extract().unwrap().unwrap();
        assert_eq!(packet.id(), 1);
        assert_eq!(packet.packet_type(), PacketType::COMMAND_RESPONSE);
        assert_eq!(packet.body(), b"Hello, world!");
        assert!(buffer.is_empty());
    }

    #[test]
    fn fragmented_header_then_body() {
        let bytes = frame(PacketType::COMMAND_RESPONSE, 42, b"fragmented");
        let mut buffer = PacketBuffer::new(Endianness::Little);

        buffer.extend(&bytes[..5]);
        assert!(buffer.try_extract().unwrap().is_none());
        assert!(!buffer.is_empty());

        buffer.extend(&bytes[5..HEADER_LEN + 3]);
        assert!(buffer.try_extract().unwrap().is_none());

        buffer.extend(&bytes[HEADER_LEN + 3..]);
        let packet = buffer.try_extract().unwrap().unwrap();
        assert_eq!(packet.id(), 42);
        assert_eq!(packet.body(), b"fragmented");
    }

    #[test]
    fn byte_at_a_time() {
        let bytes = frame(PacketType::COMMAND_RESPONSE, 7, b"hi");
        let mut buffer = PacketBuffer::new(Endianness::Little);
        let mut extracted = Vec::new();

        for byte in &bytes {
            buffer.extend(&[*byte]);
            if let Some(packet) = buffer.try_extract().unwrap() {
                extracted.push(packet);
            }
        }

        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].body(), b"hi");
    }

    #[test]
    fn multiple_packets_in_one_extend() {
        let mut bytes = frame(PacketType::COMMAND_RESPONSE, 1, b"first");
        bytes.extend(frame(PacketType::COMMAND_RESPONSE, 2, b"second"));

        let mut buffer = PacketBuffer::new(Endianness::Little);
        buffer.extend(&bytes);

        let first = buffer.try_extract().unwrap().unwrap();
        let second = buffer.try_extract().unwrap().unwrap();
        assert_eq!(first.id(), 1);
        assert_eq!(second.id(), 2);
        assert!(buffer.try_extract().unwrap().is_none());
    }

    #[test]
    fn round_trip_preserves_packet() {
        let original = Packet::from_parts(Endianness::Big, PacketType::COMMAND, 9, b"status");
        let mut buffer = PacketBuffer::new(Endianness::Big);
        buffer.extend(&original.encode().unwrap());

        let decoded = buffer.try_extract().unwrap().unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn trailing_nulls_and_newlines_are_trimmed() {
        // Hand-build a frame whose body ends in newlines before the padding.
        let body = b"line output\n\n";
        let mut bytes = Vec::new();
        let mode = Endianness::Little;
        let mut buf = BytesMut::new();
        mode.put_i32(&mut buf, (8 + body.len() + 2) as i32);
        mode.put_i32(&mut buf, 5);
        mode.put_i32(&mut buf, PacketType::COMMAND_RESPONSE.value());
        bytes.extend_from_slice(&buf);
        bytes.extend_from_slice(body);
        bytes.extend_from_slice(&[0x00, 0x00]);

        let mut buffer = PacketBuffer::new(mode);
        buffer.extend(&bytes);
        let packet = buffer.try_extract().unwrap().unwrap();
        assert_eq!(packet.body(), b"line output");
    }

    #[test]
    fn zero_length_body_is_tolerated() {
        // size = 8 announces no body at all, not even padding.
        let mut bytes = BytesMut::new();
        let mode = Endianness::Little;
        mode.put_i32(&mut bytes, 8);
        mode.put_i32(&mut bytes, 3);
        mode.put_i32(&mut bytes, PacketType::COMMAND_RESPONSE.value());

        let mut buffer = PacketBuffer::new(mode);
        buffer.extend(&bytes);
        let packet = buffer.try_extract().unwrap().unwrap();
        assert!(packet.body().is_empty());
    }

    #[test]
    fn negative_body_length_is_rejected() {
        let mut bytes = BytesMut::new();
        let mode = Endianness::Little;
        mode.put_i32(&mut bytes, 3);
        mode.put_i32(&mut bytes, 1);
        mode.put_i32(&mut bytes, 0);

        let mut buffer = PacketBuffer::new(mode);
        buffer.extend(&bytes);
        assert!(matches!(buffer.try_extract(), Err(RconError::EmptyBody)));
        // The buffer resets so the session can tear down cleanly.
        assert!(buffer.is_empty());
    }
}
