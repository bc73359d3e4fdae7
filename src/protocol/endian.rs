//! Wire byte-order selection.
//!
//! Valve games serialize RCON packets little-endian; a few third-party
//! servers speak the same framing big-endian. The mode is fixed per session
//! at construction time.

use bytes::{Buf, BufMut};

/// Byte order used for every integer field of a session's packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Little-endian, the Source RCON default.
    #[default]
    Little,
    /// Big-endian, for servers that deviate from Valve's layout.
    Big,
}

impl Endianness {
    /// Append a signed 32-bit integer in this byte order.
    #[inline]
    pub fn put_i32<B: BufMut>(self, buf: &mut B, value: i32) {
        match self {
            Endianness::Little => buf.put_i32_le(value),
            Endianness::Big => buf.put_i32(value),
        }
    }

    /// Consume a signed 32-bit integer in this byte order.
    #[inline]
    pub fn get_i32<B: Buf>(self, buf: &mut B) -> i32 {
        match self {
            Endianness::Little => buf.get_i32_le(),
            Endianness::Big => buf.get_i32(),
        }
    }
}
