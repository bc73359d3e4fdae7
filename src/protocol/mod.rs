//! Protocol module - byte order, packet values, wire codec, and IDs.

mod endian;
mod id;
mod packet;
mod packet_buffer;

pub use endian::Endianness;
pub use packet::{Packet, PacketType, AUTH_FAILED_ID, MAX_PACKET_SIZE};
pub use packet_buffer::PacketBuffer;

pub(crate) use id::IdAllocator;
