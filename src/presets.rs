//! Game-specific policy presets.
//!
//! The core imposes no opinion about which broadcast channels exist; these
//! are the known tables for games that extend RCON with server-originated
//! messages.

use crate::protocol::Packet;

/// Packet IDs Mordhau reserves for its broadcast channels.
///
/// Channels observed so far: 54321 match state, 54324 score feed, 54325
/// chat, 54326 login, 54330 punishment. The gaps in between are included
/// in case the server grows channels there.
pub const MORDHAU_RESTRICTED_IDS: [i32; 10] = [
    54321, 54322, 54323, 54324, 54325, 54326, 54327, 54328, 54329, 54330,
];

/// Classifies any inbound packet carrying a Mordhau broadcast-channel ID as
/// a broadcast.
pub fn mordhau_broadcast_checker(packet: &Packet) -> bool {
    MORDHAU_RESTRICTED_IDS.contains(&packet.id())
}
