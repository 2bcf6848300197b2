//! Wire protocol shared by the TCP and RFCOMM transports.
//!
//! - [`codec`]: tag-based binary encoding of packets.
//! - [`packet`]: the typed packet model.
//! - [`frame`]: length-prefixed framing over async byte streams.
//! - [`commands`]: builders for the server's input actions.

pub mod codec;
pub mod commands;
pub mod frame;
pub mod packet;

pub use codec::{decode_packet, encode_packet, ProtocolError};
pub use frame::{read_frame, write_frame, TransportError};
pub use packet::{Action, ExtraValue, Extras, Packet};
