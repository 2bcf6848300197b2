//! # remote-core
//!
//! Shared library for the remote input client containing the wire codec,
//! frame transport, HID report builders, BLE receiver model, and the
//! connection-state domain types.
//!
//! This crate has no dependencies on platform Bluetooth stacks or UI
//! frameworks.  Sockets appear only as generic `AsyncRead`/`AsyncWrite`
//! streams handed in by the caller.
//!
//! # Architecture overview (for beginners)
//!
//! The client drives a computer's pointer and keyboard in two ways:
//!
//! 1. Over **TCP or Bluetooth RFCOMM** to a server program running on the
//!    computer.  The server understands named *actions* (`MoveBy`, `Stroke`,
//!    `Text`…) carried in a compact tag-based binary format.
//! 2. Over **BLE** to a small USB dongle (the *receiver*) plugged into the
//!    computer.  The receiver emulates a USB keyboard, mouse, or gamepad and
//!    forwards raw HID reports that we build byte for byte.
//!
//! This crate defines:
//!
//! - **`protocol`** – How packets become bytes for path 1: the TLV codec, the
//!   length-prefixed frame, and builders for the server's input actions.
//!
//! - **`hid`** – Fixed-layout report builders for path 2, plus key tables and
//!   text-to-keystroke planning.
//!
//! - **`ble`** – The receiver's GATT identifiers, the per-connection device
//!   session, and the AES challenge-response used to authenticate it.
//!
//! - **`domain`** – Transport-neutral types such as the connection state that
//!   the UI observes.

pub mod ble;
pub mod domain;
pub mod hid;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `remote_core::Packet` instead of `remote_core::protocol::packet::Packet`.
pub use ble::{BleDeviceSession, DeviceInfo, DeviceMode, DeviceTier};
pub use domain::connection::{ConnectionState, DeviceDescriptor, SessionInfo, TransportKind};
pub use domain::input::MouseButton;
pub use hid::{HidError, HidKeyCode, LedState};
pub use protocol::codec::{decode_packet, encode_packet, ProtocolError};
pub use protocol::frame::TransportError;
pub use protocol::packet::{Action, Packet};
