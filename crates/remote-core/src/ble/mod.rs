//! BLE receiver model shared by the client's GATT layer.
//!
//! - [`gatt`]: service/characteristic UUIDs and command opcodes.
//! - [`session`]: per-connection device session (firmware, tier, mode, LEDs).
//! - [`auth`]: the AES challenge-response primitives.

pub mod auth;
pub mod gatt;
pub mod session;

pub use session::{BleDeviceSession, DeviceInfo, DeviceMode, DeviceTier};
