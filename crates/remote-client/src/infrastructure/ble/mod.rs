//! BLE HID receiver path.
//!
//! - [`adapter`]: the platform port ([`BleAdapter`]) and its [`BleEvent`]s.
//! - [`scanner`]: two-phase discovery and the diagnostic scan.
//! - [`handshake`]: Device Information read and AES challenge.
//! - [`write_queue`]: one outstanding GATT write per characteristic.
//! - [`mode`]: Composite ⇄ XInput switching.
//! - [`manager`]: [`BleManager`], which ties the above together.

pub mod adapter;
pub mod error;
pub mod handshake;
pub mod manager;
pub mod mode;
pub mod scanner;
pub mod write_queue;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{Advertisement, BleAdapter, BleEvent, ScanFilter, ScanMode};
pub use error::{AdapterError, AuthError, BleError, ModeSwitchError};
pub use manager::{BleConfig, BleManager};
pub use scanner::{ScanConfig, ScanDiagnosis};
