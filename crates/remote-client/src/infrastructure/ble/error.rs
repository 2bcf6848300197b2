//! Error types for the BLE path.

use std::time::Duration;

use remote_core::{DeviceMode, HidError};
use thiserror::Error;
use uuid::Uuid;

/// Failures reported by a platform [`BleAdapter`](super::adapter::BleAdapter).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("bluetooth permission denied")]
    PermissionDenied,
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("no GATT connection")]
    NotConnected,
    #[error("characteristic {0} is not available")]
    CharacteristicUnavailable(Uuid),
    #[error("GATT operation failed: {0}")]
    Gatt(String),
    #[error("adapter error: {0}")]
    Other(String),
}

/// Failures of the authentication handshake.  Never retried automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("device information characteristic {0} is missing or unreadable")]
    MissingDeviceInfo(Uuid),
    #[error("unsupported receiver software version {0:?}")]
    UnsupportedFirmware(String),
    #[error("receiver response does not match the expected challenge response")]
    Mismatch,
    #[error("GATT failure during authentication: {0}")]
    Ble(#[source] AdapterError),
}

/// Failures of a Composite ⇄ XInput switch.  The previous mode stays active.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModeSwitchError {
    #[error("receiver rejected the mode switch (status 0x{0:02X})")]
    Rejected(u8),
    #[error("no mode switch acknowledgement within {0:?}")]
    Timeout(Duration),
    #[error("GATT failure during mode switch: {0}")]
    Ble(#[source] AdapterError),
}

/// Errors returned by [`BleManager`](super::manager::BleManager).
#[derive(Debug, Error)]
pub enum BleError {
    #[error("no authenticated BLE session")]
    NotConnected,

    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("bluetooth permission denied")]
    PermissionDenied,

    #[error("operation requires {required} mode but the receiver is in {active} mode")]
    ModeMismatch {
        required: DeviceMode,
        active: DeviceMode,
    },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("mode switch failed: {0}")]
    ModeSwitch(#[from] ModeSwitchError),

    #[error("report error: {0}")]
    Hid(#[from] HidError),
}
