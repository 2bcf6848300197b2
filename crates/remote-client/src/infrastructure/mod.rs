//! Infrastructure layer for the remote-input client.
//!
//! Contains everything that touches I/O: sockets, the BLE adapter port,
//! configuration files, and the logging and history ports.
//!
//! **Dependency rule**: this layer may depend on `remote_core`, but MUST NOT
//! import from `application`.
//!
//! # Sub-modules
//!
//! - **`network`** – TCP and RFCOMM transports plus the `ConnectionManager`
//!   with heartbeat, ack watchdog and bounded reconnect.
//!
//! - **`ble`** – the BLE HID receiver path: scanning, the authentication
//!   handshake, the GATT write queue, mode switching and the `BleManager`.
//!
//! - **`config`** – TOML configuration with per-field defaults and conversion
//!   into the runtime configs of the managers.
//!
//! - **`logging`** – the `LogSink` port and `tracing` setup.
//!
//! - **`history`** – the `DeviceHistory` port for recently connected devices.

pub mod ble;
pub mod config;
pub mod history;
pub mod logging;
pub mod network;
