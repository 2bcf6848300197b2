//! Application layer for the remote-input client.
//!
//! # What lives here?
//!
//! - **`remote_control`** – the facade a UI talks to.  [`RemoteInput`] covers
//!   mouse and keyboard actions and has two implementations: [`TcpRemote`]
//!   turns each call into a Run packet for the desktop server, while
//!   [`BleRemote`] turns it into HID reports for the BLE receiver.
//!   [`GamepadInput`] is only available on BLE.
//!
//! The UI does not need to know which transport is in use; it holds an
//! `Arc<dyn RemoteInput>` and calls it.

pub mod remote_control;

pub use remote_control::{BleRemote, ControlError, GamepadInput, RemoteInput, TcpRemote};
