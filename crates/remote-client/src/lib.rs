//! remote-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does remote-client do? (for beginners)
//!
//! It turns a phone (or any host) into a remote keyboard, mouse and gamepad
//! for another computer.  Two very different targets are supported:
//!
//! 1. **A desktop server** reached over TCP or Bluetooth RFCOMM.  Input is
//!    sent as small Run packets ("move the mouse by 10, 4") in a tag-based
//!    binary encoding.  The `ConnectionManager` keeps the link alive with
//!    heartbeats and reconnects on its own when it drops.
//! 2. **A BLE HID receiver dongle** plugged into the target computer.  The
//!    dongle appears to that computer as a real USB keyboard, mouse or Xbox
//!    gamepad; we feed it raw HID reports over GATT after an AES challenge.
//!    The `BleManager` owns that path.
//!
//! A UI drives either target through the same `RemoteInput` facade.

/// Application layer: the UI-facing input facade.
pub mod application;

/// Infrastructure layer: transports, BLE, config, logging and history ports.
pub mod infrastructure;
