//! HID report construction for the BLE receiver.
//!
//! # How does the receiver turn bytes into input? (for beginners)
//!
//! The BLE receiver is plugged into the target computer's USB port and
//! pretends to be an ordinary USB keyboard, mouse, or Xbox 360 controller.
//! Each GATT write we send is forwarded verbatim as a USB HID *report*: a
//! fixed-layout byte array whose meaning is set by the receiver's HID
//! descriptor.  This module builds those arrays.
//!
//! - [`keycodes`]: USB usage IDs for keys plus the US-layout character table.
//! - [`report`]: mouse, keyboard, and gamepad report builders.
//! - [`text`]: turns a string into a sequence of keyboard reports, falling
//!   back to Alt codes for characters a US layout cannot type.
//! - [`led`]: the NumLock/CapsLock/ScrollLock state reported by the host.

pub mod keycodes;
pub mod led;
pub mod report;
pub mod text;

pub use keycodes::HidKeyCode;
pub use led::LedState;
pub use report::{Dpad, GamepadButton, GamepadState, HidError, KeyboardState};
pub use text::TextPlan;
