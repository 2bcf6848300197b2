//! Domain entities shared by every transport.
//!
//! This module contains plain data types with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! The innermost layer of the workspace describes *what* the client is talking
//! about, independent of *how* the bytes travel:
//!
//! - [`connection`]: the public connection state machine value that the UI
//!   observes, and the descriptor handed to the history store on connect.
//! - [`input`]: user-level input concepts such as mouse buttons.
//!
//! Code in outer layers (protocol, HID, the client crate) depends on these
//! types, but the domain never depends on them.

pub mod connection;
pub mod input;
