//! Connection state and connectable device descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical transport used by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// TCP socket to the remote server.
    Tcp,
    /// Bluetooth classic RFCOMM socket to the remote server.
    Rfcomm,
    /// BLE GATT link to a HID receiver.
    Ble,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Rfcomm => "rfcomm",
            TransportKind::Ble => "ble",
        };
        f.write_str(name)
    }
}

/// Details of an established session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub transport: TransportKind,
    /// `host:port` for TCP, the Bluetooth address otherwise.
    pub address: String,
    /// Free-form detail for display, e.g. receiver firmware.
    pub detail: Option<String>,
}

/// Public state of one logical connection.
///
/// Owned by exactly one manager and published read-only to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(SessionInfo),
    /// Waiting before reconnect attempt `attempt` of `max`.
    Reconnecting { attempt: u32, max: u32 },
    /// Terminal failure; a manual connect is required to leave this state.
    Error(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    /// Returns the session info when connected.
    pub fn session(&self) -> Option<&SessionInfo> {
        match self {
            ConnectionState::Connected(info) => Some(info),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected(info) => {
                write!(f, "connected via {} to {}", info.transport, info.address)
            }
            ConnectionState::Reconnecting { attempt, max } => {
                write!(f, "reconnecting ({attempt}/{max})")
            }
            ConnectionState::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// A device the history store can offer for reconnecting later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable identifier; the address is used when nothing better is known.
    pub id: String,
    pub transport: TransportKind,
    pub address: String,
}

impl DeviceDescriptor {
    pub fn new(transport: TransportKind, address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            id: format!("{transport}:{address}"),
            transport,
            address,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_session_is_only_available_when_connected() {
        // Arrange
        let info = SessionInfo {
            transport: TransportKind::Tcp,
            address: "100.64.1.2:9512".into(),
            detail: None,
        };

        // Act
        let connected = ConnectionState::Connected(info.clone());

        // Assert
        assert!(connected.is_connected());
        assert_eq!(connected.session(), Some(&info));
        assert_eq!(ConnectionState::Connecting.session(), None);
    }

    #[test]
    fn test_display_for_reconnecting() {
        let state = ConnectionState::Reconnecting { attempt: 2, max: 5 };
        assert_eq!(state.to_string(), "reconnecting (2/5)");
    }

    #[test]
    fn test_descriptor_id_combines_transport_and_address() {
        let d = DeviceDescriptor::new(TransportKind::Ble, "AA:BB:CC:DD:EE:FF");
        assert_eq!(d.id, "ble:AA:BB:CC:DD:EE:FF");
        assert_eq!(d.transport, TransportKind::Ble);
    }
}
