//! Network infrastructure for the TCP and RFCOMM paths.
//!
//! Architecture:
//! - [`transport`] opens byte streams and wraps them as framed links.
//! - [`connection_manager::ConnectionManager`] owns one link at a time, sends
//!   heartbeats, watches for their acknowledgement, and reconnects with
//!   backoff when the link is lost.
//! - Inbound packets other than heartbeats are forwarded on an `mpsc` channel.
//! - Outbound packets are serialized through a mutex around the single writer.

use std::time::Duration;

use remote_core::protocol::frame::DEFAULT_MAX_FRAME_LEN;

pub mod connection_manager;
pub mod transport;

pub use connection_manager::ConnectionManager;
pub use transport::{
    Connector, Endpoint, EndpointConnector, FrameReader, FrameWriter, FramedLink,
    RfcommConnector, RfcommSocketFactory, TcpConnector,
};

/// Shortest heartbeat interval and ack window the manager will run with.
pub const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// Tuning for [`ConnectionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Sent as `Source` on every action packet.
    pub client_id: String,
    /// Sent as `Destination` on every action packet when set.
    pub destination: Option<String>,
    /// Upper bound for opening the transport.
    pub connect_timeout: Duration,
    /// Interval between heartbeats; the first one goes out immediately.
    pub heartbeat_interval: Duration,
    /// How long after a heartbeat some inbound frame must arrive.
    pub ack_timeout: Duration,
    /// Delay before each reconnect attempt; the last entry repeats.
    pub reconnect_delays: Vec<Duration>,
    /// Failed reconnect attempts tolerated before giving up.
    pub max_reconnect_attempts: u32,
    /// Largest inbound frame accepted.
    pub max_frame_len: usize,
}

impl ConnectionConfig {
    /// Heartbeat interval, never shorter than [`MIN_TIMER_PERIOD`].
    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_interval.max(MIN_TIMER_PERIOD)
    }

    /// Ack window, never shorter than [`MIN_TIMER_PERIOD`].
    pub fn ack_window(&self) -> Duration {
        self.ack_timeout.max(MIN_TIMER_PERIOD)
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) as usize - 1).min(self.reconnect_delays.len().saturating_sub(1));
        self.reconnect_delays
            .get(index)
            .copied()
            .unwrap_or(Duration::from_secs(1))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            client_id: "remote-client".to_string(),
            destination: None,
            connect_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(3),
            reconnect_delays: [500, 1_000, 2_000, 4_000, 8_000]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            max_reconnect_attempts: 5,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
