//! ConnectionManager: owns the TCP/RFCOMM link, its heartbeat, and reconnects.
//!
//! # State machine (for beginners)
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──ok──► Connected ──loss──► Reconnecting(n/max)
//!      ▲                          │                  ▲                   │      │
//!      │                          └──fail──► Error    └──────ok──────────┘      │
//!      └──────────── disconnect() from any state          Error ◄──n > max──────┘
//! ```
//!
//! A *loss* is any of: the reader hits end-of-stream or an I/O error, an
//! inbound frame fails to decode, a heartbeat cannot be written, or no frame
//! at all arrives within `ack_timeout` of a heartbeat.
//!
//! # Generations
//!
//! Every `connect()` and `disconnect()` bumps a generation counter.  Background
//! tasks remember the generation they were started for and only publish state
//! or install a writer while it is still current.  A `disconnect()` issued
//! while a reconnect sleeps or dials therefore always wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use remote_core::protocol::codec::{decode_packet, encode_packet};
use remote_core::protocol::frame::TransportError;
use remote_core::protocol::packet::{Action, Packet};
use remote_core::{ConnectionState, SessionInfo};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::transport::{Connector, Endpoint, FrameReader, FrameWriter};
use super::ConnectionConfig;
use crate::infrastructure::history::DeviceHistory;
use crate::infrastructure::logging::{LogSink, Severity};

/// Capacity of the inbound packet channel handed out by [`ConnectionManager::subscribe`].
const INBOUND_CAPACITY: usize = 64;

/// Capacity between the reader task and the supervisor.
const READER_CAPACITY: usize = 16;

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Shared state between the public handle and its background tasks.
struct Inner {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    history: Arc<dyn DeviceHistory>,
    log: Arc<dyn LogSink>,
    generation: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
    writer: Mutex<Option<Box<dyn FrameWriter>>>,
    supervisor: StdMutex<Option<JoinHandle<()>>>,
    inbound_tx: mpsc::Sender<Packet>,
    inbound_rx: StdMutex<Option<mpsc::Receiver<Packet>>>,
}

/// Manages one framed connection at a time.
///
/// All methods take `&self`; wrap the manager in an `Arc` to share it between
/// the UI and input producers.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        history: Arc<dyn DeviceHistory>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                history,
                log,
                generation: AtomicU64::new(0),
                state_tx,
                writer: Mutex::new(None),
                supervisor: StdMutex::new(None),
                inbound_tx,
                inbound_rx: StdMutex::new(Some(inbound_rx)),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Current state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Takes the inbound packet receiver.  Returns `None` after the first call.
    ///
    /// Heartbeats are consumed internally and never appear here.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<Packet>> {
        self.inner
            .inbound_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }

    /// Opens a connection to `endpoint`, replacing any current one.
    ///
    /// A failed first attempt is not retried: the state becomes
    /// [`ConnectionState::Error`] and the error is returned.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectTimeout`], [`TransportError::ConnectFailed`],
    /// or [`TransportError::Unsupported`] from the connector;
    /// [`TransportError::NotConnected`] when a `disconnect()` overtook the
    /// attempt.
    pub async fn connect(&self, endpoint: Endpoint) -> Result<(), TransportError> {
        let inner = &self.inner;
        let generation = inner.begin_generation();
        inner.stop_supervisor();
        inner.close_writer().await;

        info!(%endpoint, "connecting");
        inner.publish(generation, ConnectionState::Connecting);

        let link = match inner.open(&endpoint).await {
            Ok(link) => link,
            Err(e) => {
                let message = format!("connect to {endpoint} failed: {e}");
                if inner.publish(generation, ConnectionState::Error(message.clone())) {
                    inner.log.log(&message, Severity::Error);
                }
                return Err(e);
            }
        };

        let Some(reader) = inner.install(generation, &endpoint, link.reader, link.writer).await else {
            return Err(TransportError::NotConnected);
        };

        let task = tokio::spawn(supervise(Arc::clone(inner), generation, endpoint, reader));
        if let Ok(mut slot) = inner.supervisor.lock() {
            if inner.is_current(generation) {
                *slot = Some(task);
            } else {
                task.abort();
            }
        }
        Ok(())
    }

    /// Closes the connection and stops heartbeats and reconnects.
    ///
    /// Safe to call in any state; the final state is always `Disconnected`.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.begin_generation();
        inner.stop_supervisor();
        inner.close_writer().await;
        inner.state_tx.send_replace(ConnectionState::Disconnected);
        info!("disconnected");
        inner.log.log("disconnected", Severity::Info);
    }

    /// Encodes and writes `packet` as one frame.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] unless the state is `Connected`;
    /// encoding and I/O errors otherwise.  A write failure does not change the
    /// state by itself; the supervisor detects the broken link.
    pub async fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        if !self.inner.state_tx.borrow().is_connected() {
            return Err(TransportError::NotConnected);
        }
        let payload = encode_packet(packet)?;
        self.inner.write(&payload).await
    }

    /// Wraps `action` in a Run packet stamped with this client's identity and sends it.
    pub async fn send_action(&self, action: Action) -> Result<(), TransportError> {
        let mut packet = Packet::run(action).with_source(self.inner.config.client_id.clone());
        if let Some(destination) = &self.inner.config.destination {
            packet = packet.with_destination(destination.clone());
        }
        self.send(&packet).await
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.begin_generation();
        self.inner.stop_supervisor();
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

impl Inner {
    /// Starts a new generation and returns it.
    fn begin_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Publishes `state` if `generation` is still current.
    ///
    /// The check runs under the watch channel's lock, so it cannot interleave
    /// with the `send_replace` in `disconnect()`.
    fn publish(&self, generation: u64, state: ConnectionState) -> bool {
        self.state_tx.send_if_modified(|current| {
            if !self.is_current(generation) {
                return false;
            }
            debug!(from = %current, to = %state, "connection state");
            *current = state;
            true
        })
    }

    fn stop_supervisor(&self) {
        if let Ok(mut slot) = self.supervisor.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    async fn close_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                debug!(error = %e, "close after teardown");
            }
        }
    }

    async fn write(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
        writer.write_frame(payload).await
    }

    async fn open(&self, endpoint: &Endpoint) -> Result<super::FramedLink, TransportError> {
        let timeout = self.config.connect_timeout;
        match time::timeout(timeout, self.connector.connect(endpoint, self.config.max_frame_len)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout {
                endpoint: endpoint.to_string(),
                timeout,
            }),
        }
    }

    /// Makes a freshly opened link the current one.
    ///
    /// Returns the reader for the supervisor, or `None` (after closing the
    /// link) when the generation moved on while dialing.
    async fn install(
        &self,
        generation: u64,
        endpoint: &Endpoint,
        reader: Box<dyn FrameReader>,
        mut writer: Box<dyn FrameWriter>,
    ) -> Option<Box<dyn FrameReader>> {
        {
            let mut slot = self.writer.lock().await;
            if self.is_current(generation) {
                *slot = Some(writer);
            } else {
                drop(slot);
                let _ = writer.close().await;
                return None;
            }
        }

        let session = SessionInfo {
            transport: endpoint.transport(),
            address: endpoint.address(),
            detail: None,
        };
        if !self.publish(generation, ConnectionState::Connected(session)) {
            return None;
        }
        info!(%endpoint, "connected");
        self.log.log(&format!("connected to {endpoint}"), Severity::Info);
        self.history.record_connected(endpoint.descriptor());
        Some(reader)
    }
}

// ── Background tasks ──────────────────────────────────────────────────────────

/// Drives one generation: runs the link, and on loss reconnects with backoff.
async fn supervise(
    inner: Arc<Inner>,
    generation: u64,
    endpoint: Endpoint,
    mut reader: Box<dyn FrameReader>,
) {
    loop {
        let reason = run_link(&inner, generation, reader).await;
        if !inner.is_current(generation) {
            return;
        }
        warn!(%endpoint, %reason, "connection lost");
        inner
            .log
            .log(&format!("connection lost: {reason}"), Severity::Warning);
        inner.close_writer().await;

        match reconnect(&inner, generation, &endpoint).await {
            Some(next) => reader = next,
            None => return,
        }
    }
}

/// Pumps frames from `reader` into a channel so the supervisor can `select!`
/// on them without cancelling a half-read frame.
async fn pump_frames(
    mut reader: Box<dyn FrameReader>,
    tx: mpsc::Sender<Result<Vec<u8>, TransportError>>,
) {
    loop {
        let result = reader.read_frame().await;
        let failed = result.is_err();
        if tx.send(result).await.is_err() || failed {
            return;
        }
    }
}

/// Runs heartbeats and the ack watchdog until the link is lost.  Returns the reason.
async fn run_link(inner: &Inner, generation: u64, reader: Box<dyn FrameReader>) -> String {
    let (frame_tx, mut frame_rx) = mpsc::channel(READER_CAPACITY);
    let _reader_task = AbortOnDrop(tokio::spawn(pump_frames(reader, frame_tx)));

    let mut heartbeat = time::interval(inner.config.heartbeat_period());
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ack_deadline: Option<Instant> = None;

    let heartbeat_payload = match encode_packet(&Packet::keep_alive()) {
        Ok(bytes) => bytes,
        Err(e) => return format!("cannot encode heartbeat: {e}"),
    };

    loop {
        let armed = ack_deadline;
        let watchdog = async move {
            match armed {
                Some(deadline) => time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = heartbeat.tick() => {
                if !inner.is_current(generation) {
                    return "superseded".to_string();
                }
                if let Err(e) = inner.write(&heartbeat_payload).await {
                    return format!("heartbeat write failed: {e}");
                }
                if ack_deadline.is_none() {
                    ack_deadline = Some(Instant::now() + inner.config.ack_window());
                }
            }
            frame = frame_rx.recv() => {
                let bytes = match frame {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => return e.to_string(),
                    None => return "reader stopped".to_string(),
                };
                ack_deadline = None;
                match decode_packet(&bytes) {
                    Ok(packet) if packet.is_keep_alive() => {}
                    Ok(packet) => {
                        if let Err(e) = inner.inbound_tx.try_send(packet) {
                            debug!(error = %e, "inbound packet dropped");
                        }
                    }
                    Err(e) => return format!("undecodable frame: {e}"),
                }
            }
            _ = watchdog => {
                return format!("no heartbeat ack within {:?}", inner.config.ack_window());
            }
        }
    }
}

/// Reconnect loop.  Returns the new reader, or `None` when giving up or superseded.
async fn reconnect(
    inner: &Inner,
    generation: u64,
    endpoint: &Endpoint,
) -> Option<Box<dyn FrameReader>> {
    let max = inner.config.max_reconnect_attempts;
    for attempt in 1..=max {
        if !inner.publish(generation, ConnectionState::Reconnecting { attempt, max }) {
            return None;
        }
        let delay = inner.config.reconnect_delay(attempt);
        info!(%endpoint, attempt, max, ?delay, "reconnecting");
        time::sleep(delay).await;

        if !inner.is_current(generation) {
            return None;
        }
        match inner.open(endpoint).await {
            Ok(link) => {
                return inner.install(generation, endpoint, link.reader, link.writer).await;
            }
            Err(e) => {
                warn!(%endpoint, attempt, error = %e, "reconnect attempt failed");
            }
        }
    }

    let message = format!("unable to reconnect after {max} attempts");
    if inner.publish(generation, ConnectionState::Error(message.clone())) {
        inner.log.log(&message, Severity::Error);
    }
    None
}
