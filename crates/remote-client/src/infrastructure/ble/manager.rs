//! BleManager: the BLE HID receiver path.
//!
//! Owns the platform adapter handle, the event pump, the authenticated
//! session, the published connection state, the GATT write queue and the
//! mode controller.
//!
//! # Event pump (for beginners)
//!
//! The pump task is the only reader of the adapter's [`BleEvent`] channel.
//! It routes each event to whoever needs it:
//!
//! | Event                               | Goes to                                  |
//! |-------------------------------------|------------------------------------------|
//! | `Advertisement`                     | the scan in progress                     |
//! | `Notification` on the command char  | a pending mode switch                    |
//! | `Notification` on the LED char      | the LED cache and the session            |
//! | `Disconnected`                      | clears the session, state becomes Error  |
//!
//! LED reports are cached even before a session exists, because receivers
//! announce their LEDs as soon as notifications are enabled.  The cache
//! seeds the session when it is installed.
//!
//! HID calls check the session's mode first.  Keyboard and mouse calls need
//! Composite mode, gamepad calls need XInput mode; a call for the inactive
//! personality fails with [`BleError::ModeMismatch`] without writing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use remote_core::ble::gatt::{COMMAND_UUID, GAMEPAD_UUID, KEYBOARD_UUID, LED_UUID, MOUSE_UUID};
use remote_core::hid::keycodes::modifier;
use remote_core::hid::report::{
    keyboard_report, mouse_click_reports, mouse_move_reports, mouse_scroll_reports,
    KEYBOARD_RELEASE,
};
use remote_core::hid::{Dpad, GamepadButton, GamepadState, KeyboardState, TextPlan};
use remote_core::{
    BleDeviceSession, ConnectionState, DeviceDescriptor, DeviceMode, DeviceTier, HidKeyCode,
    LedState, MouseButton, SessionInfo, TransportKind,
};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::adapter::{Advertisement, BleAdapter, BleEvent};
use super::error::BleError;
use super::handshake;
use super::mode::ModeController;
use super::scanner::{ScanAgent, ScanConfig, ScanDiagnosis};
use super::write_queue::WriteQueue;
use crate::infrastructure::history::DeviceHistory;
use crate::infrastructure::logging::{LogSink, Severity};

/// Tuning for [`BleManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct BleConfig {
    pub scan: ScanConfig,
    /// How long a mode switch waits for its acknowledgement.
    pub mode_switch_timeout: Duration,
    /// Length of [`BleManager::diagnostic_scan`].
    pub diagnostic_duration: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            mode_switch_timeout: Duration::from_secs(2),
            diagnostic_duration: Duration::from_secs(30),
        }
    }
}

struct Shared {
    adapter: Arc<dyn BleAdapter>,
    config: BleConfig,
    history: Arc<dyn DeviceHistory>,
    log: Arc<dyn LogSink>,
    generation: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
    session: StdMutex<Option<BleDeviceSession>>,
    /// Last LED report seen for the current connection attempt.
    last_leds: StdMutex<Option<LedState>>,
    gamepad: StdMutex<GamepadState>,
    scanner: ScanAgent,
    writes: WriteQueue,
    mode: ModeController,
    /// Held for a whole mode switch, from reading the current mode to
    /// applying the new one.
    switching: Mutex<()>,
    flush_tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl Shared {
    fn begin_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn publish(&self, generation: u64, state: ConnectionState) -> bool {
        self.state_tx.send_if_modified(|current| {
            if self.current_generation() != generation {
                return false;
            }
            debug!(from = %current, to = %state, "ble state");
            *current = state;
            true
        })
    }

    fn fail(&self, generation: u64, message: String) {
        if self.publish(generation, ConnectionState::Error(message.clone())) {
            self.log.log(&message, Severity::Error);
        }
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut Option<BleDeviceSession>) -> R) -> R {
        match self.session.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn with_last_leds<R>(&self, f: impl FnOnce(&mut Option<LedState>) -> R) -> R {
        match self.last_leds.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Waits until the pump has handled every event queued so far.
    async fn drain_events(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.flush_tx.send(ack_tx).is_ok() {
            let _ = ack_rx.await;
        }
    }

    fn with_gamepad<R>(&self, f: impl FnOnce(&mut GamepadState) -> R) -> R {
        match self.gamepad.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Tier of the session if it is in `required` mode.
    fn require(&self, required: DeviceMode) -> Result<DeviceTier, BleError> {
        self.with_session(|session| {
            let session = session.as_ref().ok_or(BleError::NotConnected)?;
            if session.mode() != required {
                return Err(BleError::ModeMismatch {
                    required,
                    active: session.mode(),
                });
            }
            Ok(session.tier())
        })
    }

    async fn release_link(&self, address: &str) {
        if let Err(e) = self.adapter.disconnect(address).await {
            warn!(address, error = %e, "adapter disconnect failed");
        }
    }
}

/// Drives one BLE HID receiver.
pub struct BleManager {
    shared: Arc<Shared>,
    pump: JoinHandle<()>,
}

impl BleManager {
    /// Creates the manager and starts its event pump on the current runtime.
    ///
    /// `events` must be the channel the platform adapter pushes its
    /// callbacks into.
    pub fn new(
        adapter: Arc<dyn BleAdapter>,
        events: mpsc::Receiver<BleEvent>,
        config: BleConfig,
        history: Arc<dyn DeviceHistory>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            writes: WriteQueue::new(Arc::clone(&adapter)),
            mode: ModeController::new(config.mode_switch_timeout),
            adapter,
            config,
            history,
            log,
            generation: AtomicU64::new(0),
            state_tx,
            session: StdMutex::new(None),
            last_leds: StdMutex::new(None),
            gamepad: StdMutex::new(GamepadState::new()),
            scanner: ScanAgent::new(),
            switching: Mutex::new(()),
            flush_tx,
        });
        let pump = tokio::spawn(pump_events(Arc::clone(&shared), events, flush_rx));
        Self { shared, pump }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Snapshot of the authenticated session.
    pub fn session(&self) -> Option<BleDeviceSession> {
        self.shared.with_session(|s| s.clone())
    }

    pub fn led_state(&self) -> Option<LedState> {
        self.shared.with_session(|s| s.as_ref().map(|s| s.leds()))
    }

    pub fn device_mode(&self) -> Option<DeviceMode> {
        self.shared.with_session(|s| s.as_ref().map(|s| s.mode()))
    }

    // ── Scanning ──────────────────────────────────────────────────────────────

    /// Runs the two-phase receiver scan within the configured budget.
    pub async fn start_scan(&self) -> Result<Vec<Advertisement>, BleError> {
        let shared = &self.shared;
        shared
            .scanner
            .scan(shared.adapter.as_ref(), &shared.config.scan, shared.log.as_ref())
            .await
    }

    /// Ends a running scan early.  Returns `false` when none was running.
    pub fn stop_scan(&self) -> bool {
        self.shared.scanner.stop()
    }

    /// Long unfiltered scan for troubleshooting visibility problems.
    pub async fn diagnostic_scan(&self) -> Result<ScanDiagnosis, BleError> {
        let shared = &self.shared;
        shared
            .scanner
            .diagnose(
                shared.adapter.as_ref(),
                &shared.config.scan,
                shared.config.diagnostic_duration,
                shared.log.as_ref(),
            )
            .await
    }

    // ── Connection ────────────────────────────────────────────────────────────

    /// Connects to the receiver at `address` and authenticates it.
    ///
    /// Any existing session is closed first.  Failures leave the state at
    /// `Error` and are not retried.
    pub async fn connect(&self, address: &str) -> Result<(), BleError> {
        let shared = &self.shared;
        let generation = shared.begin_generation();
        shared.mode.cancel();
        if let Some(old) = shared.with_session(Option::take) {
            shared.release_link(old.address()).await;
        }
        shared.with_last_leds(|leds| *leds = None);

        info!(address, "connecting to receiver");
        shared.publish(generation, ConnectionState::Connecting);

        if let Err(e) = shared.adapter.connect(address).await {
            shared.fail(generation, format!("connect to {address} failed: {e}"));
            return Err(e.into());
        }
        if let Err(e) = shared.adapter.enable_notifications(COMMAND_UUID).await {
            shared.release_link(address).await;
            shared.fail(generation, format!("command notifications unavailable: {e}"));
            return Err(e.into());
        }
        if let Err(e) = shared.adapter.enable_notifications(LED_UUID).await {
            warn!(address, error = %e, "LED notifications unavailable");
        }

        let mut session =
            match handshake::authenticate(shared.adapter.as_ref(), &shared.writes, address).await {
                Ok(session) => session,
                Err(e) => {
                    shared.release_link(address).await;
                    shared.fail(generation, format!("authentication failed: {e}"));
                    return Err(e.into());
                }
            };

        let info = SessionInfo {
            transport: TransportKind::Ble,
            address: address.to_string(),
            detail: Some(session.describe()),
        };
        if let Some(leds) = shared.with_last_leds(|leds| *leds) {
            session.set_leds(leds);
        }
        let installed = shared.with_session(|slot| {
            if shared.current_generation() != generation {
                return false;
            }
            *slot = Some(session);
            true
        });
        if !installed {
            shared.release_link(address).await;
            return Err(BleError::NotConnected);
        }
        // LED reports still queued from the subscription land on the session.
        shared.drain_events().await;
        // A disconnect() racing past this point takes the session and the link itself.
        if !shared.publish(generation, ConnectionState::Connected(info)) {
            return Err(BleError::NotConnected);
        }
        shared.with_gamepad(|pad| *pad = GamepadState::new());

        info!(address, "receiver connected");
        shared
            .log
            .log(&format!("connected to receiver {address}"), Severity::Info);
        shared
            .history
            .record_connected(DeviceDescriptor::new(TransportKind::Ble, address));
        Ok(())
    }

    /// Closes the session.  Safe in any state; the final state is `Disconnected`.
    pub async fn disconnect(&self) {
        let shared = &self.shared;
        shared.begin_generation();
        shared.mode.cancel();
        shared.scanner.stop();
        if let Some(session) = shared.with_session(Option::take) {
            shared.release_link(session.address()).await;
        }
        shared.with_last_leds(|leds| *leds = None);
        shared.state_tx.send_replace(ConnectionState::Disconnected);
        info!("receiver disconnected");
        shared.log.log("disconnected", Severity::Info);
    }

    // ── Mouse ─────────────────────────────────────────────────────────────────

    pub async fn send_mouse_move(&self, dx: i32, dy: i32) -> Result<(), BleError> {
        let tier = self.shared.require(DeviceMode::Composite)?;
        let reports = mouse_move_reports(tier, 0, dx, dy);
        self.shared.writes.write_all(MOUSE_UUID, reports).await?;
        Ok(())
    }

    pub async fn send_mouse_click(&self, button: MouseButton) -> Result<(), BleError> {
        let tier = self.shared.require(DeviceMode::Composite)?;
        let reports = mouse_click_reports(tier, button.hid_mask());
        self.shared.writes.write_all(MOUSE_UUID, reports).await?;
        Ok(())
    }

    pub async fn send_mouse_scroll(&self, delta: i32) -> Result<(), BleError> {
        let tier = self.shared.require(DeviceMode::Composite)?;
        let reports = mouse_scroll_reports(tier, 0, delta);
        self.shared.writes.write_all(MOUSE_UUID, reports).await?;
        Ok(())
    }

    /// Horizontal scroll: Shift held while the vertical wheel turns.
    pub async fn send_mouse_hscroll(&self, delta: i32) -> Result<(), BleError> {
        let tier = self.shared.require(DeviceMode::Composite)?;
        let shift = keyboard_report(modifier::LEFT_SHIFT, &[])?;
        let writes = &self.shared.writes;

        writes.write(KEYBOARD_UUID, &shift).await?;
        let scrolled = writes
            .write_all(MOUSE_UUID, mouse_scroll_reports(tier, 0, delta))
            .await;
        let released = writes.write(KEYBOARD_UUID, &KEYBOARD_RELEASE).await;
        scrolled?;
        released?;
        Ok(())
    }

    // ── Keyboard ──────────────────────────────────────────────────────────────

    /// Presses `keys` together (modifiers included), then releases all.
    pub async fn press_keys(&self, keys: &[HidKeyCode]) -> Result<(), BleError> {
        self.shared.require(DeviceMode::Composite)?;
        let mut keyboard = KeyboardState::new();
        for &key in keys {
            keyboard.press(key)?;
        }
        self.shared
            .writes
            .write_all(KEYBOARD_UUID, [keyboard.report(), KEYBOARD_RELEASE])
            .await?;
        Ok(())
    }

    /// Types `text`, using Alt codes for characters outside printable ASCII.
    pub async fn type_text(&self, text: &str) -> Result<(), BleError> {
        self.shared.require(DeviceMode::Composite)?;
        let plan = TextPlan::new(text)?;
        if plan.is_empty() {
            return Ok(());
        }
        let num_lock_on = self.led_state().is_some_and(LedState::num_lock);
        let reports = plan.to_reports(num_lock_on);
        self.shared.writes.write_all(KEYBOARD_UUID, reports).await?;
        Ok(())
    }

    // ── Gamepad ───────────────────────────────────────────────────────────────

    async fn update_gamepad(&self, f: impl FnOnce(&mut GamepadState)) -> Result<(), BleError> {
        self.shared.require(DeviceMode::XInput)?;
        let report = self.shared.with_gamepad(|pad| {
            f(pad);
            pad.report()
        });
        self.shared.writes.write(GAMEPAD_UUID, &report).await?;
        Ok(())
    }

    pub async fn set_left_stick(&self, x: f32, y: f32) -> Result<(), BleError> {
        self.update_gamepad(|pad| pad.set_left_stick(x, y)).await
    }

    pub async fn set_right_stick(&self, x: f32, y: f32) -> Result<(), BleError> {
        self.update_gamepad(|pad| pad.set_right_stick(x, y)).await
    }

    pub async fn set_triggers(&self, left: f32, right: f32) -> Result<(), BleError> {
        self.update_gamepad(|pad| pad.set_triggers(left, right)).await
    }

    pub async fn set_dpad(&self, dpad: Dpad) -> Result<(), BleError> {
        self.update_gamepad(|pad| pad.set_dpad(dpad)).await
    }

    pub async fn press_button(&self, button: GamepadButton) -> Result<(), BleError> {
        self.update_gamepad(|pad| pad.set_button(button, true)).await
    }

    pub async fn release_button(&self, button: GamepadButton) -> Result<(), BleError> {
        self.update_gamepad(|pad| pad.set_button(button, false)).await
    }

    // ── Modes ─────────────────────────────────────────────────────────────────

    pub async fn switch_to_xinput_mode(&self) -> Result<(), BleError> {
        self.switch_mode(DeviceMode::XInput).await
    }

    pub async fn switch_to_composite_mode(&self) -> Result<(), BleError> {
        self.switch_mode(DeviceMode::Composite).await
    }

    async fn switch_mode(&self, target: DeviceMode) -> Result<(), BleError> {
        let shared = &self.shared;
        let _one_at_a_time = shared.switching.lock().await;
        let current = self.device_mode().ok_or(BleError::NotConnected)?;
        let mode = shared.mode.switch(&shared.writes, current, target).await?;
        let applied = shared.with_session(|slot| match slot.as_mut() {
            Some(session) => {
                session.set_mode(mode);
                true
            }
            None => false,
        });
        if !applied {
            return Err(BleError::NotConnected);
        }
        if mode != current {
            shared.with_gamepad(|pad| *pad = GamepadState::new());
            info!(%mode, "receiver mode changed");
            shared
                .log
                .log(&format!("receiver switched to {mode} mode"), Severity::Info);
        }
        Ok(())
    }
}

impl Drop for BleManager {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Single consumer of the adapter's event channel.
async fn pump_events(
    shared: Arc<Shared>,
    mut events: mpsc::Receiver<BleEvent>,
    mut flushes: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
) {
    loop {
        // Queued events go first, so a flush is answered only once they are handled.
        let event = tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            Some(ack) = flushes.recv() => {
                let _ = ack.send(());
                continue;
            }
        };
        match event {
            BleEvent::Advertisement(ad) => shared.scanner.on_advertisement(ad),
            BleEvent::Notification { uuid, value } if uuid == COMMAND_UUID => {
                if !shared.mode.on_command_notification(&value) {
                    debug!(?value, "unsolicited command notification");
                }
            }
            BleEvent::Notification { uuid, value } if uuid == LED_UUID => {
                match LedState::from_notification(&value) {
                    Some(leds) => {
                        debug!(bits = leds.bits(), "LED state");
                        shared.with_last_leds(|last| *last = Some(leds));
                        shared.with_session(|slot| {
                            if let Some(session) = slot.as_mut() {
                                session.set_leds(leds);
                            }
                        });
                    }
                    None => debug!("empty LED notification"),
                }
            }
            BleEvent::Notification { uuid, .. } => {
                debug!(%uuid, "notification on unexpected characteristic");
            }
            BleEvent::Disconnected { address } => {
                let generation = shared.current_generation();
                let dropped = shared.with_session(|slot| {
                    if slot.as_ref().is_some_and(|s| s.address() == address) {
                        slot.take()
                    } else {
                        None
                    }
                });
                if dropped.is_some() {
                    shared.mode.cancel();
                    warn!(%address, "receiver disconnected unexpectedly");
                    shared.fail(generation, "device disconnected".to_string());
                }
            }
        }
    }
    debug!("ble event channel closed");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use remote_core::ble::gatt::{CMD_SET_MODE, SERVICE_UUID};

    use super::*;
    use crate::infrastructure::ble::error::{AuthError, ModeSwitchError};
    use crate::infrastructure::ble::testing::{advert, FakeAdapter, FakeScript};
    use crate::infrastructure::history::{MockDeviceHistory, NoHistory};
    use crate::infrastructure::logging::MockLogSink;

    const ADDRESS: &str = "C0:FF:EE:00:00:01";

    fn quiet_log() -> Arc<MockLogSink> {
        let mut log = MockLogSink::new();
        log.expect_log().returning(|_, _| ());
        Arc::new(log)
    }

    fn manager(script: FakeScript) -> (BleManager, Arc<FakeAdapter>) {
        let (adapter, events) = FakeAdapter::new(script);
        let mgr = BleManager::new(
            adapter.clone(),
            events,
            BleConfig::default(),
            Arc::new(NoHistory),
            quiet_log(),
        );
        (mgr, adapter)
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_connect_authenticates_and_reports_history() {
        // Arrange
        let (adapter, events) = FakeAdapter::new(FakeScript::default());
        let mut history = MockDeviceHistory::new();
        history
            .expect_record_connected()
            .withf(|d| d.id == format!("ble:{ADDRESS}"))
            .times(1)
            .return_const(());
        let mgr = BleManager::new(
            adapter,
            events,
            BleConfig::default(),
            Arc::new(history),
            quiet_log(),
        );

        // Act
        mgr.connect(ADDRESS).await.unwrap();

        // Assert
        let state = mgr.state();
        let info = state.session().unwrap();
        assert_eq!(info.transport, TransportKind::Ble);
        assert_eq!(info.address, ADDRESS);
        assert_eq!(mgr.device_mode(), Some(DeviceMode::Composite));
    }

    #[tokio::test]
    async fn test_auth_mismatch_sets_error_state() {
        // Arrange
        let (mgr, _) = manager(FakeScript {
            auth_response: Some(vec![0xEE; 16]),
            ..Default::default()
        });

        // Act
        let result = mgr.connect(ADDRESS).await;

        // Assert
        assert!(matches!(result, Err(BleError::Auth(AuthError::Mismatch))));
        assert!(matches!(mgr.state(), ConnectionState::Error(_)));
        assert!(mgr.session().is_none());
    }

    #[tokio::test]
    async fn test_mouse_move_is_split_into_v1_reports() {
        // Arrange
        let (mgr, adapter) = manager(FakeScript::default());
        mgr.connect(ADDRESS).await.unwrap();

        // Act
        mgr.send_mouse_move(5000, 0).await.unwrap();

        // Assert
        let reports = adapter.writes_to(MOUSE_UUID);
        assert!(reports.len() >= 3);
        let sum: i32 = reports
            .iter()
            .map(|r| i32::from(i16::from_le_bytes([r[1], r[2]])))
            .sum();
        assert_eq!(sum, 5000);
    }

    #[tokio::test]
    async fn test_hscroll_wraps_wheel_in_shift() {
        // Arrange
        let (mgr, adapter) = manager(FakeScript::default());
        mgr.connect(ADDRESS).await.unwrap();

        // Act
        mgr.send_mouse_hscroll(3).await.unwrap();

        // Assert
        let keyboard = adapter.writes_to(KEYBOARD_UUID);
        assert_eq!(keyboard.len(), 2);
        assert_eq!(keyboard[0][0], modifier::LEFT_SHIFT);
        assert_eq!(keyboard[1], KEYBOARD_RELEASE.to_vec());
        assert_eq!(adapter.writes_to(MOUSE_UUID).len(), 1);
    }

    #[tokio::test]
    async fn test_type_text_in_xinput_mode_is_rejected_without_writes() {
        // Arrange
        let (mgr, adapter) = manager(FakeScript::default());
        mgr.connect(ADDRESS).await.unwrap();
        mgr.switch_to_xinput_mode().await.unwrap();
        let writes_before = adapter.writes().len();

        // Act
        let result = mgr.type_text("hello").await;

        // Assert
        assert!(matches!(
            result,
            Err(BleError::ModeMismatch {
                required: DeviceMode::Composite,
                active: DeviceMode::XInput
            })
        ));
        assert_eq!(adapter.writes().len(), writes_before);
    }

    #[tokio::test]
    async fn test_gamepad_requires_xinput_mode() {
        // Arrange
        let (mgr, adapter) = manager(FakeScript::default());
        mgr.connect(ADDRESS).await.unwrap();

        // Act
        let before = mgr.press_button(GamepadButton::A).await;
        mgr.switch_to_xinput_mode().await.unwrap();
        let after = mgr.press_button(GamepadButton::A).await;

        // Assert
        assert!(matches!(before, Err(BleError::ModeMismatch { .. })));
        assert!(after.is_ok());
        let report = adapter.writes_to(GAMEPAD_UUID);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0][3] & 0x10, 0x10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_mode_switch_keeps_previous_mode() {
        // Arrange
        let (mgr, _) = manager(FakeScript {
            mode_ack_status: None,
            ..Default::default()
        });
        mgr.connect(ADDRESS).await.unwrap();

        // Act
        let result = mgr.switch_to_xinput_mode().await;

        // Assert
        assert!(matches!(
            result,
            Err(BleError::ModeSwitch(ModeSwitchError::Timeout(_)))
        ));
        assert_eq!(mgr.device_mode(), Some(DeviceMode::Composite));
    }

    #[tokio::test(start_paused = true)]
    async fn test_opposite_mode_switches_run_one_after_another() {
        // Arrange
        let (mgr, adapter) = manager(FakeScript::default());
        mgr.connect(ADDRESS).await.unwrap();

        // Act: the composite request starts while the XInput switch is pending
        let (to_xinput, to_composite) = tokio::join!(
            mgr.switch_to_xinput_mode(),
            mgr.switch_to_composite_mode()
        );

        // Assert: both switches reached the receiver, the later one wins
        assert!(to_xinput.is_ok());
        assert!(to_composite.is_ok());
        let mode_writes: Vec<Vec<u8>> = adapter
            .writes_to(COMMAND_UUID)
            .into_iter()
            .filter(|w| w.first() == Some(&CMD_SET_MODE))
            .collect();
        assert_eq!(
            mode_writes,
            vec![
                vec![CMD_SET_MODE, DeviceMode::XInput.code()],
                vec![CMD_SET_MODE, DeviceMode::Composite.code()],
            ]
        );
        assert_eq!(mgr.device_mode(), Some(DeviceMode::Composite));
    }

    #[tokio::test]
    async fn test_led_report_sent_on_subscribe_reaches_session() {
        // Arrange: the receiver announces NumLock on as soon as LEDs are subscribed
        let (mgr, adapter) = manager(FakeScript {
            leds_on_subscribe: Some(LedState::NUM_LOCK),
            ..Default::default()
        });

        // Act
        mgr.connect(ADDRESS).await.unwrap();
        mgr.type_text("é").await.unwrap();

        // Assert: no NumLock tap, Alt-code typing starts right away
        assert_eq!(mgr.led_state().map(LedState::num_lock), Some(true));
        let reports = adapter.writes_to(KEYBOARD_UUID);
        assert_eq!(reports[0][0], modifier::LEFT_ALT);
        assert!(reports
            .iter()
            .all(|r| r[2] != HidKeyCode::NumLock.as_u8()));
    }

    #[tokio::test]
    async fn test_led_notification_updates_session_and_numlock_tap() {
        // Arrange
        let (mgr, adapter) = manager(FakeScript::default());
        mgr.connect(ADDRESS).await.unwrap();

        // Act
        mgr.type_text("é").await.unwrap();
        let without_numlock = adapter.writes_to(KEYBOARD_UUID).len();
        adapter.emit(BleEvent::Notification {
            uuid: LED_UUID,
            value: vec![LedState::NUM_LOCK],
        });
        settle().await;
        mgr.type_text("é").await.unwrap();
        let with_numlock = adapter.writes_to(KEYBOARD_UUID).len() - without_numlock;

        // Assert: the second run skips the NumLock press and release
        assert_eq!(mgr.led_state().map(LedState::num_lock), Some(true));
        assert_eq!(without_numlock - with_numlock, 2);
    }

    #[tokio::test]
    async fn test_unsolicited_disconnect_sets_error() {
        // Arrange
        let (mgr, adapter) = manager(FakeScript::default());
        mgr.connect(ADDRESS).await.unwrap();
        let mut states = mgr.watch_state();

        // Act
        adapter.emit(BleEvent::Disconnected {
            address: ADDRESS.to_string(),
        });
        let state = states
            .wait_for(|s| matches!(s, ConnectionState::Error(_)))
            .await
            .unwrap()
            .clone();

        // Assert
        assert_eq!(state, ConnectionState::Error("device disconnected".into()));
        assert!(mgr.session().is_none());
        assert!(matches!(mgr.send_mouse_move(1, 1).await, Err(BleError::NotConnected)));
    }

    #[tokio::test]
    async fn test_disconnect_is_safe_in_any_state() {
        let (mgr, _) = manager(FakeScript::default());
        mgr.disconnect().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        mgr.connect(ADDRESS).await.unwrap();
        mgr.disconnect().await;
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(mgr.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_goes_through_event_pump() {
        let (mgr, _) = manager(FakeScript {
            filtered_ads: vec![advert("AA", None, &[SERVICE_UUID])],
            names: HashMap::new(),
            ..Default::default()
        });
        let found = mgr.start_scan().await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(!mgr.stop_scan());
    }
}
