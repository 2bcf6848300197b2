//! Composite ⇄ XInput mode switching.
//!
//! A switch is a command write followed by an acknowledgement notification
//! on the same characteristic:
//!
//! ```text
//! write  [CMD_SET_MODE, mode]
//! notify [CMD_SET_MODE, mode, status]     status 0 = accepted
//! ```
//!
//! The event pump hands every command notification to
//! [`ModeController::on_command_notification`]; a pending switch picks up the
//! acknowledgement for the mode it asked for.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use remote_core::ble::gatt::{CMD_SET_MODE, COMMAND_UUID, STATUS_OK};
use remote_core::DeviceMode;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::error::{AdapterError, ModeSwitchError};
use super::write_queue::WriteQueue;

pub struct ModeController {
    timeout: Duration,
    waiter: StdMutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    switching: Mutex<()>,
}

impl ModeController {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            waiter: StdMutex::new(None),
            switching: Mutex::new(()),
        }
    }

    /// Routes a command-characteristic notification to a pending switch.
    ///
    /// Returns `true` when the value was a mode acknowledgement and somebody
    /// was waiting for it.
    pub fn on_command_notification(&self, value: &[u8]) -> bool {
        if value.first() != Some(&CMD_SET_MODE) {
            return false;
        }
        match self.waiter.lock() {
            Ok(slot) => slot
                .as_ref()
                .map(|tx| tx.send(value.to_vec()).is_ok())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Fails any pending switch, e.g. because the link dropped.
    pub fn cancel(&self) {
        self.set_waiter(None);
    }

    fn set_waiter(&self, waiter: Option<mpsc::UnboundedSender<Vec<u8>>>) {
        if let Ok(mut slot) = self.waiter.lock() {
            *slot = waiter;
        }
    }

    /// Switches from `current` to `target`.  Returns the now active mode.
    ///
    /// Switching to the active mode writes nothing.  On any failure the
    /// caller keeps `current`.
    pub async fn switch(
        &self,
        writes: &WriteQueue,
        current: DeviceMode,
        target: DeviceMode,
    ) -> Result<DeviceMode, ModeSwitchError> {
        if current == target {
            debug!(mode = %target, "mode already active");
            return Ok(target);
        }

        let _one_at_a_time = self.switching.lock().await;
        let (tx, mut acks) = mpsc::unbounded_channel();
        self.set_waiter(Some(tx));

        info!(from = %current, to = %target, "switching receiver mode");
        if let Err(e) = writes.write(COMMAND_UUID, &[CMD_SET_MODE, target.code()]).await {
            self.cancel();
            return Err(ModeSwitchError::Ble(e));
        }

        let deadline = Instant::now() + self.timeout;
        let result = loop {
            match time::timeout_at(deadline, acks.recv()).await {
                Err(_) => break Err(ModeSwitchError::Timeout(self.timeout)),
                Ok(None) => break Err(ModeSwitchError::Ble(AdapterError::NotConnected)),
                Ok(Some(ack)) => {
                    if ack.len() < 3 || ack[1] != target.code() {
                        debug!(?ack, "ignoring acknowledgement for another mode");
                        continue;
                    }
                    break match ack[2] {
                        STATUS_OK => Ok(target),
                        status => Err(ModeSwitchError::Rejected(status)),
                    };
                }
            }
        };
        self.cancel();

        if let Err(e) = &result {
            warn!(to = %target, error = %e, "mode switch failed");
        }
        result
    }
}
