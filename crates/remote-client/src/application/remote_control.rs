//! UI-facing input facade.
//!
//! # Two transports, one trait (for beginners)
//!
//! A phone UI only knows gestures: "moved by (dx, dy)", "tapped left",
//! "typed this text".  [`RemoteInput`] expresses exactly those.  Which wire
//! they travel on is decided by the implementation chosen at startup:
//!
//! | Call              | [`TcpRemote`] (desktop server)   | [`BleRemote`] (HID receiver)          |
//! |-------------------|----------------------------------|---------------------------------------|
//! | `move_by`         | `MoveBy` action                  | mouse reports, split to range         |
//! | `click`           | `Click` action                   | press + release mouse reports         |
//! | `type_text`       | `Text` action                    | key reports, Alt codes for non-ASCII  |
//! | `press`           | `Stroke`/`Press` action          | one chord report + release            |
//! | `scroll`/`hscroll`| `Scroll`/`HScroll` actions       | wheel reports (Shift held for hscroll)|

use std::sync::Arc;

use async_trait::async_trait;
use remote_core::hid::{Dpad, GamepadButton};
use remote_core::protocol::commands;
use remote_core::{HidError, HidKeyCode, MouseButton, TransportError};
use thiserror::Error;

use crate::infrastructure::ble::{BleError, BleManager};
use crate::infrastructure::network::ConnectionManager;

/// Errors surfaced to the UI.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Ble(#[from] BleError),
    #[error(transparent)]
    Hid(#[from] HidError),
}

/// Mouse and keyboard actions, independent of transport.
#[async_trait]
pub trait RemoteInput: Send + Sync {
    async fn move_by(&self, dx: i32, dy: i32) -> Result<(), ControlError>;
    async fn click(&self, button: MouseButton) -> Result<(), ControlError>;
    async fn type_text(&self, text: &str) -> Result<(), ControlError>;
    /// Presses `key` with `modifiers` held (names such as `"ctrl"`, `"shift"`).
    async fn press(&self, key: &str, modifiers: &[String]) -> Result<(), ControlError>;
    async fn scroll(&self, delta: i32) -> Result<(), ControlError>;
    async fn hscroll(&self, delta: i32) -> Result<(), ControlError>;
}

/// Gamepad actions.  Only the BLE receiver in XInput mode supports them.
///
/// Sticks take -1.0..1.0 with +y pointing down, triggers 0.0..1.0.
#[async_trait]
pub trait GamepadInput: Send + Sync {
    async fn set_left_stick(&self, x: f32, y: f32) -> Result<(), ControlError>;
    async fn set_right_stick(&self, x: f32, y: f32) -> Result<(), ControlError>;
    async fn set_triggers(&self, left: f32, right: f32) -> Result<(), ControlError>;
    async fn set_dpad(&self, dpad: Dpad) -> Result<(), ControlError>;
    async fn press_button(&self, button: GamepadButton) -> Result<(), ControlError>;
    async fn release_button(&self, button: GamepadButton) -> Result<(), ControlError>;
}

// ── TCP / RFCOMM ──────────────────────────────────────────────────────────────

/// [`RemoteInput`] over a [`ConnectionManager`].
#[derive(Clone)]
pub struct TcpRemote {
    manager: Arc<ConnectionManager>,
}

impl TcpRemote {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }
}

#[async_trait]
impl RemoteInput for TcpRemote {
    async fn move_by(&self, dx: i32, dy: i32) -> Result<(), ControlError> {
        Ok(self.manager.send_action(commands::move_by(dx, dy)).await?)
    }

    async fn click(&self, button: MouseButton) -> Result<(), ControlError> {
        Ok(self.manager.send_action(commands::click(button)).await?)
    }

    async fn type_text(&self, text: &str) -> Result<(), ControlError> {
        Ok(self.manager.send_action(commands::text(text)).await?)
    }

    async fn press(&self, key: &str, modifiers: &[String]) -> Result<(), ControlError> {
        Ok(self
            .manager
            .send_action(commands::press(key, modifiers))
            .await?)
    }

    async fn scroll(&self, delta: i32) -> Result<(), ControlError> {
        Ok(self.manager.send_action(commands::scroll(delta)).await?)
    }

    async fn hscroll(&self, delta: i32) -> Result<(), ControlError> {
        Ok(self.manager.send_action(commands::hscroll(delta)).await?)
    }
}

// ── BLE ───────────────────────────────────────────────────────────────────────

/// [`RemoteInput`] and [`GamepadInput`] over a [`BleManager`].
#[derive(Clone)]
pub struct BleRemote {
    manager: Arc<BleManager>,
}

impl BleRemote {
    pub fn new(manager: Arc<BleManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<BleManager> {
        &self.manager
    }
}

fn resolve_key(name: &str) -> Result<HidKeyCode, HidError> {
    HidKeyCode::from_name(name).ok_or_else(|| HidError::UnknownKey(name.to_string()))
}

#[async_trait]
impl RemoteInput for BleRemote {
    async fn move_by(&self, dx: i32, dy: i32) -> Result<(), ControlError> {
        Ok(self.manager.send_mouse_move(dx, dy).await?)
    }

    async fn click(&self, button: MouseButton) -> Result<(), ControlError> {
        Ok(self.manager.send_mouse_click(button).await?)
    }

    async fn type_text(&self, text: &str) -> Result<(), ControlError> {
        Ok(self.manager.type_text(text).await?)
    }

    async fn press(&self, key: &str, modifiers: &[String]) -> Result<(), ControlError> {
        let mut keys = modifiers
            .iter()
            .map(|m| resolve_key(m))
            .collect::<Result<Vec<_>, _>>()?;
        keys.push(resolve_key(key)?);
        Ok(self.manager.press_keys(&keys).await?)
    }

    async fn scroll(&self, delta: i32) -> Result<(), ControlError> {
        Ok(self.manager.send_mouse_scroll(delta).await?)
    }

    async fn hscroll(&self, delta: i32) -> Result<(), ControlError> {
        Ok(self.manager.send_mouse_hscroll(delta).await?)
    }
}

#[async_trait]
impl GamepadInput for BleRemote {
    async fn set_left_stick(&self, x: f32, y: f32) -> Result<(), ControlError> {
        Ok(self.manager.set_left_stick(x, y).await?)
    }

    async fn set_right_stick(&self, x: f32, y: f32) -> Result<(), ControlError> {
        Ok(self.manager.set_right_stick(x, y).await?)
    }

    async fn set_triggers(&self, left: f32, right: f32) -> Result<(), ControlError> {
        Ok(self.manager.set_triggers(left, right).await?)
    }

    async fn set_dpad(&self, dpad: Dpad) -> Result<(), ControlError> {
        Ok(self.manager.set_dpad(dpad).await?)
    }

    async fn press_button(&self, button: GamepadButton) -> Result<(), ControlError> {
        Ok(self.manager.press_button(button).await?)
    }

    async fn release_button(&self, button: GamepadButton) -> Result<(), ControlError> {
        Ok(self.manager.release_button(button).await?)
    }
}
