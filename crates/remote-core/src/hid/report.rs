//! Fixed-layout mouse, keyboard, and gamepad reports.
//!
//! # Report layouts
//!
//! ```text
//! Mouse (tier V0, 4 bytes):  [buttons][x i8][y i8][wheel i8]
//! Mouse (tier V1, 6 bytes):  [buttons][x lo][x hi][y lo][y hi][wheel i8]
//! Keyboard (8 bytes):        [modifiers][reserved 0][k1][k2][k3][k4][k5][k6]
//! Gamepad (20 bytes):        [0x00][0x14][buttons lo][buttons hi][lt][rt]
//!                            [lx][ly][rx][ry] (i16 LE each) [6 × 0x00]
//! ```
//!
//! Relative mouse movement larger than one report can carry is split into
//! several reports.  Both axes are divided over the same number of steps so
//! the pointer follows a straight line.

use thiserror::Error;

use crate::ble::session::DeviceTier;
use crate::hid::keycodes::HidKeyCode;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors produced while building reports.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HidError {
    /// A seventh non-modifier key was pressed while six were already held.
    #[error("keyboard rollover full: at most {max} keys can be held at once")]
    RolloverFull { max: usize },

    /// The character has no key mapping and no Alt code.
    #[error("character {0:?} cannot be typed")]
    Unmappable(char),

    /// A key name did not match any known key.
    #[error("unknown key name: {0:?}")]
    UnknownKey(String),
}

// ── Mouse ─────────────────────────────────────────────────────────────────────

pub const MOUSE_V0_REPORT_LEN: usize = 4;
pub const MOUSE_V1_REPORT_LEN: usize = 6;

/// Largest per-report movement of a V0 mouse report.
pub const MOUSE_V0_MAX_DELTA: i32 = 127;
/// Largest per-report movement of a V1 mouse report.
pub const MOUSE_V1_MAX_DELTA: i32 = 2047;
/// Largest per-report wheel movement.
pub const WHEEL_MAX_DELTA: i32 = 127;

/// Largest relative movement a single report can carry for `tier`.
pub fn max_mouse_delta(tier: DeviceTier) -> i32 {
    match tier {
        DeviceTier::V0 => MOUSE_V0_MAX_DELTA,
        DeviceTier::V1 => MOUSE_V1_MAX_DELTA,
    }
}

/// Builds one mouse report; deltas are clamped to the tier's range.
pub fn mouse_report(tier: DeviceTier, buttons: u8, dx: i32, dy: i32, wheel: i32) -> Vec<u8> {
    let max = max_mouse_delta(tier);
    let dx = dx.clamp(-max, max);
    let dy = dy.clamp(-max, max);
    let wheel = wheel.clamp(-WHEEL_MAX_DELTA, WHEEL_MAX_DELTA) as i8 as u8;
    match tier {
        DeviceTier::V0 => vec![buttons, dx as i8 as u8, dy as i8 as u8, wheel],
        DeviceTier::V1 => {
            let x = (dx as i16).to_le_bytes();
            let y = (dy as i16).to_le_bytes();
            vec![buttons, x[0], x[1], y[0], y[1], wheel]
        }
    }
}

/// Splits a relative move into reports that each fit the tier's range.
///
/// The deltas of the returned reports sum exactly to `(dx, dy)`.  A zero
/// move produces no reports.
pub fn mouse_move_reports(tier: DeviceTier, buttons: u8, dx: i32, dy: i32) -> Vec<Vec<u8>> {
    let max = max_mouse_delta(tier);
    split_evenly(&[dx, dy], max)
        .into_iter()
        .map(|step| mouse_report(tier, buttons, step[0], step[1], 0))
        .collect()
}

/// Splits a wheel movement into reports of at most ±127 detents each.
pub fn mouse_scroll_reports(tier: DeviceTier, buttons: u8, delta: i32) -> Vec<Vec<u8>> {
    split_evenly(&[delta], WHEEL_MAX_DELTA)
        .into_iter()
        .map(|step| mouse_report(tier, buttons, 0, 0, step[0]))
        .collect()
}

/// Press report followed by release report for a single click.
pub fn mouse_click_reports(tier: DeviceTier, button_mask: u8) -> [Vec<u8>; 2] {
    [
        mouse_report(tier, button_mask, 0, 0, 0),
        mouse_report(tier, 0, 0, 0, 0),
    ]
}

/// Divides each total into the same number of steps, each within `±max`.
fn split_evenly<const N: usize>(totals: &[i32; N], max: i32) -> Vec<[i32; N]> {
    let largest = totals.iter().map(|t| i64::from(*t).abs()).max().unwrap_or(0);
    if largest == 0 {
        return Vec::new();
    }
    let max = i64::from(max);
    let steps = (largest + max - 1) / max;
    (0..steps)
        .map(|i| {
            let mut step = [0i32; N];
            for (slot, &total) in step.iter_mut().zip(totals) {
                let total = i64::from(total);
                // Difference of consecutive prefix sums keeps the exact total.
                *slot = (total * (i + 1) / steps - total * i / steps) as i32;
            }
            step
        })
        .collect()
}

// ── Keyboard ──────────────────────────────────────────────────────────────────

pub const KEYBOARD_REPORT_LEN: usize = 8;

/// Number of non-modifier keys one report can hold.
pub const MAX_ROLLOVER: usize = 6;

/// Keys currently held on the virtual keyboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardState {
    modifiers: u8,
    keys: Vec<HidKeyCode>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as held.  Pressing a key that is already held is a no-op.
    ///
    /// # Errors
    ///
    /// [`HidError::RolloverFull`] when six non-modifier keys are already held.
    pub fn press(&mut self, key: HidKeyCode) -> Result<(), HidError> {
        if let Some(bit) = key.modifier_bit() {
            self.modifiers |= bit;
            return Ok(());
        }
        if self.keys.contains(&key) {
            return Ok(());
        }
        if self.keys.len() >= MAX_ROLLOVER {
            return Err(HidError::RolloverFull { max: MAX_ROLLOVER });
        }
        self.keys.push(key);
        Ok(())
    }

    pub fn release(&mut self, key: HidKeyCode) {
        match key.modifier_bit() {
            Some(bit) => self.modifiers &= !bit,
            None => self.keys.retain(|k| *k != key),
        }
    }

    pub fn release_all(&mut self) {
        self.modifiers = 0;
        self.keys.clear();
    }

    pub fn modifiers(&self) -> u8 {
        self.modifiers
    }

    pub fn held_keys(&self) -> &[HidKeyCode] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.keys.is_empty()
    }

    /// Report for the current state; keys appear in press order.
    pub fn report(&self) -> [u8; KEYBOARD_REPORT_LEN] {
        let mut out = [0u8; KEYBOARD_REPORT_LEN];
        out[0] = self.modifiers;
        for (slot, key) in out[2..].iter_mut().zip(&self.keys) {
            *slot = key.as_u8();
        }
        out
    }
}

/// Report with the given modifier byte and held keys.
///
/// # Errors
///
/// [`HidError::RolloverFull`] if more than six non-modifier keys are given.
pub fn keyboard_report(
    modifiers: u8,
    keys: &[HidKeyCode],
) -> Result<[u8; KEYBOARD_REPORT_LEN], HidError> {
    let mut state = KeyboardState {
        modifiers,
        keys: Vec::with_capacity(keys.len()),
    };
    for &key in keys {
        state.press(key)?;
    }
    Ok(state.report())
}

/// The all-keys-released report.
pub const KEYBOARD_RELEASE: [u8; KEYBOARD_REPORT_LEN] = [0; KEYBOARD_REPORT_LEN];

// ── Gamepad ───────────────────────────────────────────────────────────────────

pub const GAMEPAD_REPORT_LEN: usize = 20;

const GAMEPAD_MESSAGE_TYPE: u8 = 0x00;
const GAMEPAD_PACKET_SIZE: u8 = 0x14;

/// Full-scale stick deflection.
pub const STICK_MAX: i16 = 32767;

/// Digital buttons of an XInput gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Start,
    Back,
    LeftThumb,
    RightThumb,
    LeftShoulder,
    RightShoulder,
    Guide,
    A,
    B,
    X,
    Y,
}

impl GamepadButton {
    /// Bit in the 16-bit button word (low byte is report byte 2).
    pub fn mask(self) -> u16 {
        match self {
            GamepadButton::DpadUp => 0x0001,
            GamepadButton::DpadDown => 0x0002,
            GamepadButton::DpadLeft => 0x0004,
            GamepadButton::DpadRight => 0x0008,
            GamepadButton::Start => 0x0010,
            GamepadButton::Back => 0x0020,
            GamepadButton::LeftThumb => 0x0040,
            GamepadButton::RightThumb => 0x0080,
            GamepadButton::LeftShoulder => 0x0100,
            GamepadButton::RightShoulder => 0x0200,
            GamepadButton::Guide => 0x0400,
            GamepadButton::A => 0x1000,
            GamepadButton::B => 0x2000,
            GamepadButton::X => 0x4000,
            GamepadButton::Y => 0x8000,
        }
    }
}

/// D-pad position, including diagonals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dpad {
    #[default]
    Neutral,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl Dpad {
    const ALL_MASK: u16 = 0x000F;

    fn mask(self) -> u16 {
        use GamepadButton::{DpadDown, DpadLeft, DpadRight, DpadUp};
        match self {
            Dpad::Neutral => 0,
            Dpad::Up => DpadUp.mask(),
            Dpad::UpRight => DpadUp.mask() | DpadRight.mask(),
            Dpad::Right => DpadRight.mask(),
            Dpad::DownRight => DpadDown.mask() | DpadRight.mask(),
            Dpad::Down => DpadDown.mask(),
            Dpad::DownLeft => DpadDown.mask() | DpadLeft.mask(),
            Dpad::Left => DpadLeft.mask(),
            Dpad::UpLeft => DpadUp.mask() | DpadLeft.mask(),
        }
    }
}

/// Maps a stick axis in `-1.0..=1.0` to the signed 16-bit report range.
///
/// Out-of-range input is clamped; NaN maps to centre.
pub fn stick_axis(value: f32) -> i16 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * f32::from(STICK_MAX)).round() as i16
}

/// Maps a trigger in `0.0..=1.0` to `0..=255`.
pub fn trigger_value(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Current state of the virtual gamepad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadState {
    buttons: u16,
    left_trigger: u8,
    right_trigger: u8,
    left_stick: (i16, i16),
    right_stick: (i16, i16),
}

impl GamepadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: GamepadButton, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
    }

    pub fn is_pressed(&self, button: GamepadButton) -> bool {
        self.buttons & button.mask() != 0
    }

    /// Replaces all four d-pad bits.
    pub fn set_dpad(&mut self, dpad: Dpad) {
        self.buttons = (self.buttons & !Dpad::ALL_MASK) | dpad.mask();
    }

    /// Sets the left stick from screen coordinates (`+y` is down).
    pub fn set_left_stick(&mut self, x: f32, y: f32) {
        self.left_stick = (stick_axis(x), stick_axis(-y));
    }

    /// Sets the right stick from screen coordinates (`+y` is down).
    pub fn set_right_stick(&mut self, x: f32, y: f32) {
        self.right_stick = (stick_axis(x), stick_axis(-y));
    }

    pub fn set_triggers(&mut self, left: f32, right: f32) {
        self.left_trigger = trigger_value(left);
        self.right_trigger = trigger_value(right);
    }

    pub fn report(&self) -> [u8; GAMEPAD_REPORT_LEN] {
        let mut out = [0u8; GAMEPAD_REPORT_LEN];
        out[0] = GAMEPAD_MESSAGE_TYPE;
        out[1] = GAMEPAD_PACKET_SIZE;
        out[2..4].copy_from_slice(&self.buttons.to_le_bytes());
        out[4] = self.left_trigger;
        out[5] = self.right_trigger;
        out[6..8].copy_from_slice(&self.left_stick.0.to_le_bytes());
        out[8..10].copy_from_slice(&self.left_stick.1.to_le_bytes());
        out[10..12].copy_from_slice(&self.right_stick.0.to_le_bytes());
        out[12..14].copy_from_slice(&self.right_stick.1.to_le_bytes());
        out
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
