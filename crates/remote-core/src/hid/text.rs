//! Text-to-keystroke planning.
//!
//! Printable ASCII is typed with its US-layout key (plus Shift when needed).
//! Any other character in the Basic Multilingual Plane is typed as a Windows
//! Alt code: Left Alt is held while the decimal code point is entered on the
//! numeric keypad, and releasing Alt commits the character.  Alt codes only
//! work while NumLock is on, so [`TextPlan::to_reports`] toggles it first when
//! the host reports it off.

use crate::hid::keycodes::{for_ascii, modifier, HidKeyCode};
use crate::hid::report::{HidError, KEYBOARD_RELEASE, KEYBOARD_REPORT_LEN};

/// Highest code point that can be entered as an Alt code.
pub const MAX_ALT_CODE: u32 = 0xFFFF;

/// How one character is typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedChar {
    /// A single key, optionally with Left Shift held.
    Key { key: HidKeyCode, shift: bool },
    /// Decimal code point entered on the keypad while Left Alt is held.
    AltCode(u32),
}

/// Ordered typing plan for a string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPlan {
    chars: Vec<TypedChar>,
}

impl TextPlan {
    /// Plans how to type `text`.
    ///
    /// # Errors
    ///
    /// [`HidError::Unmappable`] for control characters other than newline,
    /// carriage return and tab, and for characters above U+FFFF.
    pub fn new(text: &str) -> Result<Self, HidError> {
        let chars = text
            .chars()
            .map(plan_char)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { chars })
    }

    pub fn chars(&self) -> &[TypedChar] {
        &self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Returns `true` if any character is typed as an Alt code.
    pub fn needs_num_lock(&self) -> bool {
        self.chars.iter().any(|c| matches!(c, TypedChar::AltCode(_)))
    }

    /// Expands the plan into keyboard reports.
    ///
    /// Every key press is followed by a release so repeated characters
    /// register.  When the plan contains Alt codes and `num_lock_on` is
    /// false, a NumLock tap is emitted first.
    pub fn to_reports(&self, num_lock_on: bool) -> Vec<[u8; KEYBOARD_REPORT_LEN]> {
        let mut out = Vec::with_capacity(self.chars.len() * 2 + 2);
        if self.needs_num_lock() && !num_lock_on {
            out.push(single_key(0, HidKeyCode::NumLock));
            out.push(KEYBOARD_RELEASE);
        }
        for typed in &self.chars {
            match *typed {
                TypedChar::Key { key, shift } => {
                    let mods = if shift { modifier::LEFT_SHIFT } else { 0 };
                    out.push(single_key(mods, key));
                    out.push(KEYBOARD_RELEASE);
                }
                TypedChar::AltCode(code) => push_alt_code(&mut out, code),
            }
        }
        out
    }
}

fn plan_char(c: char) -> Result<TypedChar, HidError> {
    if let Some((key, shift)) = for_ascii(c) {
        return Ok(TypedChar::Key { key, shift });
    }
    let code = u32::from(c);
    if c.is_control() || code > MAX_ALT_CODE {
        return Err(HidError::Unmappable(c));
    }
    Ok(TypedChar::AltCode(code))
}

fn single_key(mods: u8, key: HidKeyCode) -> [u8; KEYBOARD_REPORT_LEN] {
    let mut report = [0u8; KEYBOARD_REPORT_LEN];
    report[0] = mods;
    report[2] = key.as_u8();
    report
}

fn push_alt_code(out: &mut Vec<[u8; KEYBOARD_REPORT_LEN]>, code: u32) {
    let alt_only = single_key_mods(modifier::LEFT_ALT);
    out.push(alt_only);
    for digit in code.to_string().bytes() {
        if let Some(key) = HidKeyCode::keypad_digit(digit - b'0') {
            out.push(single_key(modifier::LEFT_ALT, key));
            out.push(alt_only);
        }
    }
    out.push(KEYBOARD_RELEASE);
}

fn single_key_mods(mods: u8) -> [u8; KEYBOARD_REPORT_LEN] {
    let mut report = [0u8; KEYBOARD_REPORT_LEN];
    report[0] = mods;
    report
}
