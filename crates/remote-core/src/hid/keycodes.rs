//! USB HID Usage IDs (page 0x07, Keyboard/Keypad page) as sent to the receiver.
//!
//! Reference: USB HID Usage Tables 1.3, Section 10 (Keyboard/Keypad page 0x07).
//!
//! # What is a HID Usage ID? (for beginners)
//!
//! The **USB Human Interface Device (HID)** standard assigns a unique number to
//! every key on a keyboard.  The receiver forwards these numbers to the host
//! unchanged, so the host believes a real USB keyboard is plugged in.
//!
//! | Key          | HID Usage ID |
//! |--------------|-------------|
//! | Letter A     | 0x04        |
//! | Enter        | 0x28        |
//! | Left Ctrl    | 0xE0        |
//!
//! HID codes represent **physical key positions**, not characters.  Which
//! character appears depends on the host's keyboard layout.  [`for_ascii`]
//! assumes the host uses a US layout; characters outside that table are typed
//! with Alt codes instead (see [`crate::hid::text`]).
//!
//! Modifier keys (0xE0–0xE7) never occupy one of the six key slots of a
//! keyboard report; they are folded into the modifier bitmask returned by
//! [`HidKeyCode::modifier_bit`].

use serde::{Deserialize, Serialize};

/// USB HID Usage ID for keyboard keys (page 0x07).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HidKeyCode {
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    BracketLeft = 0x2F,
    BracketRight = 0x30,
    Backslash = 0x31,
    Semicolon = 0x33,
    Quote = 0x34,
    Backquote = 0x35,
    Comma = 0x36,
    Period = 0x37,
    Slash = 0x38,
    CapsLock = 0x39,

    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,

    NumLock = 0x53,
    NumpadDivide = 0x54,
    NumpadMultiply = 0x55,
    NumpadSubtract = 0x56,
    NumpadAdd = 0x57,
    NumpadEnter = 0x58,
    Numpad1 = 0x59,
    Numpad2 = 0x5A,
    Numpad3 = 0x5B,
    Numpad4 = 0x5C,
    Numpad5 = 0x5D,
    Numpad6 = 0x5E,
    Numpad7 = 0x5F,
    Numpad8 = 0x60,
    Numpad9 = 0x61,
    Numpad0 = 0x62,
    NumpadDecimal = 0x63,

    ContextMenu = 0x65,

    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,
}

use HidKeyCode::*;

/// Every variant, in ascending usage order.
const ALL: &[HidKeyCode] = &[
    KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM,
    KeyN, KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9, Digit0,
    Enter, Escape, Backspace, Tab, Space, Minus, Equal, BracketLeft, BracketRight,
    Backslash, Semicolon, Quote, Backquote, Comma, Period, Slash, CapsLock,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    PrintScreen, ScrollLock, Pause, Insert, Home, PageUp, Delete, End, PageDown,
    ArrowRight, ArrowLeft, ArrowDown, ArrowUp,
    NumLock, NumpadDivide, NumpadMultiply, NumpadSubtract, NumpadAdd, NumpadEnter,
    Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8,
    Numpad9, Numpad0, NumpadDecimal, ContextMenu,
    ControlLeft, ShiftLeft, AltLeft, MetaLeft, ControlRight, ShiftRight, AltRight,
    MetaRight,
];

const LETTERS: [HidKeyCode; 26] = [
    KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM,
    KeyN, KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
];

const DIGITS: [HidKeyCode; 10] = [
    Digit0, Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9,
];

const KEYPAD_DIGITS: [HidKeyCode; 10] = [
    Numpad0, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8,
    Numpad9,
];

const FUNCTION_KEYS: [HidKeyCode; 12] = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];

impl HidKeyCode {
    /// Converts a raw usage ID, returning `None` for unassigned values.
    pub fn from_u8(value: u8) -> Option<Self> {
        ALL.iter().copied().find(|k| k.as_u8() == value)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` if this is a modifier key.
    pub fn is_modifier(self) -> bool {
        self.modifier_bit().is_some()
    }

    /// Bit of this key in the keyboard report's modifier byte.
    pub fn modifier_bit(self) -> Option<u8> {
        match self {
            ControlLeft => Some(modifier::LEFT_CTRL),
            ShiftLeft => Some(modifier::LEFT_SHIFT),
            AltLeft => Some(modifier::LEFT_ALT),
            MetaLeft => Some(modifier::LEFT_GUI),
            ControlRight => Some(modifier::RIGHT_CTRL),
            ShiftRight => Some(modifier::RIGHT_SHIFT),
            AltRight => Some(modifier::RIGHT_ALT),
            MetaRight => Some(modifier::RIGHT_GUI),
            _ => None,
        }
    }

    /// Keypad key for decimal digit `d` (0–9).
    pub fn keypad_digit(d: u8) -> Option<Self> {
        KEYPAD_DIGITS.get(usize::from(d)).copied()
    }

    /// Looks up a key by name, case-insensitively.
    ///
    /// Accepts single letters and digits, `F1`–`F12`, the usual names for
    /// editing and navigation keys, and the modifier aliases accepted by the
    /// TCP path (`ctrl`, `shift`, `alt`, `win`/`cmd`/`super`/`meta`).
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() == 1 {
            let b = bytes[0];
            if b.is_ascii_uppercase() {
                return Some(LETTERS[usize::from(b - b'A')]);
            }
            if b.is_ascii_digit() {
                return Some(DIGITS[usize::from(b - b'0')]);
            }
        }
        if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<usize>().ok()) {
            if (1..=12).contains(&n) {
                return Some(FUNCTION_KEYS[n - 1]);
            }
        }
        let key = match upper.as_str() {
            "ENTER" | "RETURN" => Enter,
            "ESC" | "ESCAPE" => Escape,
            "BACKSPACE" | "BACK" => Backspace,
            "TAB" => Tab,
            "SPACE" => Space,
            "CAPSLOCK" | "CAPITAL" => CapsLock,
            "PRINTSCREEN" | "SNAPSHOT" => PrintScreen,
            "SCROLLLOCK" | "SCROLL" => ScrollLock,
            "PAUSE" => Pause,
            "INSERT" | "INS" => Insert,
            "HOME" => Home,
            "PAGEUP" | "PRIOR" => PageUp,
            "DELETE" | "DEL" => Delete,
            "END" => End,
            "PAGEDOWN" | "NEXT" => PageDown,
            "RIGHT" => ArrowRight,
            "LEFT" => ArrowLeft,
            "DOWN" => ArrowDown,
            "UP" => ArrowUp,
            "NUMLOCK" => NumLock,
            "MENU" | "APPS" => ContextMenu,
            "CTRL" | "CONTROL" | "LCTRL" => ControlLeft,
            "SHIFT" | "LSHIFT" => ShiftLeft,
            "ALT" | "OPTION" | "LALT" => AltLeft,
            "WIN" | "LWIN" | "CMD" | "COMMAND" | "SUPER" | "META" => MetaLeft,
            "RCTRL" => ControlRight,
            "RSHIFT" => ShiftRight,
            "RALT" | "ALTGR" => AltRight,
            "RWIN" => MetaRight,
            _ => return None,
        };
        Some(key)
    }
}

/// Modifier byte bits of a keyboard report.
pub mod modifier {
    pub const LEFT_CTRL: u8 = 0x01;
    pub const LEFT_SHIFT: u8 = 0x02;
    pub const LEFT_ALT: u8 = 0x04;
    pub const LEFT_GUI: u8 = 0x08;
    pub const RIGHT_CTRL: u8 = 0x10;
    pub const RIGHT_SHIFT: u8 = 0x20;
    pub const RIGHT_ALT: u8 = 0x40;
    pub const RIGHT_GUI: u8 = 0x80;
}

/// Maps a character to its key and whether Shift is needed on a US layout.
///
/// Returns `None` for anything that is not printable ASCII, newline or tab.
pub fn for_ascii(c: char) -> Option<(HidKeyCode, bool)> {
    if c.is_ascii_lowercase() {
        return Some((LETTERS[(c as u8 - b'a') as usize], false));
    }
    if c.is_ascii_uppercase() {
        return Some((LETTERS[(c as u8 - b'A') as usize], true));
    }
    if c.is_ascii_digit() {
        return Some((DIGITS[(c as u8 - b'0') as usize], false));
    }
    let mapped = match c {
        '\n' | '\r' => (Enter, false),
        '\t' => (Tab, false),
        ' ' => (Space, false),
        '-' => (Minus, false),
        '_' => (Minus, true),
        '=' => (Equal, false),
        '+' => (Equal, true),
        '[' => (BracketLeft, false),
        '{' => (BracketLeft, true),
        ']' => (BracketRight, false),
        '}' => (BracketRight, true),
        '\\' => (Backslash, false),
        '|' => (Backslash, true),
        ';' => (Semicolon, false),
        ':' => (Semicolon, true),
        '\'' => (Quote, false),
        '"' => (Quote, true),
        '`' => (Backquote, false),
        '~' => (Backquote, true),
        ',' => (Comma, false),
        '<' => (Comma, true),
        '.' => (Period, false),
        '>' => (Period, true),
        '/' => (Slash, false),
        '?' => (Slash, true),
        '!' => (Digit1, true),
        '@' => (Digit2, true),
        '#' => (Digit3, true),
        '$' => (Digit4, true),
        '%' => (Digit5, true),
        '^' => (Digit6, true),
        '&' => (Digit7, true),
        '*' => (Digit8, true),
        '(' => (Digit9, true),
        ')' => (Digit0, true),
        _ => return None,
    };
    Some(mapped)
}
