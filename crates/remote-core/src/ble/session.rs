//! Per-connection state of an authenticated BLE receiver.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ble::auth::derive_key;
use crate::hid::led::LedState;

/// Report format generation of the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceTier {
    /// 4-byte mouse reports with 8-bit deltas.
    V0,
    /// 6-byte mouse reports with 12-bit deltas.
    V1,
}

impl DeviceTier {
    /// Software major version below 2 selects V0, anything else V1.
    ///
    /// An unparseable version falls back to V0, whose reports every firmware
    /// accepts.
    pub fn from_software_version(version: &str) -> Self {
        match parse_major_minor(version) {
            Some((major, _)) if major >= 2 => DeviceTier::V1,
            _ => DeviceTier::V0,
        }
    }
}

/// Receiver personality.  Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceMode {
    /// Keyboard + mouse.
    #[default]
    Composite,
    /// Xbox 360 compatible gamepad.
    XInput,
}

impl DeviceMode {
    /// Byte used in `CMD_SET_MODE` commands and acknowledgements.
    pub fn code(self) -> u8 {
        match self {
            DeviceMode::Composite => 0x00,
            DeviceMode::XInput => 0x01,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(DeviceMode::Composite),
            0x01 => Some(DeviceMode::XInput),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMode::Composite => f.write_str("composite"),
            DeviceMode::XInput => f.write_str("xinput"),
        }
    }
}

/// Device Information values read once after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub system_id: Vec<u8>,
    pub firmware_version: String,
    pub hardware_revision: String,
    pub software_version: String,
}

/// Extracts `(major, minor)` from strings such as `"2.1"`, `"v2.1.7"`, `"1.0 beta"`.
pub fn parse_major_minor(version: &str) -> Option<(u32, u32)> {
    let trimmed = version.trim().trim_start_matches(|c: char| c == 'v' || c == 'V');
    let mut parts = trimmed.split('.');
    let major = leading_number(parts.next()?)?;
    let minor = leading_number(parts.next()?)?;
    Some((major, minor))
}

fn leading_number(s: &str) -> Option<u32> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

/// State of one authenticated receiver connection.
///
/// Created by the handshake and dropped on disconnect.  After creation only
/// the mode and LED state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleDeviceSession {
    address: String,
    info: DeviceInfo,
    key: [u8; 16],
    tier: DeviceTier,
    mode: DeviceMode,
    leds: LedState,
}

impl BleDeviceSession {
    pub fn new(address: impl Into<String>, info: DeviceInfo) -> Self {
        let key = derive_key(&info.system_id);
        let tier = DeviceTier::from_software_version(&info.software_version);
        Self {
            address: address.into(),
            info,
            key,
            tier,
            mode: DeviceMode::default(),
            leds: LedState::default(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn key(&self) -> &[u8; 16] {
        &self.key
    }

    pub fn tier(&self) -> DeviceTier {
        self.tier
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DeviceMode) {
        self.mode = mode;
    }

    pub fn leds(&self) -> LedState {
        self.leds
    }

    pub fn set_leds(&mut self, leds: LedState) {
        self.leds = leds;
    }

    /// Short description for UI display.
    pub fn describe(&self) -> String {
        format!(
            "fw {} / hw {} / sw {}",
            self.info.firmware_version, self.info.hardware_revision, self.info.software_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(software: &str) -> DeviceInfo {
        DeviceInfo {
            system_id: vec![1, 2, 3, 4, 5, 6, 7, 8],
            firmware_version: "3.0".into(),
            hardware_revision: "B".into(),
            software_version: software.into(),
        }
    }

    #[test]
    fn test_tier_follows_software_major_version() {
        assert_eq!(DeviceTier::from_software_version("1.1"), DeviceTier::V0);
        assert_eq!(DeviceTier::from_software_version("2.0"), DeviceTier::V1);
        assert_eq!(DeviceTier::from_software_version("v3.4.1"), DeviceTier::V1);
        assert_eq!(DeviceTier::from_software_version("garbage"), DeviceTier::V0);
    }

    #[test]
    fn test_parse_major_minor_variants() {
        assert_eq!(parse_major_minor("2.1"), Some((2, 1)));
        assert_eq!(parse_major_minor(" V2.10.3 "), Some((2, 10)));
        assert_eq!(parse_major_minor("1.0 beta"), Some((1, 0)));
        assert_eq!(parse_major_minor("2"), None);
        assert_eq!(parse_major_minor(""), None);
    }

    #[test]
    fn test_new_session_starts_in_composite_with_leds_off() {
        // Arrange / Act
        let session = BleDeviceSession::new("AA:BB", info("2.2"));

        // Assert
        assert_eq!(session.mode(), DeviceMode::Composite);
        assert_eq!(session.leds(), LedState::default());
        assert_eq!(session.tier(), DeviceTier::V1);
        assert_eq!(&session.key()[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&session.key()[8..], &[0; 8]);
    }

    #[test]
    fn test_mode_codes_round_trip() {
        for mode in [DeviceMode::Composite, DeviceMode::XInput] {
            assert_eq!(DeviceMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(DeviceMode::from_code(7), None);
    }
}
