//! GATT identifiers of the HID receiver.
//!
//! The receiver exposes one vendor service holding a command characteristic
//! (authentication, mode switching), one write-only characteristic per HID
//! report type, and a notify-only LED characteristic.  Firmware identity is
//! read from the standard Device Information characteristics.

use uuid::Uuid;

/// Expands a Bluetooth SIG 16-bit UUID onto the base UUID.
pub const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_0080_5f9b_34fb | ((short as u128) << 96))
}

pub const SERVICE_UUID: Uuid = sig_uuid(0xF800);
pub const COMMAND_UUID: Uuid = sig_uuid(0xF801);
pub const MOUSE_UUID: Uuid = sig_uuid(0xF802);
pub const KEYBOARD_UUID: Uuid = sig_uuid(0xF803);
pub const GAMEPAD_UUID: Uuid = sig_uuid(0xF804);
pub const LED_UUID: Uuid = sig_uuid(0xF805);

/// Device Information: System ID.
pub const SYSTEM_ID_UUID: Uuid = sig_uuid(0x2A23);
/// Device Information: Firmware Revision String.
pub const FIRMWARE_REVISION_UUID: Uuid = sig_uuid(0x2A26);
/// Device Information: Hardware Revision String.
pub const HARDWARE_REVISION_UUID: Uuid = sig_uuid(0x2A27);
/// Device Information: Software Revision String.
pub const SOFTWARE_REVISION_UUID: Uuid = sig_uuid(0x2A28);

/// Command opcode that asks the receiver to publish its challenge response.
pub const CMD_AUTH_CHALLENGE: u8 = 0x50;
/// Command opcode that switches the receiver personality.
pub const CMD_SET_MODE: u8 = 0x51;

/// Status byte of a successful command acknowledgement.
pub const STATUS_OK: u8 = 0x00;

/// Advertised-name fragments that identify a receiver (lower case).
pub const DEFAULT_NAME_KEYWORDS: &[&str] = &["emulstick", "emustick"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_uuid_string_form() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "0000f800-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_device_information_uuids_use_sig_base() {
        assert_eq!(
            SYSTEM_ID_UUID.to_string(),
            "00002a23-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            SOFTWARE_REVISION_UUID.to_string(),
            "00002a28-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_characteristics_are_distinct() {
        let all = [COMMAND_UUID, MOUSE_UUID, KEYBOARD_UUID, GAMEPAD_UUID, LED_UUID];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
