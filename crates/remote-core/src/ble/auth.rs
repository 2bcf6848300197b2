//! AES-128 challenge-response primitives for receiver authentication.
//!
//! # How the handshake proves identity (for beginners)
//!
//! Each receiver has a factory System ID and a firmware-specific password.
//! Both sides compute `AES-128(key = System ID, plaintext = password)`:
//!
//! ```text
//! key       = System ID bytes, zero-padded (or truncated) to 16 bytes
//! plaintext = password bytes, zero-padded to 16 bytes
//! response  = AES-128-ECB-encrypt(key, plaintext)   // one block
//! ```
//!
//! The receiver publishes its result on the command characteristic after we
//! write the challenge opcode; if the bytes equal ours, the receiver runs
//! genuine firmware and will accept HID reports.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Block};

use crate::ble::session::parse_major_minor;

/// AES block and key length in bytes.
pub const AUTH_BLOCK_LEN: usize = 16;

/// Firmware password table keyed by software `(major, minor)`.
const PASSWORDS: &[((u32, u32), &str)] = &[
    ((1, 0), "EMULSTICK"),
    ((1, 1), "EMULSTICK11"),
    ((2, 0), "EMULSTICK20"),
    ((2, 1), "EMULSTICK21"),
    ((2, 2), "EMULSTICK22"),
];

/// Selects the password for a software version string.
///
/// Returns `None` for versions not in the table.
pub fn password_for_version(software_version: &str) -> Option<&'static str> {
    let prefix = parse_major_minor(software_version)?;
    PASSWORDS
        .iter()
        .find(|(version, _)| *version == prefix)
        .map(|(_, password)| *password)
}

/// Builds the AES key from System ID bytes.
pub fn derive_key(system_id: &[u8]) -> [u8; AUTH_BLOCK_LEN] {
    pad_block(system_id)
}

/// Encrypts `password` as a single zero-padded block.
pub fn encrypt_challenge(key: &[u8; AUTH_BLOCK_LEN], password: &str) -> [u8; AUTH_BLOCK_LEN] {
    let cipher = Aes128::new(key.into());
    let mut block = Block::from(pad_block(password.as_bytes()));
    cipher.encrypt_block(&mut block);
    let mut out = [0u8; AUTH_BLOCK_LEN];
    out.copy_from_slice(&block);
    out
}

/// Response a genuine receiver must produce, or `None` for unknown firmware.
pub fn expected_response(system_id: &[u8], software_version: &str) -> Option<[u8; AUTH_BLOCK_LEN]> {
    let password = password_for_version(software_version)?;
    Some(encrypt_challenge(&derive_key(system_id), password))
}

fn pad_block(bytes: &[u8]) -> [u8; AUTH_BLOCK_LEN] {
    let mut out = [0u8; AUTH_BLOCK_LEN];
    let n = bytes.len().min(AUTH_BLOCK_LEN);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_ID: [u8; 8] = [0x11, 0x22, 0x33, 0xFE, 0xFF, 0x44, 0x55, 0x66];

    #[test]
    fn test_password_table() {
        assert_eq!(password_for_version("1.0"), Some("EMULSTICK"));
        assert_eq!(password_for_version("1.1"), Some("EMULSTICK11"));
        assert_eq!(password_for_version("2.0.4"), Some("EMULSTICK20"));
        assert_eq!(password_for_version("2.1"), Some("EMULSTICK21"));
        assert_eq!(password_for_version("2.2"), Some("EMULSTICK22"));
        assert_eq!(password_for_version("3.0"), None);
        assert_eq!(password_for_version("unknown"), None);
    }

    #[test]
    fn test_key_is_zero_padded_or_truncated() {
        assert_eq!(derive_key(&[1, 2]), [1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let long: Vec<u8> = (0..20).collect();
        assert_eq!(derive_key(&long).to_vec(), (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_encryption_matches_fips_197_vector() {
        // Arrange: FIPS-197 Appendix C.1 key and plaintext
        let key: [u8; 16] = core::array::from_fn(|i| i as u8);
        let cipher = Aes128::new((&key).into());
        let mut block = Block::from([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ]);

        // Act
        cipher.encrypt_block(&mut block);

        // Assert
        assert_eq!(
            block.as_slice(),
            &[
                0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
                0xc5, 0x5a
            ]
        );
    }

    #[test]
    fn test_response_is_deterministic_for_fixed_inputs() {
        let a = expected_response(&SYSTEM_ID, "2.1").unwrap();
        let b = expected_response(&SYSTEM_ID, "2.1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_version_2_1_uses_emulstick21() {
        // Arrange
        let key = derive_key(&SYSTEM_ID);

        // Act
        let response = expected_response(&SYSTEM_ID, "2.1").unwrap();

        // Assert
        assert_eq!(response, encrypt_challenge(&key, "EMULSTICK21"));
        assert_ne!(response, encrypt_challenge(&key, "EMULSTICK20"));
    }

    #[test]
    fn test_different_system_ids_give_different_responses() {
        let other = [0u8; 8];
        assert_ne!(
            expected_response(&SYSTEM_ID, "2.2"),
            expected_response(&other, "2.2")
        );
    }

    #[test]
    fn test_unknown_firmware_has_no_expected_response() {
        assert_eq!(expected_response(&SYSTEM_ID, "9.9"), None);
    }
}
