//! Authentication handshake run once per GATT connection.
//!
//! # Flow (for beginners)
//!
//! 1. Read the four Device Information characteristics.
//! 2. Pick the firmware password from the software version.
//! 3. Write the challenge command, read the receiver's 16-byte answer.
//! 4. Compare it with AES-128(System ID, password) computed locally.
//!
//! Only a matching answer yields a [`BleDeviceSession`].  No step is retried.

use remote_core::ble::auth::{expected_response, password_for_version};
use remote_core::ble::gatt::{
    CMD_AUTH_CHALLENGE, COMMAND_UUID, FIRMWARE_REVISION_UUID, HARDWARE_REVISION_UUID,
    SOFTWARE_REVISION_UUID, SYSTEM_ID_UUID,
};
use remote_core::{BleDeviceSession, DeviceInfo};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::adapter::BleAdapter;
use super::error::AuthError;
use super::write_queue::WriteQueue;

/// Reads the Device Information values.
///
/// # Errors
///
/// [`AuthError::MissingDeviceInfo`] naming the first characteristic that
/// could not be read or was empty.
pub async fn read_device_info(adapter: &dyn BleAdapter) -> Result<DeviceInfo, AuthError> {
    let system_id = read_required(adapter, SYSTEM_ID_UUID).await?;
    let firmware_version = read_text(adapter, FIRMWARE_REVISION_UUID).await?;
    let hardware_revision = read_text(adapter, HARDWARE_REVISION_UUID).await?;
    let software_version = read_text(adapter, SOFTWARE_REVISION_UUID).await?;
    Ok(DeviceInfo {
        system_id,
        firmware_version,
        hardware_revision,
        software_version,
    })
}

async fn read_required(adapter: &dyn BleAdapter, uuid: Uuid) -> Result<Vec<u8>, AuthError> {
    match adapter.read_characteristic(uuid).await {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => {
            warn!(%uuid, "device information characteristic is empty");
            Err(AuthError::MissingDeviceInfo(uuid))
        }
        Err(e) => {
            warn!(%uuid, error = %e, "device information read failed");
            Err(AuthError::MissingDeviceInfo(uuid))
        }
    }
}

/// String characteristics may carry trailing NULs from fixed-size buffers.
async fn read_text(adapter: &dyn BleAdapter, uuid: Uuid) -> Result<String, AuthError> {
    let raw = read_required(adapter, uuid).await?;
    let text = String::from_utf8_lossy(&raw)
        .trim_end_matches('\0')
        .trim()
        .to_string();
    if text.is_empty() {
        return Err(AuthError::MissingDeviceInfo(uuid));
    }
    Ok(text)
}

/// Runs the full handshake against the connected receiver at `address`.
pub async fn authenticate(
    adapter: &dyn BleAdapter,
    writes: &WriteQueue,
    address: &str,
) -> Result<BleDeviceSession, AuthError> {
    let info = read_device_info(adapter).await?;
    info!(
        address,
        firmware = %info.firmware_version,
        hardware = %info.hardware_revision,
        software = %info.software_version,
        "device information read"
    );

    if password_for_version(&info.software_version).is_none() {
        return Err(AuthError::UnsupportedFirmware(info.software_version));
    }
    let expected = expected_response(&info.system_id, &info.software_version)
        .ok_or_else(|| AuthError::UnsupportedFirmware(info.software_version.clone()))?;

    writes
        .write(COMMAND_UUID, &[CMD_AUTH_CHALLENGE])
        .await
        .map_err(AuthError::Ble)?;
    let response = adapter
        .read_characteristic(COMMAND_UUID)
        .await
        .map_err(AuthError::Ble)?;
    debug!(address, len = response.len(), "challenge response received");

    if response.as_slice() != expected.as_slice() {
        warn!(address, "challenge response mismatch");
        return Err(AuthError::Mismatch);
    }

    info!(address, "receiver authenticated");
    Ok(BleDeviceSession::new(address, info))
}
