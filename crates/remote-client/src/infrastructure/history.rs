//! Device-history port.
//!
//! The managers report every successful connection here so the host
//! application can offer recently used devices.  The core only writes; how
//! and where the history is stored is up to the implementation.

use std::sync::Mutex;

use remote_core::DeviceDescriptor;

/// Receives successfully connected devices.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceHistory: Send + Sync {
    fn record_connected(&self, device: DeviceDescriptor);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

impl DeviceHistory for NoHistory {
    fn record_connected(&self, _device: DeviceDescriptor) {}
}

/// Keeps the most recent devices in memory, newest first, without duplicates.
#[derive(Debug)]
pub struct RecentDevices {
    limit: usize,
    devices: Mutex<Vec<DeviceDescriptor>>,
}

impl RecentDevices {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            devices: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the stored devices, newest first.
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.devices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl DeviceHistory for RecentDevices {
    fn record_connected(&self, device: DeviceDescriptor) {
        if let Ok(mut guard) = self.devices.lock() {
            guard.retain(|d| d.id != device.id);
            guard.insert(0, device);
            guard.truncate(self.limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_core::TransportKind;

    #[test]
    fn test_recent_devices_moves_reconnected_device_to_front() {
        // Arrange
        let history = RecentDevices::new(3);
        let a = DeviceDescriptor::new(TransportKind::Tcp, "10.0.0.1:9512");
        let b = DeviceDescriptor::new(TransportKind::Ble, "AA:BB:CC:DD:EE:FF");

        // Act
        history.record_connected(a.clone());
        history.record_connected(b.clone());
        history.record_connected(a.clone());

        // Assert
        assert_eq!(history.devices(), vec![a, b]);
    }

    #[test]
    fn test_recent_devices_respects_limit() {
        let history = RecentDevices::new(2);
        for i in 0..5 {
            history.record_connected(DeviceDescriptor::new(
                TransportKind::Tcp,
                format!("10.0.0.{i}:9512"),
            ));
        }
        let devices = history.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "10.0.0.4:9512");
    }

    #[test]
    fn test_mock_history_expectation() {
        let mut mock = MockDeviceHistory::new();
        mock.expect_record_connected()
            .withf(|d| d.transport == TransportKind::Rfcomm)
            .times(1)
            .return_const(());
        mock.record_connected(DeviceDescriptor::new(TransportKind::Rfcomm, "00:11:22:33:44:55"));
    }
}
