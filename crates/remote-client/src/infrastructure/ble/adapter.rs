//! Platform BLE adapter port.
//!
//! # Callbacks become events (for beginners)
//!
//! Platform Bluetooth stacks report scan results, characteristic
//! notifications and link loss through callbacks on threads they own.  A
//! platform implementation of [`BleAdapter`] turns each callback into a
//! [`BleEvent`] and pushes it into an `mpsc` channel.  The receiving end is
//! handed to the [`BleManager`](super::manager::BleManager), whose event pump
//! is the only consumer.  Request/response operations (connect, read, write)
//! are plain `async fn`s on the trait.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::AdapterError;

/// One advertisement seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    /// Local name, when the advertisement carries one.
    pub name: Option<String>,
    pub rssi: i16,
    pub service_uuids: Vec<Uuid>,
    /// `(company id, payload)` pairs.
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

impl Advertisement {
    pub fn advertises(&self, service: Uuid) -> bool {
        self.service_uuids.contains(&service)
    }
}

/// Which advertisements the platform should deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    /// Empty means unfiltered.
    pub service_uuids: Vec<Uuid>,
}

impl ScanFilter {
    pub fn service(uuid: Uuid) -> Self {
        Self {
            service_uuids: vec![uuid],
        }
    }

    pub fn unfiltered() -> Self {
        Self::default()
    }

    pub fn is_unfiltered(&self) -> bool {
        self.service_uuids.is_empty()
    }
}

/// Radio duty cycle requested for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    LowLatency,
    Balanced,
}

/// Asynchronous notifications from the platform stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    /// A scan result.
    Advertisement(Advertisement),
    /// A characteristic value notification.
    Notification { uuid: Uuid, value: Vec<u8> },
    /// The GATT link to `address` dropped.
    Disconnected { address: String },
}

/// Request/response half of a platform BLE stack.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// `false` when the app lacks the runtime permission to scan or connect.
    fn permission_granted(&self) -> bool;

    /// `false` when the platform requires location services for scanning and
    /// they are switched off.
    fn location_services_enabled(&self) -> bool;

    /// Starts delivering [`BleEvent::Advertisement`]s.
    async fn start_scan(&self, filter: &ScanFilter, mode: ScanMode) -> Result<(), AdapterError>;

    async fn stop_scan(&self) -> Result<(), AdapterError>;

    /// Opens a GATT connection and discovers services.
    async fn connect(&self, address: &str) -> Result<(), AdapterError>;

    async fn disconnect(&self, address: &str) -> Result<(), AdapterError>;

    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>, AdapterError>;

    /// Resolves when the platform reports write-complete.
    async fn write_characteristic(&self, uuid: Uuid, value: &[u8]) -> Result<(), AdapterError>;

    /// Subscribes to [`BleEvent::Notification`]s for `uuid`.
    async fn enable_notifications(&self, uuid: Uuid) -> Result<(), AdapterError>;

    /// Name the platform has cached for `address` (GAP device name), if any.
    async fn device_name(&self, address: &str) -> Result<Option<String>, AdapterError>;
}
