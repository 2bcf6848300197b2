//! Scripted in-memory [`BleAdapter`] for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use remote_core::ble::gatt::{
    CMD_SET_MODE, COMMAND_UUID, FIRMWARE_REVISION_UUID, LED_UUID,
    HARDWARE_REVISION_UUID, SOFTWARE_REVISION_UUID, SYSTEM_ID_UUID,
};
use remote_core::ble::auth::expected_response;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::adapter::{Advertisement, BleAdapter, BleEvent, ScanFilter, ScanMode};
use super::error::AdapterError;

pub(crate) const SYSTEM_ID: [u8; 8] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];

/// Behaviour of a [`FakeAdapter`].
#[derive(Debug, Clone)]
pub(crate) struct FakeScript {
    pub permission: bool,
    pub location: bool,
    pub connect_error: Option<AdapterError>,
    /// Device Information values; a missing entry makes the read fail.
    pub device_info: HashMap<Uuid, Vec<u8>>,
    /// Value read back from the command characteristic after the challenge.
    /// `None` answers with the correct response for `device_info`.
    pub auth_response: Option<Vec<u8>>,
    /// Status sent back for a mode switch; `None` sends no acknowledgement.
    pub mode_ack_status: Option<u8>,
    pub filtered_ads: Vec<Advertisement>,
    pub unfiltered_ads: Vec<Advertisement>,
    pub fail_scan: bool,
    pub names: HashMap<String, String>,
    pub write_delay: Duration,
    pub fail_writes_to: Option<Uuid>,
    /// How long `device_name` takes to answer.
    pub name_delay: Duration,
    /// LED bits reported as soon as LED notifications are enabled.
    pub leds_on_subscribe: Option<u8>,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            permission: true,
            location: true,
            connect_error: None,
            device_info: device_info("2.1"),
            auth_response: None,
            mode_ack_status: Some(0),
            filtered_ads: Vec::new(),
            unfiltered_ads: Vec::new(),
            fail_scan: false,
            names: HashMap::new(),
            write_delay: Duration::ZERO,
            fail_writes_to: None,
            name_delay: Duration::ZERO,
            leds_on_subscribe: None,
        }
    }
}

pub(crate) fn device_info(software: &str) -> HashMap<Uuid, Vec<u8>> {
    HashMap::from([
        (SYSTEM_ID_UUID, SYSTEM_ID.to_vec()),
        (FIRMWARE_REVISION_UUID, b"3.2".to_vec()),
        (HARDWARE_REVISION_UUID, b"B".to_vec()),
        (SOFTWARE_REVISION_UUID, software.as_bytes().to_vec()),
    ])
}

pub(crate) fn advert(address: &str, name: Option<&str>, services: &[Uuid]) -> Advertisement {
    Advertisement {
        address: address.to_string(),
        name: name.map(str::to_string),
        rssi: -60,
        service_uuids: services.to_vec(),
        manufacturer_data: Vec::new(),
    }
}

pub(crate) struct FakeAdapter {
    script: Mutex<FakeScript>,
    events: mpsc::Sender<BleEvent>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    scans: Mutex<Vec<ScanFilter>>,
    in_flight: Mutex<HashMap<Uuid, (usize, usize)>>,
}

impl FakeAdapter {
    pub fn new(script: FakeScript) -> (Arc<Self>, mpsc::Receiver<BleEvent>) {
        let (events, rx) = mpsc::channel(256);
        let adapter = Arc::new(Self {
            script: Mutex::new(script),
            events,
            writes: Mutex::new(Vec::new()),
            scans: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
        });
        (adapter, rx)
    }

    pub fn script(&self) -> std::sync::MutexGuard<'_, FakeScript> {
        self.script.lock().unwrap()
    }

    pub fn emit(&self, event: BleEvent) {
        self.events.try_send(event).unwrap();
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_to(&self, uuid: Uuid) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|(u, _)| *u == uuid)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn scans(&self) -> Vec<ScanFilter> {
        self.scans.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self, uuid: Uuid) -> usize {
        self.in_flight
            .lock()
            .unwrap()
            .get(&uuid)
            .map(|(_, max)| *max)
            .unwrap_or(0)
    }
}

#[async_trait]
impl BleAdapter for FakeAdapter {
    fn permission_granted(&self) -> bool {
        self.script().permission
    }

    fn location_services_enabled(&self) -> bool {
        self.script().location
    }

    async fn start_scan(&self, filter: &ScanFilter, _mode: ScanMode) -> Result<(), AdapterError> {
        self.scans.lock().unwrap().push(filter.clone());
        let (fail, ads) = {
            let script = self.script();
            let ads = if filter.is_unfiltered() {
                script.unfiltered_ads.clone()
            } else {
                script.filtered_ads.clone()
            };
            (script.fail_scan, ads)
        };
        if fail {
            return Err(AdapterError::Other("scanner unavailable".into()));
        }
        for ad in ads {
            self.emit(BleEvent::Advertisement(ad));
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn connect(&self, _address: &str) -> Result<(), AdapterError> {
        match self.script().connect_error.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn disconnect(&self, _address: &str) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>, AdapterError> {
        let script = self.script();
        if uuid == COMMAND_UUID {
            if let Some(response) = &script.auth_response {
                return Ok(response.clone());
            }
            let system_id = script.device_info.get(&SYSTEM_ID_UUID).cloned().unwrap_or_default();
            let software = script
                .device_info
                .get(&SOFTWARE_REVISION_UUID)
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            return expected_response(&system_id, &software)
                .map(|r| r.to_vec())
                .ok_or_else(|| AdapterError::Gatt("no challenge pending".into()));
        }
        script
            .device_info
            .get(&uuid)
            .cloned()
            .ok_or(AdapterError::CharacteristicUnavailable(uuid))
    }

    async fn write_characteristic(&self, uuid: Uuid, value: &[u8]) -> Result<(), AdapterError> {
        let (delay, fail, ack) = {
            let script = self.script();
            (
                script.write_delay,
                script.fail_writes_to == Some(uuid),
                script.mode_ack_status,
            )
        };
        if fail {
            return Err(AdapterError::Gatt("write rejected".into()));
        }
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let entry = in_flight.entry(uuid).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = entry.1.max(entry.0);
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.writes.lock().unwrap().push((uuid, value.to_vec()));
        if let Some(entry) = self.in_flight.lock().unwrap().get_mut(&uuid) {
            entry.0 -= 1;
        }

        if uuid == COMMAND_UUID && value.len() == 2 && value[0] == CMD_SET_MODE {
            if let Some(status) = ack {
                self.emit(BleEvent::Notification {
                    uuid: COMMAND_UUID,
                    value: vec![CMD_SET_MODE, value[1], status],
                });
            }
        }
        Ok(())
    }

    async fn enable_notifications(&self, uuid: Uuid) -> Result<(), AdapterError> {
        let leds = self.script().leds_on_subscribe;
        if let (true, Some(bits)) = (uuid == LED_UUID, leds) {
            self.emit(BleEvent::Notification {
                uuid: LED_UUID,
                value: vec![bits],
            });
        }
        Ok(())
    }

    async fn device_name(&self, address: &str) -> Result<Option<String>, AdapterError> {
        let delay = self.script().name_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.script().names.get(address).cloned())
    }
}
