//! Receiver discovery.
//!
//! # Two phases (for beginners)
//!
//! Some phones drop filtered scan results for receivers whose advertisement
//! omits the service UUID.  The production scan therefore runs up to two
//! phases inside the caller's time budget:
//!
//! 1. **Filtered**: `max(37.5 % of budget, 1 s)`, filtered on the receiver
//!    service UUID, low-latency radio mode.
//! 2. **By name**: only when phase 1 found nothing; unfiltered, keeps devices
//!    whose name contains a known keyword.  Devices that advertise no name
//!    are matched against the name the platform caches for them.
//!
//! Adapter errors in either phase are logged and the scan moves on.  Results
//! are de-duplicated by address.  [`ScanAgent::stop`] ends the scan early;
//! whatever was found until then is returned.
//!
//! The event pump feeds every advertisement into
//! [`ScanAgent::on_advertisement`]; the scan in progress consumes them.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use remote_core::ble::gatt::{DEFAULT_NAME_KEYWORDS, SERVICE_UUID};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::adapter::{Advertisement, BleAdapter, ScanFilter, ScanMode};
use super::error::BleError;
use crate::infrastructure::logging::{LogSink, Severity};

/// Longest scan or diagnostic window; larger budgets are cut to this.
pub const MAX_SCAN_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

/// Tuning for the production scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// Total time the scan may take.
    pub budget: Duration,
    /// Lower-case substrings identifying a receiver by name.
    pub name_keywords: Vec<String>,
    /// Shortest filtered phase, budget permitting.
    pub min_filtered_phase: Duration,
    /// Share of the budget given to the filtered phase.
    pub filtered_ratio: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(8),
            name_keywords: DEFAULT_NAME_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            min_filtered_phase: Duration::from_secs(1),
            filtered_ratio: 0.375,
        }
    }
}

impl ScanConfig {
    /// Budget actually used, at most [`MAX_SCAN_BUDGET`].
    pub fn effective_budget(&self) -> Duration {
        self.budget.min(MAX_SCAN_BUDGET)
    }

    /// Length of phase 1.
    pub fn filtered_phase(&self) -> Duration {
        let budget = self.effective_budget();
        budget
            .mul_f64(self.filtered_ratio.clamp(0.0, 1.0))
            .max(self.min_filtered_phase)
            .min(budget)
    }

    /// Case-insensitive keyword match.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.name_keywords
            .iter()
            .any(|k| !k.is_empty() && name.contains(&k.to_lowercase()))
    }

    fn looks_like_receiver(&self, ad: &Advertisement) -> bool {
        ad.advertises(SERVICE_UUID) || ad.name.as_deref().is_some_and(|n| self.matches_name(n))
    }
}

/// Outcome of a diagnostic scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDiagnosis {
    /// The app may not scan at all.
    PermissionDenied,
    /// Scanning requires location services, which are off.
    LocationServiceDisabled,
    /// Nothing at all was heard; typical of OEM background scan throttling.
    NoAdvertisements,
    /// Other devices were heard, the receiver was not.
    ReceiverNotSeen { advertisers: usize },
    /// The receiver advertised.
    ReceiverVisible { address: String, rssi: i16 },
}

struct ActiveScan {
    adverts: mpsc::UnboundedSender<Advertisement>,
    stop: Option<oneshot::Sender<()>>,
}

/// Clears the active scan slot when the scan ends, however it ends.
struct ScanSlot<'a>(&'a StdMutex<Option<ActiveScan>>);

impl Drop for ScanSlot<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = None;
        }
    }
}

enum Next {
    Advert(Advertisement),
    Stopped,
    Elapsed,
}

async fn next_advert(
    adverts: &mut mpsc::UnboundedReceiver<Advertisement>,
    stop: &mut oneshot::Receiver<()>,
    until: Instant,
) -> Next {
    tokio::select! {
        biased;
        _ = stop => Next::Stopped,
        ad = adverts.recv() => ad.map_or(Next::Stopped, Next::Advert),
        _ = time::sleep_until(until) => Next::Elapsed,
    }
}

/// Runs scans and collects their results.
#[derive(Default)]
pub struct ScanAgent {
    active: StdMutex<Option<ActiveScan>>,
}

impl ScanAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scanning(&self) -> bool {
        self.active.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Delivers an advertisement to the scan in progress, if any.
    pub fn on_advertisement(&self, ad: Advertisement) {
        if let Ok(slot) = self.active.lock() {
            if let Some(active) = slot.as_ref() {
                let _ = active.adverts.send(ad);
            }
        }
    }

    /// Ends the scan in progress early.  Returns `false` when none was running.
    pub fn stop(&self) -> bool {
        let Ok(mut slot) = self.active.lock() else {
            return false;
        };
        match slot.as_mut().and_then(|active| active.stop.take()) {
            Some(stop) => stop.send(()).is_ok(),
            None => false,
        }
    }

    fn begin(
        &self,
    ) -> Result<
        (
            ScanSlot<'_>,
            mpsc::UnboundedReceiver<Advertisement>,
            oneshot::Receiver<()>,
        ),
        BleError,
    > {
        let mut slot = self
            .active
            .lock()
            .map_err(|_| BleError::ScanInProgress)?;
        if slot.is_some() {
            return Err(BleError::ScanInProgress);
        }
        let (adverts_tx, adverts_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        *slot = Some(ActiveScan {
            adverts: adverts_tx,
            stop: Some(stop_tx),
        });
        Ok((ScanSlot(&self.active), adverts_rx, stop_rx))
    }

    /// Runs the two-phase production scan.
    ///
    /// # Errors
    ///
    /// [`BleError::PermissionDenied`] before scanning, [`BleError::ScanInProgress`]
    /// when another scan runs.  Adapter failures inside a phase are not errors.
    pub async fn scan(
        &self,
        adapter: &dyn BleAdapter,
        config: &ScanConfig,
        log: &dyn LogSink,
    ) -> Result<Vec<Advertisement>, BleError> {
        if !adapter.permission_granted() {
            return Err(BleError::PermissionDenied);
        }
        let (_slot, mut adverts, mut stop) = self.begin()?;

        let started = Instant::now();
        let deadline = started + config.effective_budget();
        let mut found: Vec<Advertisement> = Vec::new();
        let mut stopped = false;

        // ── Phase 1: filtered on the service UUID ────────────────────────────
        let phase_one_end = started + config.filtered_phase();
        info!(duration = ?config.filtered_phase(), "scan phase 1 (service filter)");
        match adapter
            .start_scan(&ScanFilter::service(SERVICE_UUID), ScanMode::LowLatency)
            .await
        {
            Ok(()) => {
                loop {
                    match next_advert(&mut adverts, &mut stop, phase_one_end).await {
                        Next::Advert(ad) => {
                            if ad.advertises(SERVICE_UUID) && !contains(&found, &ad.address) {
                                debug!(address = %ad.address, rssi = ad.rssi, "receiver found by service");
                                found.push(ad);
                            }
                        }
                        Next::Stopped => {
                            stopped = true;
                            break;
                        }
                        Next::Elapsed => break,
                    }
                }
                if let Err(e) = adapter.stop_scan().await {
                    warn!(error = %e, "stopping phase 1 scan failed");
                }
            }
            Err(e) => {
                warn!(error = %e, "phase 1 scan failed");
                log.log(&format!("filtered scan failed: {e}"), Severity::Warning);
            }
        }

        // ── Phase 2: unfiltered, match by name ───────────────────────────────
        if found.is_empty() && !stopped && Instant::now() < deadline {
            info!(remaining = ?deadline.saturating_duration_since(Instant::now()), "scan phase 2 (name match)");
            match adapter
                .start_scan(&ScanFilter::unfiltered(), ScanMode::Balanced)
                .await
            {
                Ok(()) => {
                    let mut rejected: HashSet<String> = HashSet::new();
                    loop {
                        match next_advert(&mut adverts, &mut stop, deadline).await {
                            Next::Advert(ad) => {
                                if contains(&found, &ad.address) || rejected.contains(&ad.address) {
                                    continue;
                                }
                                let name = match &ad.name {
                                    Some(name) => Some(name.clone()),
                                    None => match time::timeout_at(deadline, adapter.device_name(&ad.address)).await {
                                        Ok(Ok(name)) => name,
                                        Ok(Err(e)) => {
                                            debug!(address = %ad.address, error = %e, "name lookup failed");
                                            None
                                        }
                                        Err(_) => {
                                            debug!(address = %ad.address, "name lookup outlived the scan budget");
                                            None
                                        }
                                    },
                                };
                                if name.as_deref().is_some_and(|n| config.matches_name(n)) {
                                    debug!(address = %ad.address, ?name, "receiver found by name");
                                    found.push(ad);
                                } else {
                                    rejected.insert(ad.address);
                                }
                            }
                            Next::Stopped | Next::Elapsed => break,
                        }
                    }
                    if let Err(e) = adapter.stop_scan().await {
                        warn!(error = %e, "stopping phase 2 scan failed");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "phase 2 scan failed");
                    log.log(&format!("name scan failed: {e}"), Severity::Warning);
                }
            }
        }

        info!(count = found.len(), "scan finished");
        log.log(&format!("scan found {} receiver(s)", found.len()), Severity::Info);
        Ok(found)
    }

    /// Listens to everything for `duration` and reports why the receiver
    /// may be invisible.  Every advertisement is logged.
    pub async fn diagnose(
        &self,
        adapter: &dyn BleAdapter,
        config: &ScanConfig,
        duration: Duration,
        log: &dyn LogSink,
    ) -> Result<ScanDiagnosis, BleError> {
        if !adapter.permission_granted() {
            return Ok(ScanDiagnosis::PermissionDenied);
        }
        if !adapter.location_services_enabled() {
            return Ok(ScanDiagnosis::LocationServiceDisabled);
        }
        let (_slot, mut adverts, mut stop) = self.begin()?;

        info!(?duration, "diagnostic scan started");
        adapter
            .start_scan(&ScanFilter::unfiltered(), ScanMode::LowLatency)
            .await?;

        let until = Instant::now() + duration.min(MAX_SCAN_BUDGET);
        let mut heard: HashMap<String, Advertisement> = HashMap::new();
        while let Next::Advert(ad) = next_advert(&mut adverts, &mut stop, until).await {
            let line = format!(
                "adv {} name={:?} rssi={} services={:?} manufacturer={:?}",
                ad.address, ad.name, ad.rssi, ad.service_uuids, ad.manufacturer_data
            );
            debug!("{line}");
            log.log(&line, Severity::Debug);
            heard.insert(ad.address.clone(), ad);
        }
        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "stopping diagnostic scan failed");
        }

        let diagnosis = if heard.is_empty() {
            ScanDiagnosis::NoAdvertisements
        } else {
            match heard
                .values()
                .filter(|ad| config.looks_like_receiver(ad))
                .max_by_key(|ad| ad.rssi)
            {
                Some(ad) => ScanDiagnosis::ReceiverVisible {
                    address: ad.address.clone(),
                    rssi: ad.rssi,
                },
                None => ScanDiagnosis::ReceiverNotSeen {
                    advertisers: heard.len(),
                },
            }
        };
        info!(?diagnosis, "diagnostic scan finished");
        log.log(&format!("diagnostic scan: {diagnosis:?}"), Severity::Info);
        Ok(diagnosis)
    }
}

fn contains(found: &[Advertisement], address: &str) -> bool {
    found.iter().any(|ad| ad.address == address)
}
