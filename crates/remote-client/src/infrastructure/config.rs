//! TOML-based configuration for the remote input client.
//!
//! Reads and writes [`ClientConfig`] at the platform-appropriate location:
//! - Windows:  `%APPDATA%\RemoteInput\config.toml`
//! - Linux:    `~/.config/remote-input/config.toml`
//! - macOS:    `~/Library/Application Support/RemoteInput/config.toml`
//!
//! Example:
//!
//! ```toml
//! [client]
//! client_id = "android-7f3c"
//! log_level = "debug"
//!
//! [network]
//! heartbeat_interval_ms = 5000
//! reconnect_delays_ms = [500, 1000, 2000, 4000, 8000]
//!
//! [ble]
//! scan_budget_ms = 8000
//! name_keywords = ["emulstick", "emustick"]
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "…")]`, so a missing file, a missing
//! section, or a missing key all fall back to the built-in defaults.  Older
//! files keep working when new keys are added.

use std::path::{Path, PathBuf};
use std::time::Duration;

use remote_core::ble::gatt::DEFAULT_NAME_KEYWORDS;
use remote_core::protocol::frame::DEFAULT_MAX_FRAME_LEN;
use remote_core::protocol::packet::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::infrastructure::ble::manager::BleConfig;
use crate::infrastructure::ble::scanner::ScanConfig;
use crate::infrastructure::network::{ConnectionConfig, MIN_TIMER_PERIOD};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub ble: BleSection,
}

/// Identity and logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Sent as `Source` on every action packet.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Optional `Destination` device id for relayed actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// TCP/RFCOMM connection tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default = "default_port")]
    pub default_port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    /// Backoff schedule; the last entry repeats.
    #[serde(default = "default_reconnect_delays_ms")]
    pub reconnect_delays_ms: Vec<u64>,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
}

/// BLE receiver tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BleSection {
    #[serde(default = "default_scan_budget_ms")]
    pub scan_budget_ms: u64,
    /// Case-insensitive fragments of a receiver's advertised name.
    #[serde(default = "default_name_keywords")]
    pub name_keywords: Vec<String>,
    #[serde(default = "default_mode_switch_timeout_ms")]
    pub mode_switch_timeout_ms: u64,
    #[serde(default = "default_diagnostic_scan_ms")]
    pub diagnostic_scan_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_client_id() -> String {
    format!("remote-{}", Uuid::new_v4().simple())
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_heartbeat_interval_ms() -> u64 {
    5_000
}
fn default_ack_timeout_ms() -> u64 {
    3_000
}
fn default_reconnect_delays_ms() -> Vec<u64> {
    vec![500, 1_000, 2_000, 4_000, 8_000]
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}
fn default_scan_budget_ms() -> u64 {
    8_000
}
fn default_name_keywords() -> Vec<String> {
    DEFAULT_NAME_KEYWORDS.iter().map(|k| k.to_string()).collect()
}
fn default_mode_switch_timeout_ms() -> u64 {
    2_000
}
fn default_diagnostic_scan_ms() -> u64 {
    30_000
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            destination: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            default_port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            reconnect_delays_ms: default_reconnect_delays_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_frame_len: default_max_frame_len(),
        }
    }
}

impl Default for BleSection {
    fn default() -> Self {
        Self {
            scan_budget_ms: default_scan_budget_ms(),
            name_keywords: default_name_keywords(),
            mode_switch_timeout_ms: default_mode_switch_timeout_ms(),
            diagnostic_scan_ms: default_diagnostic_scan_ms(),
        }
    }
}

// ── Runtime conversions ───────────────────────────────────────────────────────

impl ClientConfig {
    /// Connection-manager settings for TCP and RFCOMM.
    pub fn connection_config(&self) -> ConnectionConfig {
        let n = &self.network;
        let mut delays: Vec<Duration> = n
            .reconnect_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect();
        if delays.is_empty() {
            delays = default_reconnect_delays_ms()
                .into_iter()
                .map(Duration::from_millis)
                .collect();
        }
        ConnectionConfig {
            client_id: self.client.client_id.clone(),
            destination: self.client.destination.clone(),
            connect_timeout: Duration::from_millis(n.connect_timeout_ms),
            heartbeat_interval: Duration::from_millis(n.heartbeat_interval_ms).max(MIN_TIMER_PERIOD),
            ack_timeout: Duration::from_millis(n.ack_timeout_ms).max(MIN_TIMER_PERIOD),
            reconnect_delays: delays,
            max_reconnect_attempts: n.max_reconnect_attempts,
            max_frame_len: n.max_frame_len,
        }
    }

    /// Scan agent settings.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            budget: Duration::from_millis(self.ble.scan_budget_ms),
            name_keywords: self
                .ble
                .name_keywords
                .iter()
                .map(|k| k.to_ascii_lowercase())
                .collect(),
            ..ScanConfig::default()
        }
    }

    /// BLE manager settings.
    pub fn ble_config(&self) -> BleConfig {
        BleConfig {
            scan: self.scan_config(),
            mode_switch_timeout: Duration::from_millis(self.ble.mode_switch_timeout_ms),
            diagnostic_duration: Duration::from_millis(self.ble.diagnostic_scan_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads a config file, returning `ClientConfig::default()` if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("RemoteInput"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("RemoteInput")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("remote-input"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
