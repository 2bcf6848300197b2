//! Logging port and `tracing` setup.
//!
//! Domain events (connects, state changes, handshake results) are reported to
//! an injected [`LogSink`] so a host application can show them in its own UI
//! log.  [`TracingLogSink`] forwards them to `tracing`, which is also what the
//! infrastructure uses directly for diagnostic output.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Severity of a [`LogSink`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Receives human-readable domain events.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, severity: Severity);
}

/// Forwards every message to the matching `tracing` macro.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Debug => tracing::debug!(target: "remote_client::events", "{message}"),
            Severity::Info => tracing::info!(target: "remote_client::events", "{message}"),
            Severity::Warning => tracing::warn!(target: "remote_client::events", "{message}"),
            Severity::Error => tracing::error!(target: "remote_client::events", "{message}"),
        }
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `fallback_level` (e.g. `"info"`) is
/// used, and an unparseable level degrades to `info`.
pub fn init_tracing(fallback_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(fallback_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
