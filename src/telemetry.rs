//! Tracing subscriber setup.
//!
//! Settings normally come from the validated [`Config`]. When validation
//! fails the violations still have to be logged, so the entry point falls
//! back to [`LogSettings::from_env`], which reads `RUST_LOG` and
//! `LOG_FORMAT` leniently.

use std::env;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LogFormat};

/// Filter used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(String);

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directive, e.g. `info` or `echo_service=debug,tower_http=warn`
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LogSettings {
    /// Read settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let filter = env::var("RUST_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let format = env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default();

        Self { filter, format }
    }
}

impl From<&Config> for LogSettings {
    fn from(config: &Config) -> Self {
        Self {
            filter: config.log_level.clone(),
            format: config.log_format,
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns `TelemetryError` if a global subscriber is already installed.
pub fn init(settings: &LogSettings) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&settings.filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let result = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .with_target(true)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init(),
    };

    result.map_err(|e| TelemetryError(e.to_string()))
}
