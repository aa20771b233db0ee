//! # relay-telemetry
//!
//! Tracing subscriber setup: an `EnvFilter` built from configuration (with
//! `RUST_LOG` taking precedence) feeding either JSON lines or human-readable
//! output on stdout.

#![deny(unsafe_code)]

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directives did not parse.
    #[error("invalid log filter {directives:?}: {source}")]
    Filter {
        /// Directives that failed.
        directives: String,
        /// Parser error.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Filter directives, a bare level (`"info"`) or a list such as
    /// `"info,relay_core=debug"`. Overridden by `RUST_LOG`.
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            json: false,
        }
    }
}

/// Normalize the configured directives: entries are trimmed, blanks dropped,
/// and bare levels lowercased.
pub fn filter_directives(config: &TelemetryConfig) -> String {
    config
        .log_level
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| match d.split_once('=') {
            Some((target, level)) => format!("{target}={}", level.to_lowercase()),
            None => d.to_lowercase(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = filter_directives(config);
            EnvFilter::try_new(&directives)
                .map_err(|source| TelemetryError::Filter { directives, source })?
        }
    };

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()?;
    tracing::debug!(json = config.json, "logging initialized");
    Ok(())
}
