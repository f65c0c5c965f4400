//! # VKV Telemetry
//!
//! Structured logging setup shared by VKV binaries and test suites.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vkv_telemetry::{init_tracing, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_tracing(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `vkv` | Service name in the startup line |
//! | `VKV_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `VKV_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `VKV_JSON_LOGS` | `false` | JSON lines instead of pretty output |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_test_tracing, init_tracing};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = TelemetryConfig {
            log_level: "vkv=loudest".to_string(),
            ..TelemetryConfig::default()
        };
        match init_tracing(&config) {
            Err(TelemetryError::Config(_)) => {}
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
