//! # Configuration
//!
//! Coordinator and engine settings, loaded from the environment the same way
//! the telemetry crate does.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default capacity of the lifecycle event bus.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default wait for stale connections before an open reports blocked.
pub const DEFAULT_BLOCKED_GRACE: Duration = Duration::from_millis(50);

/// Settings shared by `Coordinator` and `InMemoryEngine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Directory for database snapshots. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// Capacity of the lifecycle event bus.
    pub event_capacity: usize,

    /// How long an upgrading open waits for stale connections to close
    /// before firing the blocked signal.
    pub blocked_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            blocked_grace: DEFAULT_BLOCKED_GRACE,
        }
    }
}

impl CoordinatorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `VKV_DATA_DIR`: snapshot directory (default: unset, in-memory)
    /// - `VKV_EVENT_CAPACITY`: lifecycle bus capacity (default: 256)
    /// - `VKV_BLOCKED_GRACE_MS`: blocked grace period in ms (default: 50)
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var("VKV_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),

            event_capacity: env::var("VKV_EVENT_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|c: &usize| *c > 0)
                .unwrap_or(DEFAULT_EVENT_CAPACITY),

            blocked_grace: env::var("VKV_BLOCKED_GRACE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BLOCKED_GRACE),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_blocked_grace(mut self, grace: Duration) -> Self {
        self.blocked_grace = grace;
        self
    }
}
