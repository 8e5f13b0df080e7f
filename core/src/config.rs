//! Configuration loaded from environment variables with sensible defaults.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Coordinator and sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long a provisional hold lives before the sweep releases it,
    /// in seconds
    pub hold_timeout_secs: u64,
    /// How often the hold sweeper runs, in seconds
    pub sweep_interval_secs: u64,
    /// Retries for the compensating release after a failed persist
    pub compensation_max_retries: usize,
    /// Quantity ceiling applied when the catalog does not set a lower one
    pub default_max_quantity: u32,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            hold_timeout_secs: env::var("HOLD_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(900), // 15 minutes
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            compensation_max_retries: env::var("COMPENSATION_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            default_max_quantity: env::var("DEFAULT_MAX_QUANTITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Hold lifetime as a `Duration`.
    #[must_use]
    pub const fn hold_timeout(&self) -> Duration {
        Duration::from_secs(self.hold_timeout_secs)
    }

    /// Sweep interval as a `Duration`.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Retry policy for the compensating release.
    #[must_use]
    pub fn compensation_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.compensation_max_retries,
            ..RetryPolicy::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hold_timeout_secs: 900,
            sweep_interval_secs: 60,
            compensation_max_retries: 3,
            default_max_quantity: 10,
            log_level: "info".to_string(),
        }
    }
}
