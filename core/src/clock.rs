//! Clock abstraction so domain code never reads wall time directly.
//!
//! Timestamps flow in through an injected `Arc<dyn Clock>`, which keeps
//! hold-expiry and priority logic deterministic under test.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
