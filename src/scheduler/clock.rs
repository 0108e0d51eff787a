//! Injectable wall-clock source
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 1.0.0: Initial release

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Source of "now" in the scheduler's authoritative timezone.
///
/// All next-occurrence computations are pure functions of this value plus
/// user configuration, so tests can pin the clock and every occurrence is
/// computed independently of prior ones (no drift accumulation).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
}

/// Real wall clock, fixed to one timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        SystemClock { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}
