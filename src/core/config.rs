//! Scheduler configuration loaded from environment variables
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 1.1.0: Configurable weekly digest weekday
//! - 1.0.0: Timezone and default reminder lead from env

use anyhow::{anyhow, Context, Result};
use chrono::Weekday;
use chrono_tz::Tz;
use std::env;

/// Process-wide scheduler configuration.
///
/// All scheduling decisions (daily rollover, midnight replans, week windows)
/// are made in a single authoritative timezone.
#[derive(Debug, Clone)]
pub struct Config {
    /// Authoritative timezone for all wall-clock computations.
    pub timezone: Tz,
    /// Lead time in minutes used when a user's reminder offset is unset or unparsable.
    pub default_lead_minutes: u32,
    /// Weekday on which the weekly digest fires.
    pub weekly_digest_weekday: Weekday,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timezone: chrono_tz::Europe::London,
            default_lead_minutes: 15,
            weekly_digest_weekday: Weekday::Mon,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `LECTERN_TIMEZONE` (IANA name, default `Europe/London`)
    /// - `LECTERN_DEFAULT_LEAD_MINUTES` (default `15`)
    /// - `LECTERN_WEEKLY_DIGEST_WEEKDAY` (default `monday`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Config::default();

        if let Ok(raw) = env::var("LECTERN_TIMEZONE") {
            config.timezone = raw
                .parse()
                .map_err(|e| anyhow!("invalid LECTERN_TIMEZONE {:?}: {}", raw, e))?;
        }

        if let Ok(raw) = env::var("LECTERN_DEFAULT_LEAD_MINUTES") {
            config.default_lead_minutes = raw
                .parse()
                .with_context(|| format!("invalid LECTERN_DEFAULT_LEAD_MINUTES {:?}", raw))?;
        }

        if let Ok(raw) = env::var("LECTERN_WEEKLY_DIGEST_WEEKDAY") {
            config.weekly_digest_weekday = raw
                .parse()
                .map_err(|_| anyhow!("invalid LECTERN_WEEKLY_DIGEST_WEEKDAY {:?}", raw))?;
        }

        Ok(config)
    }
}
