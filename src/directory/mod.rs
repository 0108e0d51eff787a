//! # User Directory Seam
//!
//! Read-only view of user reminder settings. Persistence lives behind
//! [`UserDirectory`]; the scheduler never writes user records.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A user's reminder configuration as stored by the surrounding bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Opaque chat identity the bot delivers messages to.
    pub chat_id: i64,
    /// Wall-clock time of day the daily digest fires.
    pub daily_time: NaiveTime,
    /// Wall-clock time of day the weekly digest fires.
    pub weekly_time: NaiveTime,
    /// Calendar feed link; `None` until the user sets one.
    pub webcal_url: Option<String>,
    /// Reminder lead in minutes, kept as the raw user-supplied string.
    pub reminder_offset: String,
}

impl UserConfig {
    /// Reminder lead in minutes, falling back when unset or unparsable.
    pub fn lead_minutes(&self, fallback: u32) -> u32 {
        self.reminder_offset.trim().parse().unwrap_or(fallback)
    }

    /// The configured feed link, treating an empty string as unset.
    pub fn feed_url(&self) -> Option<&str> {
        self.webcal_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Collaborator that resolves user identities to their current settings.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up one user; `Ok(None)` when no record exists.
    async fn get_user(&self, chat_id: i64) -> Result<Option<UserConfig>>;

    /// All registered users.
    async fn get_all_users(&self) -> Result<Vec<UserConfig>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(offset: &str) -> UserConfig {
        UserConfig {
            chat_id: 1,
            daily_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            weekly_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            webcal_url: None,
            reminder_offset: offset.to_string(),
        }
    }

    #[test]
    fn test_lead_minutes_parses() {
        assert_eq!(user("30").lead_minutes(15), 30);
        assert_eq!(user(" 5 ").lead_minutes(15), 5);
    }

    #[test]
    fn test_lead_minutes_falls_back() {
        assert_eq!(user("").lead_minutes(15), 15);
        assert_eq!(user("soon").lead_minutes(15), 15);
        assert_eq!(user("-10").lead_minutes(15), 15);
    }

    #[test]
    fn test_feed_url_treats_blank_as_unset() {
        let mut u = user("15");
        assert_eq!(u.feed_url(), None);
        u.webcal_url = Some("   ".to_string());
        assert_eq!(u.feed_url(), None);
        u.webcal_url = Some("webcal://example.org/feed.ics".to_string());
        assert_eq!(u.feed_url(), Some("webcal://example.org/feed.ics"));
    }
}
