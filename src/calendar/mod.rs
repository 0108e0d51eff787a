//! # Calendar Seam
//!
//! Domain types and the collaborator trait for reading a user's calendar
//! feed. Feed fetching and iCal parsing live behind [`CalendarSource`]; this
//! crate only consumes the resulting lecture records.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Range queries grouped by day name for the weekly digest
//! - 1.0.0: Initial release with Lecture type and single-day queries

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A single lecture event from a calendar feed.
///
/// Produced fresh on every fetch; never persisted by the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct Lecture {
    pub title: String,
    pub location: String,
    /// Timezone-aware start; all scheduling decisions use this instant.
    pub start: DateTime<Tz>,
    pub end: Option<DateTime<Tz>>,
}

/// A fetched calendar, ready to be queried for lecture events.
#[async_trait]
pub trait CalendarHandle: Send + Sync {
    /// Lectures starting on the given day, in start order.
    async fn lectures_on(&self, day: NaiveDate) -> Result<Vec<Lecture>>;

    /// Lectures between `start` and `end` inclusive, grouped by day name
    /// (`"Monday"`, `"Tuesday"`, ...). Days without lectures are absent.
    async fn lectures_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Vec<Lecture>>>;
}

/// Collaborator that resolves a feed identifier to a queryable calendar.
///
/// Fetch and parse failures are reported as errors; the scheduler decides
/// whether they are user-visible (digests) or silently absorbed (replans).
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch(&self, feed_url: &str) -> Result<Box<dyn CalendarHandle>>;
}

static TRAILING_QUALIFIER: OnceLock<Regex> = OnceLock::new();

/// Strip a trailing bracketed qualifier from a lecture title.
///
/// Feed titles often carry a suffix like `(Lecture)` or `[COMP0005]` that
/// adds noise to a short reminder message.
pub fn clean_title(raw: &str) -> String {
    let re = TRAILING_QUALIFIER
        .get_or_init(|| Regex::new(r"\s*[\[(][^\])]*[\])]\s*$").expect("valid regex"));
    let cleaned = re.replace(raw.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        raw.trim().to_string()
    } else {
        cleaned.to_string()
    }
}

/// Render a list of lectures as Markdown message lines.
///
/// Used by both the daily and the weekly digest.
pub fn format_lectures(lectures: &[Lecture]) -> String {
    let mut out = String::new();
    for lecture in lectures {
        let start = lecture.start.format("%H:%M");
        match &lecture.end {
            Some(end) => out.push_str(&format!(
                "• *{} - {}* {}\n",
                start,
                end.format("%H:%M"),
                clean_title(&lecture.title)
            )),
            None => out.push_str(&format!("• *{}* {}\n", start, clean_title(&lecture.title))),
        }
        if !lecture.location.is_empty() {
            out.push_str(&format!("  📍 {}\n", lecture.location));
        }
    }
    out
}
