//! Pure next-occurrence and week-window computations
//!
//! Every function here is a pure function of "now" plus configuration, so
//! each recurrence is computed independently and tests can inject a fixed
//! clock.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 1.1.0: Saturday/Sunday roll the week window forward to next Monday
//! - 1.0.0: Daily/weekly next-occurrence and midnight computation

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

/// Resolve a local wall-clock instant in `tz`.
///
/// DST policy: an ambiguous wall clock (fall-back) resolves to the earliest
/// instant; a nonexistent wall clock (spring-forward gap) is nudged forward
/// an hour at a time until it exists. Timers therefore fire at the wall-clock
/// instant regardless of elapsed real time.
pub fn at_wall_clock(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let mut local = date.and_time(time);
    loop {
        match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => local = local + Duration::hours(1),
        }
    }
}

/// Next occurrence of a daily time-of-day strictly after `now`.
///
/// If today's occurrence has already passed (or is exactly now), rolls to
/// tomorrow.
pub fn next_daily(now: DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = at_wall_clock(tz, today, at);
    if candidate > now {
        candidate
    } else {
        at_wall_clock(tz, today + Duration::days(1), at)
    }
}

/// Next occurrence of a time-of-day on a target weekday strictly after `now`.
pub fn next_weekly(now: DateTime<Tz>, target: Weekday, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let ahead = (target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let candidate = at_wall_clock(tz, today + Duration::days(ahead), at);
    if candidate > now {
        candidate
    } else {
        at_wall_clock(tz, today + Duration::days(ahead + 7), at)
    }
}

/// The instant one second past the next local midnight.
///
/// The extra second avoids date-boundary ambiguity exactly at midnight.
pub fn next_midnight(now: DateTime<Tz>) -> DateTime<Tz> {
    let next_day = now.date_naive() + Duration::days(1);
    at_wall_clock(now.timezone(), next_day, NaiveTime::MIN) + Duration::seconds(1)
}

/// Monday-to-Friday window for the week of `today`.
///
/// ISO weekday convention with Sunday as day 7: Saturday and Sunday roll
/// forward to the *next* Monday's window.
pub fn week_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let iso = today.weekday().number_from_monday() as i64;
    let monday = if iso > 5 {
        today + Duration::days(8 - iso)
    } else {
        today - Duration::days(iso - 1)
    };
    (monday, monday + Duration::days(4))
}

/// Sleepable duration from `now` until `target`; zero if already past.
pub fn until(now: DateTime<Tz>, target: DateTime<Tz>) -> std::time::Duration {
    (target - now).to_std().unwrap_or(std::time::Duration::ZERO)
}
