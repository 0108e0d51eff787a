//! # Feature: Reminder Scheduling
//!
//! Per-user reminder timers driven by a calendar feed: a daily digest, a
//! weekly digest, per-lecture reminders, and a midnight replanner that
//! refreshes the lecture reminders every day. Recurrence is chained
//! one-shots: each fired timer recomputes its next occurrence from the
//! current wall clock, so occurrences never accumulate drift.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Epoch guard discards replans superseded during a slow fetch
//! - 1.1.0: Per-user locks serialize cancel-then-recreate sequences
//! - 1.0.0: Initial release with daily/weekly digests and lecture reminders

pub mod clock;
pub mod timer;
pub mod times;

use crate::calendar::{clean_title, format_lectures, CalendarSource};
use crate::core::Config;
use crate::directory::{UserConfig, UserDirectory};
use crate::notify::Notifier;
use self::clock::{Clock, SystemClock};
use self::timer::{Timer, TimerState};
use chrono::DateTime;
use chrono_tz::Tz;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const SET_CALENDAR_PROMPT: &str = "Please set your calendar link using /set_calendar";
const NO_LECTURES_TODAY: &str = "No lectures today.";
const NO_LECTURES_THIS_WEEK: &str = "No lectures this week.";

/// The live timers owned by one scheduled user.
///
/// At most one of these exists per chat identity at any instant; replacing
/// it cancels every timer in the old set before the new one is installed.
struct UserTimers {
    /// Monotonic token identifying the schedule that created this set. A
    /// replan whose epoch no longer matches has been superseded and must
    /// discard its work.
    epoch: u64,
    daily: Timer,
    weekly: Timer,
    replanner: Timer,
    lectures: Vec<Timer>,
}

impl UserTimers {
    fn cancel_all(&self) {
        self.daily.cancel();
        self.weekly.cancel();
        self.replanner.cancel();
        for timer in &self.lectures {
            timer.cancel();
        }
    }
}

/// Observable state of one user's timer set, for diagnostics and tests.
#[derive(Debug, Clone, Copy)]
pub struct TimerSetSnapshot {
    pub daily: TimerState,
    pub weekly: TimerState,
    pub replanner: TimerState,
    pub armed_lecture_reminders: usize,
}

struct SchedulerInner {
    config: Config,
    clock: Arc<dyn Clock>,
    directory: Arc<dyn UserDirectory>,
    calendar: Arc<dyn CalendarSource>,
    notifier: Arc<dyn Notifier>,
    /// Sole registry of live scheduling state.
    timers: DashMap<i64, UserTimers>,
    /// Serializes cancel-then-recreate per identity. Entries are never
    /// removed: dropping one while another task still holds a clone would
    /// let two operations run under different locks.
    locks: DashMap<i64, Arc<Mutex<()>>>,
    epochs: AtomicU64,
}

/// Reminder scheduler: owns the identity-to-timer-set mapping and is its
/// sole mutator.
///
/// Cheap to clone; timer callbacks carry a clone so a fired digest can
/// re-arm itself for the next cycle.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        directory: Arc<dyn UserDirectory>,
        calendar: Arc<dyn CalendarSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let clock = Arc::new(SystemClock::new(config.timezone));
        Self::with_clock(config, directory, calendar, notifier, clock)
    }

    /// Construct with an injected clock. Production code wants [`new`];
    /// tests pin "now" through this seam.
    ///
    /// [`new`]: Scheduler::new
    pub fn with_clock(
        config: Config,
        directory: Arc<dyn UserDirectory>,
        calendar: Arc<dyn CalendarSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Scheduler {
            inner: Arc::new(SchedulerInner {
                config,
                clock,
                directory,
                calendar,
                notifier,
                timers: DashMap::new(),
                locks: DashMap::new(),
                epochs: AtomicU64::new(0),
            }),
        }
    }

    /// Schedule every registered user. A user whose record cannot be read
    /// is skipped; a directory failure yields no scheduling at all.
    pub async fn schedule_all(&self) {
        let users = match self.inner.directory.get_all_users().await {
            Ok(users) => users,
            Err(e) => {
                warn!("could not list users for scheduling: {:#}", e);
                return;
            }
        };
        info!("scheduling {} users", users.len());
        for user in users {
            self.schedule_user(user.chat_id).await;
        }
    }

    /// (Re)schedule one user: cancel any existing timer set, arm fresh
    /// daily/weekly digests and the midnight replanner, then replan today's
    /// lecture reminders. No-op when the user record cannot be read.
    ///
    /// Returns a boxed future: the digest callbacks re-await this very
    /// operation to chain the next occurrence, and type erasure is what
    /// keeps that recurrence out of the callback's own future type.
    pub fn schedule_user(&self, chat_id: i64) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let this = self.clone();
        Box::pin(async move { this.schedule_user_inner(chat_id).await })
    }

    async fn schedule_user_inner(&self, chat_id: i64) {
        let lock = self.user_lock(chat_id);
        let guard = lock.lock().await;

        let user = match self.inner.directory.get_user(chat_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("no record for user {}, nothing to schedule", chat_id);
                return;
            }
            Err(e) => {
                warn!("could not read user {}: {:#}", chat_id, e);
                return;
            }
        };

        self.cancel_locked(chat_id);
        let epoch = self.inner.epochs.fetch_add(1, Ordering::Relaxed);
        let now = self.now();

        let daily_at = times::next_daily(now, user.daily_time);
        let daily = {
            let this = self.clone();
            Timer::after(times::until(now, daily_at), async move {
                this.send_daily_digest(chat_id).await;
                this.schedule_user(chat_id).await;
            })
        };

        let weekly_at =
            times::next_weekly(now, self.inner.config.weekly_digest_weekday, user.weekly_time);
        let weekly = {
            let this = self.clone();
            Timer::after(times::until(now, weekly_at), async move {
                this.send_weekly_digest(chat_id).await;
                this.schedule_user(chat_id).await;
            })
        };

        let replanner =
            self.arm_replanner(chat_id, epoch, times::until(now, times::next_midnight(now)));

        self.inner.timers.insert(
            chat_id,
            UserTimers {
                epoch,
                daily,
                weekly,
                replanner,
                lectures: Vec::new(),
            },
        );
        info!(
            "scheduled user {}: daily digest {}, weekly digest {}",
            chat_id, daily_at, weekly_at
        );

        // The immediate replan reacquires the per-user lock itself.
        drop(guard);
        self.replan_lectures(chat_id, epoch).await;
    }

    /// Cancel every timer owned by this user and forget the user. Safe to
    /// call on an identity with no entry.
    pub async fn cancel_user(&self, chat_id: i64) {
        let lock = self.user_lock(chat_id);
        let _guard = lock.lock().await;
        self.cancel_locked(chat_id);
    }

    /// Cancel every scheduled user; called at process shutdown so no timer
    /// fires after the scheduler is torn down.
    pub async fn stop_all(&self) {
        for chat_id in self.scheduled_users() {
            self.cancel_user(chat_id).await;
        }
    }

    pub fn is_scheduled(&self, chat_id: i64) -> bool {
        self.inner.timers.contains_key(&chat_id)
    }

    pub fn scheduled_users(&self) -> Vec<i64> {
        self.inner.timers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn snapshot(&self, chat_id: i64) -> Option<TimerSetSnapshot> {
        self.inner.timers.get(&chat_id).map(|set| TimerSetSnapshot {
            daily: set.daily.state(),
            weekly: set.weekly.state(),
            replanner: set.replanner.state(),
            armed_lecture_reminders: set.lectures.iter().filter(|t| t.is_armed()).count(),
        })
    }

    fn user_lock(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.inner.locks.entry(chat_id).or_default().clone()
    }

    /// Remove and cancel a user's timer set. Caller must hold the user lock.
    fn cancel_locked(&self, chat_id: i64) {
        if let Some((_, timers)) = self.inner.timers.remove(&chat_id) {
            timers.cancel_all();
            debug!("cancelled timer set for user {}", chat_id);
        }
    }

    fn now(&self) -> DateTime<Tz> {
        self.inner.clock.now()
    }

    fn arm_replanner(&self, chat_id: i64, epoch: u64, delay: Duration) -> Timer {
        let this = self.clone();
        Timer::after(delay, async move {
            this.replan_lectures(chat_id, epoch).await;
            this.rearm_replanner(chat_id, epoch).await;
        })
    }

    async fn rearm_replanner(&self, chat_id: i64, epoch: u64) {
        let now = self.now();
        let delay = times::until(now, times::next_midnight(now));
        let lock = self.user_lock(chat_id);
        let _guard = lock.lock().await;
        match self.inner.timers.get_mut(&chat_id) {
            Some(mut entry) if entry.epoch == epoch => {
                entry.replanner = self.arm_replanner(chat_id, epoch, delay);
            }
            // Unscheduled or rescheduled since this replanner was armed.
            _ => {}
        }
    }

    /// Recompute which lecture reminders should be armed for "today".
    ///
    /// Stale timers are cancelled before the calendar is fetched, and the
    /// fresh timers are installed only if the timer set has not been
    /// replaced in the meantime, so a slow fetch can neither race stale
    /// timers nor resurrect a cancelled user. Fetch failures are absorbed:
    /// the next midnight replan self-heals.
    async fn replan_lectures(&self, chat_id: i64, epoch: u64) {
        {
            let lock = self.user_lock(chat_id);
            let _guard = lock.lock().await;
            match self.inner.timers.get_mut(&chat_id) {
                Some(mut entry) if entry.epoch == epoch => {
                    for timer in entry.lectures.drain(..) {
                        timer.cancel();
                    }
                }
                _ => return,
            }
        }

        // No scheduler lock is held from here on: a slow feed must not
        // stall scheduling operations.
        let user = match self.inner.directory.get_user(chat_id).await {
            Ok(Some(user)) => user,
            _ => return,
        };
        let Some(url) = user.feed_url() else {
            return;
        };
        let calendar = match self.inner.calendar.fetch(url).await {
            Ok(calendar) => calendar,
            Err(e) => {
                debug!("replan fetch failed for user {}: {:#}", chat_id, e);
                return;
            }
        };

        let now = self.now();
        let lectures = match calendar.lectures_on(now.date_naive()).await {
            Ok(lectures) => lectures,
            Err(e) => {
                debug!("replan parse failed for user {}: {:#}", chat_id, e);
                return;
            }
        };
        if lectures.is_empty() {
            return;
        }

        let lead_minutes = user.lead_minutes(self.inner.config.default_lead_minutes);
        let lead = chrono::Duration::minutes(lead_minutes as i64);

        let mut armed = Vec::new();
        for lecture in lectures {
            let remind_at = lecture.start - lead;
            // Lead windows that already elapsed get no catch-up reminder.
            if remind_at <= now {
                continue;
            }
            let delay = times::until(now, remind_at);
            let this = self.clone();
            armed.push(Timer::after(delay, async move {
                let text = format!(
                    "⏰ *{}* in {} minutes at {}",
                    clean_title(&lecture.title),
                    lead_minutes,
                    lecture.location
                );
                this.deliver(chat_id, &text).await;
            }));
        }

        let count = armed.len();
        let lock = self.user_lock(chat_id);
        let _guard = lock.lock().await;
        match self.inner.timers.get_mut(&chat_id) {
            Some(mut entry) if entry.epoch == epoch => {
                entry.lectures = armed;
                debug!("armed {} lecture reminders for user {}", count, chat_id);
            }
            _ => {
                // Superseded while fetching; the fetched timers must not fire.
                for timer in &armed {
                    timer.cancel();
                }
            }
        }
    }

    /// Send today's lecture list, or a prompt/error/none message. Read-only
    /// with respect to scheduler state.
    pub async fn send_daily_digest(&self, chat_id: i64) {
        let Some(user) = self.read_user(chat_id).await else {
            return;
        };
        let Some(url) = user.feed_url() else {
            self.deliver(chat_id, SET_CALENDAR_PROMPT).await;
            return;
        };
        let calendar = match self.inner.calendar.fetch(url).await {
            Ok(calendar) => calendar,
            Err(e) => {
                self.deliver(chat_id, &format!("Error fetching calendar: {}", e))
                    .await;
                return;
            }
        };
        let now = self.now();
        let lectures = match calendar.lectures_on(now.date_naive()).await {
            Ok(lectures) => lectures,
            Err(e) => {
                self.deliver(chat_id, &format!("Error processing calendar: {}", e))
                    .await;
                return;
            }
        };
        if lectures.is_empty() {
            self.deliver(chat_id, NO_LECTURES_TODAY).await;
            return;
        }
        let message = format!(
            "*{}:*\n\n{}",
            now.format("%a, %d %b"),
            format_lectures(&lectures)
        );
        self.deliver(chat_id, &message).await;
    }

    /// Send this week's Monday-to-Friday lecture list grouped by day name.
    /// On a weekend the window rolls forward to next week. Read-only with
    /// respect to scheduler state.
    pub async fn send_weekly_digest(&self, chat_id: i64) {
        let Some(user) = self.read_user(chat_id).await else {
            return;
        };
        let Some(url) = user.feed_url() else {
            self.deliver(chat_id, SET_CALENDAR_PROMPT).await;
            return;
        };
        let calendar = match self.inner.calendar.fetch(url).await {
            Ok(calendar) => calendar,
            Err(e) => {
                self.deliver(chat_id, &format!("Error fetching calendar: {}", e))
                    .await;
                return;
            }
        };
        let now = self.now();
        let (monday, friday) = times::week_window(now.date_naive());
        let by_day = match calendar.lectures_in_range(monday, friday).await {
            Ok(by_day) => by_day,
            Err(e) => {
                self.deliver(chat_id, &format!("Error processing calendar: {}", e))
                    .await;
                return;
            }
        };
        if by_day.is_empty() {
            self.deliver(chat_id, NO_LECTURES_THIS_WEEK).await;
            return;
        }
        let mut message = format!(
            "*{} - {}:*\n\n",
            monday.format("%a, %d %b"),
            friday.format("%a, %d %b")
        );
        for day in monday.iter_days().take(5) {
            let name = day.format("%A").to_string();
            if let Some(lectures) = by_day.get(&name) {
                message.push_str(&format!("\n*{}*\n{}", name, format_lectures(lectures)));
            }
        }
        self.deliver(chat_id, &message).await;
    }

    async fn read_user(&self, chat_id: i64) -> Option<UserConfig> {
        match self.inner.directory.get_user(chat_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!("could not read user {}: {:#}", chat_id, e);
                None
            }
        }
    }

    async fn deliver(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.inner.notifier.send_message(chat_id, text).await {
            warn!("failed to deliver message to {}: {:#}", chat_id, e);
        }
    }
}
