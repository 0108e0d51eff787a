// Core layer - configuration and shared types
pub mod core;

// Collaborator seams - calendar feeds, user records, message delivery
pub mod calendar;
pub mod directory;
pub mod notify;

// Scheduling layer - per-user reminder timers
pub mod scheduler;

// Re-export core config for convenience
pub use self::core::Config;

// Re-export collaborator traits and domain types
pub use calendar::{CalendarHandle, CalendarSource, Lecture};
pub use directory::{UserConfig, UserDirectory};
pub use notify::{LogNotifier, Notifier};

// Re-export scheduler items
pub use scheduler::clock::{Clock, SystemClock};
pub use scheduler::timer::{Timer, TimerState};
pub use scheduler::{Scheduler, TimerSetSnapshot};
