//! Timer triggers: interval and cron schedules tracked per rule condition.
//!
//! A timer condition is true once its schedule has come due since the rule
//! last fired (or since deployment). The [`TimerScheduler`] owns that
//! per-condition state for one rule session; the session records a firing
//! with [`record_fired`](TimerScheduler::record_fired) so the next window
//! starts from there.

mod core;
pub(crate) mod cron;
mod entry;

#[cfg(test)]
mod tests;

pub use self::core::TimerScheduler;
pub use self::cron::{parse_duration, TimerSchedule};
pub use self::entry::TimerEntry;
