//! Per-condition timer entry type.

use chrono::{DateTime, Utc};

use super::TimerSchedule;

/// Scheduling state for a single timer condition.
#[derive(Debug, Clone)]
pub struct TimerEntry {
    pub rule_id: String,
    /// Tag of the `when` condition carrying the timer.
    pub tag: String,
    /// The expression as authored.
    pub expression: String,
    pub schedule: TimerSchedule,
    /// Start of the current window: deployment time or last firing.
    pub last_fired: DateTime<Utc>,
}
