//! [`TimerScheduler`]: timer condition state for one rule session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::entry::TimerEntry;
use super::TimerSchedule;

/// Tracks every timer condition of the deployed rules, keyed by (rule, tag).
#[derive(Debug, Default)]
pub struct TimerScheduler {
    entries: HashMap<(String, String), TimerEntry>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add a timer condition whose first window starts at `now`.
    ///
    /// Re-registering the same expression keeps the existing window.
    pub fn register(
        &mut self,
        rule_id: &str,
        tag: &str,
        expression: &str,
        schedule: TimerSchedule,
        now: DateTime<Utc>,
    ) {
        let key = (rule_id.to_string(), tag.to_string());
        if let Some(existing) = self.entries.get(&key) {
            if existing.expression == expression {
                return;
            }
        }
        debug!(rule_id = %rule_id, tag = %tag, timer = %expression, "registered timer");
        self.entries.insert(
            key,
            TimerEntry {
                rule_id: rule_id.to_string(),
                tag: tag.to_string(),
                expression: expression.to_string(),
                schedule,
                last_fired: now,
            },
        );
    }

    /// Unknown timers are never due.
    pub fn is_due(&self, rule_id: &str, tag: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(&(rule_id.to_string(), tag.to_string()))
            .is_some_and(|e| e.schedule.is_due(now, e.last_fired))
    }

    /// Start a new window at `at`. Unknown timers are ignored.
    pub fn record_fired(&mut self, rule_id: &str, tag: &str, at: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(&(rule_id.to_string(), tag.to_string())) {
            entry.last_fired = at;
        }
    }

    /// Drop every timer belonging to `rule_id`.
    pub fn remove_rule(&mut self, rule_id: &str) {
        self.entries.retain(|(rule, _), _| rule != rule_id);
    }

    /// `(rule_id, tag)` of every timer due at `now`, sorted.
    pub fn due_timers(&self, now: DateTime<Utc>) -> Vec<(&str, &str)> {
        let mut due: Vec<(&str, &str)> = self
            .entries
            .values()
            .filter(|e| e.schedule.is_due(now, e.last_fired))
            .map(|e| (e.rule_id.as_str(), e.tag.as_str()))
            .collect();
        due.sort_unstable();
        due
    }

    pub fn get(&self, rule_id: &str, tag: &str) -> Option<&TimerEntry> {
        self.entries.get(&(rule_id.to_string(), tag.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
