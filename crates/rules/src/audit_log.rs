//! In-memory structured audit log for rule sessions.
//!
//! Keeps per-rule entries capped at a configurable maximum (default 500)
//! with FIFO eviction. This is where skipped actions, definition errors and
//! lifecycle transitions are reported. Clones share the same store, and
//! `std::sync::RwLock` lets both the async runner and synchronous session
//! code write to it.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default per-rule cap.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Severity level for audit entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Stage of rule processing that produced the entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Deploy, undeploy, enable and disable transitions.
    Lifecycle,
    /// Rule could not be compiled.
    Definition,
    /// Rule fired or reported `otherwise` candidates.
    Trigger,
    /// Facts held back by recurrence or reset.
    Recurrence,
    TargetResolution,
    Dispatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    pub level: LogLevel,
    pub phase: ExecutionPhase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Filters for [`AuditLog::query`]. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQueryParams {
    /// Minimum level, inclusive.
    pub level: Option<LogLevel>,
    pub phase: Option<ExecutionPhase>,
    /// Defaults to 100.
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: Arc<RwLock<HashMap<String, VecDeque<AuditEntry>>>>,
    max_entries_per_rule: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// A cap of zero is raised to one.
    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries_per_rule: max.max(1),
        }
    }

    pub fn record(
        &self,
        at: DateTime<Utc>,
        rule_id: &str,
        level: LogLevel,
        phase: ExecutionPhase,
        message: impl Into<String>,
    ) {
        self.record_with_details(at, rule_id, level, phase, message, None);
    }

    pub fn record_with_details(
        &self,
        at: DateTime<Utc>,
        rule_id: &str,
        level: LogLevel,
        phase: ExecutionPhase,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        let entry = AuditEntry {
            timestamp: at,
            rule_id: rule_id.to_string(),
            level,
            phase,
            message: message.into(),
            details,
        };

        let mut guard = self.entries.write().expect("audit_log lock poisoned");
        let deque = guard.entry(rule_id.to_string()).or_default();
        deque.push_back(entry);
        while deque.len() > self.max_entries_per_rule {
            deque.pop_front();
        }
    }

    /// Entries for one rule, newest first.
    pub fn query(&self, rule_id: &str, params: &LogQueryParams) -> Vec<AuditEntry> {
        let guard = self.entries.read().expect("audit_log lock poisoned");
        let Some(deque) = guard.get(rule_id) else {
            return Vec::new();
        };

        deque
            .iter()
            .rev()
            .filter(|e| params.level.map_or(true, |l| e.level >= l))
            .filter(|e| params.phase.map_or(true, |p| e.phase == p))
            .filter(|e| params.since.map_or(true, |s| e.timestamp >= s))
            .take(params.limit.unwrap_or(100))
            .cloned()
            .collect()
    }

    /// Ids of every rule with at least one entry, sorted.
    pub fn rule_ids(&self) -> Vec<String> {
        let guard = self.entries.read().expect("audit_log lock poisoned");
        guard
            .keys()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn clear(&self, rule_id: &str) {
        let mut guard = self.entries.write().expect("audit_log lock poisoned");
        guard.remove(rule_id);
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
