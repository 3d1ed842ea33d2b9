//! Trigger history records and their serializable snapshot.

use std::collections::BTreeMap;

use assetflow_core::FactKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the tracker remembers about the last firing of a rule for one fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerHistoryEntry {
    pub last_fired_at: DateTime<Utc>,
    #[serde(default)]
    pub last_value: Option<Value>,
    pub last_timestamp: DateTime<Utc>,
    /// Set once the fact has been seen not matching since it fired.
    #[serde(default)]
    pub reset_armed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerRecord {
    pub rule_id: String,
    pub fact: FactKey,
    pub entry: TriggerHistoryEntry,
}

/// Exported tracker state, handed to a persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    #[serde(default)]
    pub records: Vec<TrackerRecord>,
    /// Last firing time per rule.
    #[serde(default)]
    pub rule_fired: BTreeMap<String, DateTime<Utc>>,
}
