//! [`RecurrenceTracker`]: per (rule, fact) trigger history for one session.

use std::collections::{BTreeSet, HashMap, HashSet};

use assetflow_core::{AssetId, AssetState, FactKey};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::entry::{TrackerRecord, TrackerSnapshot, TriggerHistoryEntry};
use super::policy::{RecurrenceGate, RecurrencePolicy, ResetPolicy};

#[derive(Debug, Default)]
pub struct RecurrenceTracker {
    entries: HashMap<String, HashMap<FactKey, TriggerHistoryEntry>>,
    /// Last firing of each rule, whatever fact caused it.
    rule_fired: HashMap<String, DateTime<Utc>>,
    /// (tag, asset) pairs already reported through `otherwise`, per rule.
    unmatched: HashMap<String, BTreeSet<(String, AssetId)>>,
}

fn minutes_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, mins: u32) -> bool {
    now.signed_duration_since(since) >= Duration::minutes(i64::from(mins))
}

impl RecurrenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// History entry for a fact. An entry stamped in the future is corrupt
    /// and reads as absent.
    fn entry(&self, rule_id: &str, key: &FactKey, now: DateTime<Utc>) -> Option<&TriggerHistoryEntry> {
        let entry = self.entries.get(rule_id)?.get(key)?;
        if entry.last_fired_at > now {
            warn!(
                rule_id = %rule_id,
                fact = %key,
                "trigger history stamped in the future, treating fact as first-time"
            );
            return None;
        }
        Some(entry)
    }

    /// Rule-level cadence check: has the rule waited long enough since it
    /// last fired at all? Used for `GLOBAL` scope and timer triggers.
    pub fn rule_gate_open(&self, rule_id: &str, policy: &RecurrencePolicy, now: DateTime<Utc>) -> bool {
        let Some(last) = self.rule_fired.get(rule_id).filter(|t| **t <= now) else {
            return true;
        };
        match policy.gate {
            RecurrenceGate::Always => true,
            RecurrenceGate::Never => false,
            RecurrenceGate::Minutes(m) => minutes_elapsed(*last, now, m),
        }
    }

    /// Whether `fact` may fire `rule_id` now.
    ///
    /// First-time facts are eligible. A fact that already fired must pass
    /// the recurrence gate and at least one active reset condition.
    /// `recurrence.mins = null` beats every reset.
    pub fn is_eligible(
        &self,
        rule_id: &str,
        recurrence: &RecurrencePolicy,
        reset: &ResetPolicy,
        fact: &AssetState,
        now: DateTime<Utc>,
    ) -> bool {
        if recurrence.is_global() && !self.rule_gate_open(rule_id, recurrence, now) {
            return false;
        }
        let Some(entry) = self.entry(rule_id, &fact.key(), now) else {
            return true;
        };
        match recurrence.gate {
            RecurrenceGate::Never => return false,
            RecurrenceGate::Minutes(m)
                if !recurrence.is_global() && !minutes_elapsed(entry.last_fired_at, now, m) =>
            {
                return false
            }
            _ => {}
        }
        Self::reset_satisfied(reset, entry, fact, now)
    }

    fn reset_satisfied(
        reset: &ResetPolicy,
        entry: &TriggerHistoryEntry,
        fact: &AssetState,
        now: DateTime<Utc>,
    ) -> bool {
        if reset.never {
            return false;
        }
        let timer_expired = reset.timer.is_some_and(|d| {
            Duration::from_std(d).is_ok_and(|d| now.signed_duration_since(entry.last_fired_at) >= d)
        });
        timer_expired
            || (reset.no_longer_matches && entry.reset_armed)
            || (reset.timestamp_changes && fact.timestamp != entry.last_timestamp)
            || (reset.value_changes && fact.value != entry.last_value)
    }

    /// Arm the `noLongerMatches` reset for every fired fact of `rule_id`
    /// that is absent from this cycle's matched set.
    pub fn observe(&mut self, rule_id: &str, matched: &HashSet<FactKey>) {
        let Some(entries) = self.entries.get_mut(rule_id) else {
            return;
        };
        for (key, entry) in entries.iter_mut() {
            if !entry.reset_armed && !matched.contains(key) {
                debug!(rule_id = %rule_id, fact = %key, "fact no longer matches, reset armed");
                entry.reset_armed = true;
            }
        }
    }

    /// Record a firing of `rule_id` for `facts` at `now`.
    ///
    /// The rule-level timestamp is updated even when `facts` is empty
    /// (timer-only firings).
    pub fn record_firing<'a, I>(&mut self, rule_id: &str, facts: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a AssetState>,
    {
        let entries = self.entries.entry(rule_id.to_string()).or_default();
        for fact in facts {
            entries.insert(
                fact.key(),
                TriggerHistoryEntry {
                    last_fired_at: now,
                    last_value: fact.value.clone(),
                    last_timestamp: fact.timestamp,
                    reset_armed: false,
                },
            );
        }
        self.rule_fired.insert(rule_id.to_string(), now);
    }

    /// Drop history for facts that left the fact store.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, live: &HashSet<FactKey>) -> usize {
        let mut removed = 0;
        for entries in self.entries.values_mut() {
            let before = entries.len();
            entries.retain(|key, _| live.contains(key));
            removed += before - entries.len();
        }
        let live_assets: HashSet<&str> = live.iter().map(|k| k.asset_id.as_str()).collect();
        for pairs in self.unmatched.values_mut() {
            pairs.retain(|(_, asset)| live_assets.contains(asset.as_str()));
        }
        removed
    }

    /// Discard all state of an undeployed rule.
    pub fn forget_rule(&mut self, rule_id: &str) {
        self.entries.remove(rule_id);
        self.rule_fired.remove(rule_id);
        self.unmatched.remove(rule_id);
    }

    // ── Otherwise de-duplication ────────────────────────────────────

    /// Forget `otherwise` reports for assets that matched `tag` again.
    pub fn clear_unmatched<'a, I>(&mut self, rule_id: &str, tag: &str, matched: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let Some(pairs) = self.unmatched.get_mut(rule_id) else {
            return;
        };
        for asset in matched {
            pairs.remove(&(tag.to_string(), asset.to_string()));
        }
    }

    /// Candidates not yet reported through `otherwise` for `tag`.
    pub fn fresh_unmatched<'a, I>(&self, rule_id: &str, tag: &str, candidates: I) -> BTreeSet<AssetId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let seen = self.unmatched.get(rule_id);
        candidates
            .into_iter()
            .filter(|asset| {
                !seen.is_some_and(|s| s.contains(&(tag.to_string(), asset.to_string())))
            })
            .map(str::to_string)
            .collect()
    }

    pub fn record_unmatched<'a, I>(&mut self, rule_id: &str, tag: &str, assets: I)
    where
        I: IntoIterator<Item = &'a AssetId>,
    {
        let pairs = self.unmatched.entry(rule_id.to_string()).or_default();
        pairs.extend(assets.into_iter().map(|a| (tag.to_string(), a.clone())));
    }

    // ── Inspection & persistence ────────────────────────────────────

    pub fn get(&self, rule_id: &str, key: &FactKey) -> Option<&TriggerHistoryEntry> {
        self.entries.get(rule_id)?.get(key)
    }

    pub fn last_rule_firing(&self, rule_id: &str) -> Option<DateTime<Utc>> {
        self.rule_fired.get(rule_id).copied()
    }

    /// Number of history entries held for a rule.
    pub fn entry_count(&self, rule_id: &str) -> usize {
        self.entries.get(rule_id).map_or(0, HashMap::len)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let mut records: Vec<TrackerRecord> = self
            .entries
            .iter()
            .flat_map(|(rule_id, entries)| {
                entries.iter().map(move |(fact, entry)| TrackerRecord {
                    rule_id: rule_id.clone(),
                    fact: fact.clone(),
                    entry: entry.clone(),
                })
            })
            .collect();
        records.sort_by(|a, b| (&a.rule_id, &a.fact).cmp(&(&b.rule_id, &b.fact)));
        TrackerSnapshot {
            records,
            rule_fired: self
                .rule_fired
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Load a snapshot, replacing current state.
    ///
    /// Records stamped after `now` are corrupt and skipped, so their facts
    /// read as first-time eligible. Returns the number of records kept.
    pub fn restore(&mut self, snapshot: TrackerSnapshot, now: DateTime<Utc>) -> usize {
        self.entries.clear();
        self.rule_fired.clear();
        self.unmatched.clear();

        let mut kept = 0;
        for record in snapshot.records {
            if record.entry.last_fired_at > now {
                warn!(
                    rule_id = %record.rule_id,
                    fact = %record.fact,
                    "skipping trigger history stamped in the future"
                );
                continue;
            }
            self.entries
                .entry(record.rule_id)
                .or_default()
                .insert(record.fact, record.entry);
            kept += 1;
        }
        for (rule_id, at) in snapshot.rule_fired {
            if at <= now {
                self.rule_fired.insert(rule_id, at);
            }
        }
        kept
    }
}
