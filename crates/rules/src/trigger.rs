//! Trigger evaluation: compile `when` conditions and partition facts.
//!
//! For every condition of a rule this produces the facts that satisfy it
//! (grouped by asset), and for asset conditions the in-scope assets that
//! failed the attribute predicates (the `otherwise` candidates). Timer
//! conditions only report whether they are due and never produce an
//! `otherwise` partition.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use assetflow_core::{AssetId, AssetState, FactKey};
use chrono::{DateTime, Utc};

use crate::error::DefinitionError;
use crate::evaluator::run_query;
use crate::scheduler::{TimerSchedule, TimerScheduler};
use crate::schema::{AssetQuery, JsonRule, LogicGroup, RuleTrigger};
use crate::store::FactStore;
use crate::tracker::ResetPolicy;

// ── Compiled conditions ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum CompiledTrigger {
    Assets(AssetQuery),
    Timer {
        expression: String,
        schedule: TimerSchedule,
    },
}

/// A `when` leaf ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub tag: String,
    pub trigger: CompiledTrigger,
    /// The condition's own reset, or the rule's.
    pub reset: ResetPolicy,
}

impl CompiledCondition {
    pub fn is_timer(&self) -> bool {
        matches!(self.trigger, CompiledTrigger::Timer { .. })
    }

    pub fn query(&self) -> Option<&AssetQuery> {
        match &self.trigger {
            CompiledTrigger::Assets(q) => Some(q),
            CompiledTrigger::Timer { .. } => None,
        }
    }
}

/// Compile a rule's `when` into its leaves and a tree of leaf indexes.
///
/// Untagged conditions are tagged with their depth-first index. Returns an
/// empty list when the rule has no `when`.
pub fn compile_conditions(
    rule: &JsonRule,
) -> Result<(Vec<CompiledCondition>, LogicGroup<usize>), DefinitionError> {
    let Some(when) = rule.when.as_ref() else {
        return Ok((Vec::new(), LogicGroup::default()));
    };

    let mut conditions = Vec::new();
    let mut seen_tags = HashSet::new();
    for (index, condition) in when.leaves().into_iter().enumerate() {
        let tag = condition
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| index.to_string());
        if !seen_tags.insert(tag.clone()) {
            return Err(DefinitionError::DuplicateTag(tag));
        }

        let trigger = match condition.trigger() {
            Some(RuleTrigger::Assets(query)) => CompiledTrigger::Assets(query.clone()),
            Some(RuleTrigger::Timer(expr)) => {
                let schedule =
                    TimerSchedule::parse(expr).map_err(|reason| DefinitionError::InvalidTimer {
                        tag: tag.clone(),
                        expr: expr.to_string(),
                        reason,
                    })?;
                CompiledTrigger::Timer {
                    expression: expr.to_string(),
                    schedule,
                }
            }
            None => return Err(DefinitionError::EmptyTrigger { tag }),
        };

        let reset = ResetPolicy::from_reset(condition.reset.as_ref().or(rule.reset.as_ref()))?;
        conditions.push(CompiledCondition {
            tag,
            trigger,
            reset,
        });
    }

    let mut next = 0usize;
    let tree = when.map(&mut |_| {
        let i = next;
        next += 1;
        i
    });
    Ok((conditions, tree))
}

// ── Partitions ──────────────────────────────────────────────────────

/// Result of one condition for one cycle.
#[derive(Debug, Default)]
pub struct ConditionPartition<'a> {
    /// Facts satisfying the condition, per asset. Empty for timers.
    pub matched: BTreeMap<&'a str, Vec<&'a AssetState>>,
    /// In-scope assets failing the attribute predicates.
    pub otherwise: BTreeSet<&'a str>,
    /// Timer conditions only.
    pub timer_due: bool,
}

/// Per-condition partitions of a rule, indexed like its compiled conditions.
#[derive(Debug, Default)]
pub struct TriggerPartitions<'a> {
    pub conditions: Vec<ConditionPartition<'a>>,
}

impl<'a> TriggerPartitions<'a> {
    /// Every fact satisfying any condition.
    pub fn matched_facts(&self) -> impl Iterator<Item = &'a AssetState> + '_ {
        self.conditions
            .iter()
            .flat_map(|c| c.matched.values().flatten().copied())
    }

    pub fn matched_keys(&self) -> HashSet<FactKey> {
        self.matched_facts().map(AssetState::key).collect()
    }

    /// Matched asset ids per condition tag.
    pub fn condition_assets(
        &self,
        conditions: &[CompiledCondition],
    ) -> BTreeMap<String, BTreeSet<AssetId>> {
        conditions
            .iter()
            .zip(&self.conditions)
            .map(|(c, p)| {
                let ids = p.matched.keys().map(|id| id.to_string()).collect();
                (c.tag.clone(), ids)
            })
            .collect()
    }

    /// Assets that no condition matched but some condition had in scope.
    pub fn otherwise_assets(&self) -> BTreeSet<&'a str> {
        let matched: BTreeSet<&str> = self
            .conditions
            .iter()
            .flat_map(|c| c.matched.keys().copied())
            .collect();
        self.conditions
            .iter()
            .flat_map(|c| c.otherwise.iter().copied())
            .filter(|id| !matched.contains(id))
            .collect()
    }
}

/// Partition `snapshot` for every condition of `rule_id`.
pub fn partition<'a>(
    rule_id: &str,
    conditions: &[CompiledCondition],
    snapshot: &'a [AssetState],
    store: &dyn FactStore,
    timers: &TimerScheduler,
    now: DateTime<Utc>,
) -> TriggerPartitions<'a> {
    let conditions = conditions
        .iter()
        .map(|condition| match &condition.trigger {
            CompiledTrigger::Assets(query) => {
                let result = run_query(query, snapshot, store);
                ConditionPartition {
                    matched: result.matched,
                    otherwise: result.unmatched,
                    timer_due: false,
                }
            }
            CompiledTrigger::Timer { .. } => ConditionPartition {
                timer_due: timers.is_due(rule_id, &condition.tag, now),
                ..Default::default()
            },
        })
        .collect();
    TriggerPartitions { conditions }
}

// ── Tests ───────────────────────────────────────────────────────────
