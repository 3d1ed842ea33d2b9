//! [`RuleSession`]: deployed rules evaluated over one fact scope.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use assetflow_core::{AssetId, AssetState, FactKey};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::audit_log::{AuditLog, ExecutionPhase, LogLevel};
use crate::error::DefinitionError;
use crate::evaluator::order_and_limit;
use crate::scheduler::TimerScheduler;
use crate::schema::{JsonRule, JsonRulesetDefinition, RulesetEnvelope};
use crate::store::FactStore;
use crate::target::TargetContext;
use crate::tracker::{RecurrenceTracker, TrackerSnapshot};
use crate::trigger::{partition, CompiledTrigger, TriggerPartitions};

use super::actions::BlockEmitter;
use super::deployed::{rule_id, DeployedRule};
use super::outcome::{ActionBatch, ActionBlock, CycleOutcome, DeployReport};

/// A set of deployed rules sharing one fact store scope, one recurrence
/// tracker and one timer schedule.
///
/// The session is driven from the outside: every operation takes `now`
/// and returns the actions to dispatch. Nothing here performs I/O besides
/// reading the [`FactStore`].
pub struct RuleSession {
    scope: String,
    store: Arc<dyn FactStore>,
    rules: BTreeMap<String, DeployedRule>,
    /// Rule ids per ruleset, in definition order.
    rulesets: BTreeMap<String, Vec<String>>,
    /// Rules rejected at deploy time, per ruleset.
    inactive: BTreeMap<String, Vec<(String, DefinitionError)>>,
    tracker: RecurrenceTracker,
    timers: TimerScheduler,
    audit: AuditLog,
}

/// Read-only inputs shared by every rule of one cycle.
struct Cycle<'s> {
    snapshot: &'s [AssetState],
    store: &'s dyn FactStore,
    audit: &'s AuditLog,
    now: DateTime<Utc>,
}

impl RuleSession {
    pub fn new(scope: impl Into<String>, store: Arc<dyn FactStore>) -> Self {
        Self {
            scope: scope.into(),
            store,
            rules: BTreeMap::new(),
            rulesets: BTreeMap::new(),
            inactive: BTreeMap::new(),
            tracker: RecurrenceTracker::new(),
            timers: TimerScheduler::new(),
            audit: AuditLog::new(),
        }
    }

    /// Share an existing audit log, e.g. one exposed to operators.
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn tracker(&self) -> &RecurrenceTracker {
        &self.tracker
    }

    pub fn timers(&self) -> &TimerScheduler {
        &self.timers
    }

    pub fn rule(&self, rule_id: &str) -> Option<&DeployedRule> {
        self.rules.get(rule_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rulesets(&self) -> impl Iterator<Item = &str> {
        self.rulesets.keys().map(String::as_str)
    }

    /// Ids of the deployed rules of `ruleset`, in definition order.
    pub fn ruleset_rules(&self, ruleset: &str) -> &[String] {
        self.rulesets.get(ruleset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rules of `ruleset` that failed to deploy, with the reason.
    pub fn inactive_rules(&self, ruleset: &str) -> &[(String, DefinitionError)] {
        self.inactive.get(ruleset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of the rules the next cycle evaluates, in evaluation order.
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.active_rules().into_iter().map(|r| r.id.as_str()).collect()
    }

    fn active_rules(&self) -> Vec<&DeployedRule> {
        let mut rules: Vec<&DeployedRule> = self
            .rules
            .values()
            .filter(|r| r.enabled && r.has_trigger())
            .collect();
        rules.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        rules
    }

    pub fn tracker_snapshot(&self) -> TrackerSnapshot {
        self.tracker.snapshot()
    }

    /// Load previously exported trigger history. Returns the number of
    /// records restored.
    pub fn restore_tracker(&mut self, snapshot: TrackerSnapshot, now: DateTime<Utc>) -> usize {
        self.tracker.restore(snapshot, now)
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Compile and deploy one rule into `ruleset`.
    ///
    /// An invalid definition is recorded as inactive and returned as an
    /// error; other rules are unaffected. On success the rule's `onStart`
    /// actions are returned if it is enabled.
    pub fn deploy_rule(
        &mut self,
        ruleset: &str,
        definition: JsonRule,
        now: DateTime<Utc>,
    ) -> Result<ActionBatch, DefinitionError> {
        let name = definition.name.trim().to_string();
        let rule = match DeployedRule::compile(ruleset, definition) {
            Ok(rule) => rule,
            Err(e) => {
                self.reject(ruleset, &name, e.clone(), now);
                return Err(e);
            }
        };
        if self.rules.contains_key(&rule.id) {
            let e = DefinitionError::DuplicateName(name.clone());
            self.reject(ruleset, &name, e.clone(), now);
            return Err(e);
        }

        for condition in &rule.conditions {
            if let CompiledTrigger::Timer { expression, schedule } = &condition.trigger {
                self.timers
                    .register(&rule.id, &condition.tag, expression, schedule.clone(), now);
            }
        }

        info!(
            rule_id = %rule.id,
            conditions = rule.conditions.len(),
            enabled = rule.enabled,
            "deployed rule"
        );
        self.audit.record(
            now,
            &rule.id,
            LogLevel::Info,
            ExecutionPhase::Lifecycle,
            "deployed",
        );

        let mut batch = ActionBatch::default();
        if rule.enabled {
            self.run_lifecycle(&rule, ActionBlock::OnStart, now, &mut batch);
        }
        self.rulesets
            .entry(ruleset.to_string())
            .or_default()
            .push(rule.id.clone());
        self.rules.insert(rule.id.clone(), rule);
        Ok(batch)
    }

    /// Replace `ruleset` with the rules of `envelope`.
    ///
    /// The previous version is undeployed first, so its `onStop` actions
    /// precede the new `onStart` actions in the report. Rules that fail to
    /// parse or compile stay inactive without blocking the others.
    pub fn deploy_ruleset(
        &mut self,
        ruleset: &str,
        envelope: &RulesetEnvelope,
        now: DateTime<Utc>,
    ) -> DeployReport {
        let mut report = DeployReport {
            ruleset: ruleset.to_string(),
            ..Default::default()
        };
        report.absorb(self.undeploy_ruleset(ruleset, now));

        for (index, parsed) in envelope.parse_rules() {
            match parsed {
                Ok(definition) => {
                    let name = definition.name.trim().to_string();
                    if let Ok(batch) = self.deploy_rule(ruleset, definition, now) {
                        report.deployed.push(rule_id(ruleset, &name));
                        report.absorb(batch);
                    }
                }
                Err(e) => self.reject(ruleset, &envelope.rule_name(index), e, now),
            }
        }

        report.failed = self.inactive_rules(ruleset).to_vec();
        info!(
            ruleset = %ruleset,
            deployed = report.deployed.len(),
            failed = report.failed.len(),
            "deployed ruleset"
        );
        report
    }

    /// Deploy an already typed ruleset definition.
    pub fn deploy_definition(
        &mut self,
        ruleset: &str,
        definition: &JsonRulesetDefinition,
        now: DateTime<Utc>,
    ) -> DeployReport {
        self.deploy_ruleset(ruleset, &RulesetEnvelope::from(definition), now)
    }

    /// Remove a rule and all of its trigger history and timers.
    ///
    /// Returns the rule's `onStop` actions if it was enabled. Unknown ids
    /// are ignored.
    pub fn undeploy_rule(&mut self, rule_id: &str, now: DateTime<Utc>) -> ActionBatch {
        let mut batch = ActionBatch::default();
        let Some(rule) = self.rules.remove(rule_id) else {
            return batch;
        };
        self.tracker.forget_rule(rule_id);
        self.timers.remove_rule(rule_id);
        if let Some(ids) = self.rulesets.get_mut(&rule.ruleset) {
            ids.retain(|id| id != rule_id);
            if ids.is_empty() {
                self.rulesets.remove(&rule.ruleset);
            }
        }

        if rule.enabled {
            self.run_lifecycle(&rule, ActionBlock::OnStop, now, &mut batch);
        }
        info!(rule_id = %rule_id, "undeployed rule");
        self.audit.record(
            now,
            rule_id,
            LogLevel::Info,
            ExecutionPhase::Lifecycle,
            "undeployed",
        );
        batch
    }

    pub fn undeploy_ruleset(&mut self, ruleset: &str, now: DateTime<Utc>) -> ActionBatch {
        self.inactive.remove(ruleset);
        let ids = self.rulesets.get(ruleset).cloned().unwrap_or_default();
        let mut batch = ActionBatch::default();
        for id in ids {
            batch.append(self.undeploy_rule(&id, now));
        }
        batch
    }

    /// Enable or disable a deployed rule.
    ///
    /// Only a real state change runs `onStart` or `onStop`. A re-enabled
    /// rule restarts its timer windows at `now`.
    pub fn set_enabled(&mut self, rule_id: &str, enabled: bool, now: DateTime<Utc>) -> ActionBatch {
        let mut batch = ActionBatch::default();
        match self.rules.get_mut(rule_id) {
            Some(rule) if rule.enabled != enabled => rule.enabled = enabled,
            _ => return batch,
        }
        let Some(rule) = self.rules.get(rule_id) else {
            return batch;
        };

        let block = if enabled {
            for condition in rule.conditions.iter().filter(|c| c.is_timer()) {
                self.timers.record_fired(&rule.id, &condition.tag, now);
            }
            ActionBlock::OnStart
        } else {
            ActionBlock::OnStop
        };
        info!(rule_id = %rule_id, enabled, "rule state changed");
        self.audit.record(
            now,
            rule_id,
            LogLevel::Info,
            ExecutionPhase::Lifecycle,
            if enabled { "enabled" } else { "disabled" },
        );
        self.run_lifecycle(rule, block, now, &mut batch);
        batch
    }

    /// Undeploy every ruleset.
    pub fn shutdown(&mut self, now: DateTime<Utc>) -> ActionBatch {
        let rulesets: Vec<String> = self.rulesets.keys().cloned().collect();
        let mut batch = ActionBatch::default();
        for ruleset in rulesets {
            batch.append(self.undeploy_ruleset(&ruleset, now));
        }
        info!(scope = %self.scope, "rule session shut down");
        batch
    }

    fn reject(&mut self, ruleset: &str, name: &str, error: DefinitionError, now: DateTime<Utc>) {
        let id = rule_id(ruleset, name);
        warn!(rule_id = %id, error = %error, "rule definition rejected");
        self.audit.record(
            now,
            &id,
            LogLevel::Error,
            ExecutionPhase::Definition,
            error.to_string(),
        );
        self.inactive
            .entry(ruleset.to_string())
            .or_default()
            .push((name.to_string(), error));
    }

    /// Emit `onStart` or `onStop`. Lifecycle blocks have no triggering
    /// assets, so only explicit targets resolve to anything.
    fn run_lifecycle(
        &self,
        rule: &DeployedRule,
        block: ActionBlock,
        now: DateTime<Utc>,
        batch: &mut ActionBatch,
    ) {
        let actions = match block {
            ActionBlock::OnStart => &rule.definition.on_start,
            ActionBlock::OnStop => &rule.definition.on_stop,
            ActionBlock::Then | ActionBlock::Otherwise => return,
        };
        if actions.is_empty() {
            return;
        }

        let snapshot = self.store.current_facts(&self.scope).unwrap_or_else(|e| {
            warn!(rule_id = %rule.id, error = %e, "fact store unavailable for lifecycle actions");
            Vec::new()
        });
        let no_assets = BTreeSet::new();
        let no_tags = BTreeMap::new();
        let ctx = TargetContext {
            block_assets: &no_assets,
            block_facts: &[],
            condition_assets: &no_tags,
            snapshot: &snapshot,
            store: self.store.as_ref(),
        };
        let emitter = BlockEmitter {
            rule_id: &rule.id,
            rule_name: rule.name(),
            audit: &self.audit,
            now,
        };
        emitter.emit(block, actions, &ctx, &mut batch.dispatches, &mut batch.skipped);
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Run one evaluation cycle at `now`.
    ///
    /// Facts are read once; every enabled rule sees the same snapshot, in
    /// priority order. When the store cannot be read the cycle is a no-op
    /// and the tracker is left untouched.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let mut outcome = CycleOutcome::default();
        let snapshot = match self.store.current_facts(&self.scope) {
            Ok(facts) => facts,
            Err(e) => {
                warn!(scope = %self.scope, error = %e, "fact store unavailable, skipping cycle");
                outcome.store_error = Some(e);
                return outcome;
            }
        };

        let live: HashSet<FactKey> = snapshot.iter().map(AssetState::key).collect();
        let pruned = self.tracker.prune(&live);
        if pruned > 0 {
            debug!(pruned, "dropped trigger history of removed facts");
        }

        let cycle = Cycle {
            snapshot: &snapshot,
            store: self.store.as_ref(),
            audit: &self.audit,
            now,
        };
        let mut rules: Vec<&DeployedRule> = self
            .rules
            .values()
            .filter(|r| r.enabled && r.has_trigger())
            .collect();
        rules.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        for rule in rules {
            evaluate_rule(&cycle, rule, &mut self.tracker, &mut self.timers, &mut outcome);
        }

        debug!(
            facts = snapshot.len(),
            fired = outcome.fired.len(),
            dispatches = outcome.dispatches.len(),
            "evaluation cycle complete"
        );
        outcome
    }
}

fn evaluate_rule(
    cycle: &Cycle<'_>,
    rule: &DeployedRule,
    tracker: &mut RecurrenceTracker,
    timers: &mut TimerScheduler,
    outcome: &mut CycleOutcome,
) {
    let now = cycle.now;
    let parts = partition(&rule.id, &rule.conditions, cycle.snapshot, cycle.store, timers, now);
    tracker.observe(&rule.id, &parts.matched_keys());

    // Per condition: the matched facts allowed to fire, after recurrence,
    // reset, orderBy and limit.
    let mut leaves = Vec::with_capacity(rule.conditions.len());
    let mut eligible: Vec<BTreeMap<&str, Vec<&AssetState>>> = Vec::with_capacity(rule.conditions.len());
    let mut held_back = 0usize;

    for (condition, part) in rule.conditions.iter().zip(&parts.conditions) {
        match &condition.trigger {
            CompiledTrigger::Timer { .. } => {
                leaves.push(part.timer_due && tracker.rule_gate_open(&rule.id, &rule.recurrence, now));
                eligible.push(BTreeMap::new());
            }
            CompiledTrigger::Assets(query) => {
                let mut kept: BTreeMap<&str, Vec<&AssetState>> = BTreeMap::new();
                for (asset, facts) in &part.matched {
                    let ok: Vec<&AssetState> = facts
                        .iter()
                        .copied()
                        .filter(|f| {
                            tracker.is_eligible(&rule.id, &rule.recurrence, &condition.reset, f, now)
                        })
                        .collect();
                    held_back += facts.len() - ok.len();
                    if !ok.is_empty() {
                        kept.insert(*asset, ok);
                    }
                }
                let allowed: BTreeSet<&str> = order_and_limit(query, &kept).into_iter().collect();
                kept.retain(|asset, _| allowed.contains(asset));
                leaves.push(!kept.is_empty());
                eligible.push(kept);
            }
        }
    }
    if held_back > 0 {
        debug!(rule_id = %rule.id, held_back, "matched facts held back by recurrence");
    }

    let fires = rule.when.evaluate(&mut |i: &usize| leaves.get(*i).copied().unwrap_or(false));
    if fires {
        fire_then(cycle, rule, &eligible, tracker, timers, outcome);
    }
    if !rule.definition.otherwise.is_empty() {
        run_otherwise(cycle, rule, &parts, tracker, outcome);
    }
}

fn fire_then(
    cycle: &Cycle<'_>,
    rule: &DeployedRule,
    eligible: &[BTreeMap<&str, Vec<&AssetState>>],
    tracker: &mut RecurrenceTracker,
    timers: &mut TimerScheduler,
    outcome: &mut CycleOutcome,
) {
    let now = cycle.now;
    let mut fired_facts: Vec<&AssetState> = Vec::new();
    let mut condition_assets: BTreeMap<String, BTreeSet<AssetId>> = BTreeMap::new();
    for (condition, kept) in rule.conditions.iter().zip(eligible) {
        fired_facts.extend(kept.values().flatten().copied());
        let ids = kept.keys().map(|id| id.to_string()).collect();
        condition_assets.insert(condition.tag.clone(), ids);
        if condition.is_timer() {
            timers.record_fired(&rule.id, &condition.tag, now);
        }
    }
    tracker.record_firing(&rule.id, fired_facts.iter().copied(), now);

    let block_assets: BTreeSet<AssetId> = fired_facts.iter().map(|f| f.id.clone()).collect();
    let block_facts: Vec<&AssetState> = cycle
        .snapshot
        .iter()
        .filter(|f| block_assets.contains(&f.id))
        .collect();

    info!(rule_id = %rule.id, assets = block_assets.len(), "rule fired");
    cycle.audit.record_with_details(
        now,
        &rule.id,
        LogLevel::Info,
        ExecutionPhase::Trigger,
        "fired",
        Some(json!({ "assets": block_assets })),
    );
    outcome.fired.push(rule.id.clone());

    let ctx = TargetContext {
        block_assets: &block_assets,
        block_facts: &block_facts,
        condition_assets: &condition_assets,
        snapshot: cycle.snapshot,
        store: cycle.store,
    };
    BlockEmitter {
        rule_id: &rule.id,
        rule_name: rule.name(),
        audit: cycle.audit,
        now,
    }
    .emit(
        ActionBlock::Then,
        &rule.definition.then,
        &ctx,
        &mut outcome.dispatches,
        &mut outcome.skipped,
    );
}

/// Emit `otherwise` for in-scope assets that no condition matched and that
/// have not been reported since they last matched.
fn run_otherwise(
    cycle: &Cycle<'_>,
    rule: &DeployedRule,
    parts: &TriggerPartitions<'_>,
    tracker: &mut RecurrenceTracker,
    outcome: &mut CycleOutcome,
) {
    let now = cycle.now;
    let candidates = parts.otherwise_assets();
    let mut fresh_by_tag: BTreeMap<String, BTreeSet<AssetId>> = BTreeMap::new();
    let mut block_assets: BTreeSet<AssetId> = BTreeSet::new();

    for (condition, part) in rule.conditions.iter().zip(&parts.conditions) {
        if condition.is_timer() {
            continue;
        }
        tracker.clear_unmatched(&rule.id, &condition.tag, part.matched.keys().copied());
        let fresh = tracker.fresh_unmatched(
            &rule.id,
            &condition.tag,
            part.otherwise.iter().copied().filter(|a| candidates.contains(a)),
        );
        block_assets.extend(fresh.iter().cloned());
        fresh_by_tag.insert(condition.tag.clone(), fresh);
    }
    if block_assets.is_empty() {
        return;
    }
    for (tag, fresh) in &fresh_by_tag {
        tracker.record_unmatched(&rule.id, tag, fresh);
    }

    let block_facts: Vec<&AssetState> = cycle
        .snapshot
        .iter()
        .filter(|f| block_assets.contains(&f.id))
        .collect();
    info!(rule_id = %rule.id, assets = block_assets.len(), "otherwise triggered");
    cycle.audit.record_with_details(
        now,
        &rule.id,
        LogLevel::Info,
        ExecutionPhase::Trigger,
        "otherwise",
        Some(json!({ "assets": block_assets })),
    );
    outcome.otherwise.push(rule.id.clone());

    let ctx = TargetContext {
        block_assets: &block_assets,
        block_facts: &block_facts,
        condition_assets: &fresh_by_tag,
        snapshot: cycle.snapshot,
        store: cycle.store,
    };
    BlockEmitter {
        rule_id: &rule.id,
        rule_name: rule.name(),
        audit: cycle.audit,
        now,
    }
    .emit(
        ActionBlock::Otherwise,
        &rule.definition.otherwise,
        &ctx,
        &mut outcome.dispatches,
        &mut outcome.skipped,
    );
}
