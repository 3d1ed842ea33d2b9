//! What a session hands back to its caller: dispatches and reports.

use assetflow_core::StoreError;
use serde::Serialize;

use crate::error::DefinitionError;
use crate::schema::RuleAction;
use crate::target::ResolvedTargets;

/// Which action list of a rule produced a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionBlock {
    Then,
    Otherwise,
    OnStart,
    OnStop,
}

impl ActionBlock {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionBlock::Then => "then",
            ActionBlock::Otherwise => "otherwise",
            ActionBlock::OnStart => "onStart",
            ActionBlock::OnStop => "onStop",
        }
    }
}

/// One action with its resolved recipients, ready for an external executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDispatch {
    pub rule_id: String,
    pub rule_name: String,
    pub block: ActionBlock,
    pub action: RuleAction,
    pub targets: ResolvedTargets,
    /// Sum of the `wait` actions preceding this one in its block.
    pub delay_ms: u64,
}

/// An action that was not emitted, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedAction {
    pub rule_id: String,
    pub block: ActionBlock,
    /// Position of the action inside its block.
    pub index: usize,
    pub action: &'static str,
    pub reason: String,
}

/// Dispatches and skipped actions produced by a lifecycle change.
#[derive(Debug, Default)]
pub struct ActionBatch {
    pub dispatches: Vec<ActionDispatch>,
    pub skipped: Vec<SkippedAction>,
}

impl ActionBatch {
    pub fn append(&mut self, other: ActionBatch) {
        self.dispatches.extend(other.dispatches);
        self.skipped.extend(other.skipped);
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty() && self.skipped.is_empty()
    }
}

/// Result of one evaluation cycle.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub dispatches: Vec<ActionDispatch>,
    pub skipped: Vec<SkippedAction>,
    /// Ids of rules whose `then` block fired, in evaluation order.
    pub fired: Vec<String>,
    /// Ids of rules whose `otherwise` block ran.
    pub otherwise: Vec<String>,
    /// Set when the fact store could not be read; nothing else ran.
    pub store_error: Option<StoreError>,
}

impl CycleOutcome {
    pub fn dispatches_for<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a ActionDispatch> {
        self.dispatches.iter().filter(move |d| d.rule_id == rule_id)
    }
}

/// Result of deploying a ruleset.
#[derive(Debug, Default)]
pub struct DeployReport {
    pub ruleset: String,
    /// Ids of rules now deployed.
    pub deployed: Vec<String>,
    /// Rules kept inactive, by name.
    pub failed: Vec<(String, DefinitionError)>,
    /// `onStop` of the replaced version followed by `onStart` of the new one.
    pub dispatches: Vec<ActionDispatch>,
    pub skipped: Vec<SkippedAction>,
}

impl DeployReport {
    pub(crate) fn absorb(&mut self, batch: ActionBatch) {
        self.dispatches.extend(batch.dispatches);
        self.skipped.extend(batch.skipped);
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
