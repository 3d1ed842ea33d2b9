//! Turning an action block into dispatches.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

use crate::audit_log::{AuditLog, ExecutionPhase, LogLevel};
use crate::schema::RuleAction;
use crate::target::{resolve, ResolvedTargets, TargetContext};

use super::outcome::{ActionBlock, ActionDispatch, SkippedAction};

/// Everything needed to emit one block of one rule.
pub(crate) struct BlockEmitter<'a> {
    pub rule_id: &'a str,
    pub rule_name: &'a str,
    pub audit: &'a AuditLog,
    pub now: DateTime<Utc>,
}

impl BlockEmitter<'_> {
    /// Resolve targets for every action of `actions` in order.
    ///
    /// `wait` actions are not emitted; their duration is added to the
    /// delay of every later action in the block. An action whose targets
    /// cannot be resolved is skipped and the rest of the block proceeds.
    pub fn emit(
        &self,
        block: ActionBlock,
        actions: &[RuleAction],
        ctx: &TargetContext<'_>,
        dispatches: &mut Vec<ActionDispatch>,
        skipped: &mut Vec<SkippedAction>,
    ) {
        let mut delay_ms: u64 = 0;

        for (index, action) in actions.iter().enumerate() {
            if let RuleAction::Wait(wait) = action {
                delay_ms = delay_ms.saturating_add(wait.millis);
                continue;
            }

            let targets = match resolve(action.target(), ctx) {
                Ok(targets) => targets,
                Err(e) => {
                    warn!(
                        rule_id = %self.rule_id,
                        block = block.as_str(),
                        action = action.kind(),
                        error = %e,
                        "target resolution failed, skipping action"
                    );
                    self.skip(block, index, action, e.to_string(), skipped);
                    continue;
                }
            };

            if action.requires_asset_targets() && matches!(targets, ResolvedTargets::Users(_)) {
                warn!(
                    rule_id = %self.rule_id,
                    block = block.as_str(),
                    action = action.kind(),
                    "attribute action resolved to users, skipping"
                );
                self.skip(
                    block,
                    index,
                    action,
                    "attribute actions need asset targets".to_string(),
                    skipped,
                );
                continue;
            }

            if targets.is_empty() && !matches!(action, RuleAction::Webhook(_)) {
                debug!(
                    rule_id = %self.rule_id,
                    block = block.as_str(),
                    action = action.kind(),
                    "no targets, nothing to dispatch"
                );
                continue;
            }

            dispatches.push(ActionDispatch {
                rule_id: self.rule_id.to_string(),
                rule_name: self.rule_name.to_string(),
                block,
                action: action.clone(),
                targets,
                delay_ms,
            });
        }
    }

    fn skip(
        &self,
        block: ActionBlock,
        index: usize,
        action: &RuleAction,
        reason: String,
        skipped: &mut Vec<SkippedAction>,
    ) {
        self.audit.record_with_details(
            self.now,
            self.rule_id,
            LogLevel::Warning,
            ExecutionPhase::TargetResolution,
            format!("skipped {} action in {}: {reason}", action.kind(), block.as_str()),
            Some(json!({ "block": block.as_str(), "index": index })),
        );
        skipped.push(SkippedAction {
            rule_id: self.rule_id.to_string(),
            block,
            index,
            action: action.kind(),
            reason,
        });
    }
}
