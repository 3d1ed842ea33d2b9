//! Rule trigger conditions, recurrence and reset policies.

use serde::{Deserialize, Serialize};

use super::AssetQuery;

/// One trigger leaf of a rule's `when` group.
///
/// Exactly one of `assets` or `timer` is expected; when both are present
/// `assets` takes precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// Name used by `conditionAssets` targets. Defaults to the depth-first index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<AssetQuery>,
    /// Duration (`"1h"`, `"90s"`, `"PT15M"`) or cron expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<String>,
    /// Overrides the rule-level reset for facts matched by this condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<RuleTriggerReset>,
}

/// The resolved trigger kind of a [`RuleCondition`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleTrigger<'a> {
    Assets(&'a AssetQuery),
    Timer(&'a str),
}

impl RuleCondition {
    pub fn assets(query: AssetQuery) -> Self {
        Self {
            assets: Some(query),
            ..Default::default()
        }
    }

    pub fn timer(expr: impl Into<String>) -> Self {
        Self {
            timer: Some(expr.into()),
            ..Default::default()
        }
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// `None` when the condition carries neither an asset query nor a timer.
    pub fn trigger(&self) -> Option<RuleTrigger<'_>> {
        if let Some(query) = &self.assets {
            return Some(RuleTrigger::Assets(query));
        }
        match self.timer.as_deref().map(str::trim) {
            Some(expr) if !expr.is_empty() => Some(RuleTrigger::Timer(expr)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleRecurrenceScope {
    #[default]
    PerAsset,
    Global,
}

/// How soon a rule may fire again.
///
/// `mins`: `null` = never refire after the first match, `0` = no suppression,
/// `> 0` = minimum minutes since the last firing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecurrence {
    #[serde(default)]
    pub scope: RuleRecurrenceScope,
    #[serde(default)]
    pub mins: Option<i64>,
}

/// When a previously fired (rule, fact) pair becomes eligible again.
///
/// Active fields are OR-ed. With none active, `noLongerMatches` applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTriggerReset {
    #[serde(default)]
    pub never: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<String>,
    #[serde(default)]
    pub no_longer_matches: bool,
    #[serde(default)]
    pub timestamp_changes: bool,
    #[serde(default)]
    pub value_changes: bool,
}

impl RuleTriggerReset {
    pub fn has_timer(&self) -> bool {
        self.timer.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// True when no reset condition is active.
    pub fn is_unset(&self) -> bool {
        !self.never
            && !self.has_timer()
            && !self.no_longer_matches
            && !self.timestamp_changes
            && !self.value_changes
    }
}
