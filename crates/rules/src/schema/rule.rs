//! Top-level rule and ruleset definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    default_true, LogicGroup, RuleAction, RuleCondition, RuleRecurrence, RuleTriggerReset,
    ACTION_KINDS,
};
use crate::error::DefinitionError;

/// Lower value means higher precedence.
pub const DEFAULT_PRIORITY: i32 = i32::MAX - 1;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// Action block names in a rule, in the order they are validated.
pub const ACTION_BLOCKS: &[&str] = &["then", "otherwise", "onStart", "onStop"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Rules can be authored disabled and switched on later.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// A rule without `when` only runs its lifecycle actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<LogicGroup<RuleCondition>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub then: Vec<RuleAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub otherwise: Vec<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RuleRecurrence>,
    /// Default reset applied to conditions that do not declare their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<RuleTriggerReset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_start: Vec<RuleAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_stop: Vec<RuleAction>,
}

impl JsonRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority: DEFAULT_PRIORITY,
            enabled: true,
            when: None,
            then: Vec::new(),
            otherwise: Vec::new(),
            recurrence: None,
            reset: None,
            on_start: Vec::new(),
            on_stop: Vec::new(),
        }
    }

    /// Parse one rule from raw JSON.
    ///
    /// Action discriminators are checked before the typed pass so an unknown
    /// `action` is reported by name instead of as a generic serde error.
    pub fn from_value(value: &Value) -> Result<Self, DefinitionError> {
        for &block in ACTION_BLOCKS {
            let Some(actions) = value.get(block).and_then(Value::as_array) else {
                continue;
            };
            for action in actions {
                match action.get("action").and_then(Value::as_str) {
                    Some(kind) if ACTION_KINDS.contains(&kind) => {}
                    Some(kind) => {
                        return Err(DefinitionError::UnknownAction {
                            block,
                            action: kind.to_string(),
                        })
                    }
                    None => {
                        return Err(DefinitionError::UnknownAction {
                            block,
                            action: String::new(),
                        })
                    }
                }
            }
        }
        serde_json::from_value(value.clone()).map_err(|e| DefinitionError::Malformed(e.to_string()))
    }

    /// Whether any `when` condition is present.
    pub fn has_trigger(&self) -> bool {
        self.when.as_ref().is_some_and(|w| !w.is_empty())
    }
}

/// A named collection of rules deployed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonRulesetDefinition {
    #[serde(default)]
    pub rules: Vec<JsonRule>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}
