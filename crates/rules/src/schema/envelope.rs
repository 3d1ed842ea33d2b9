//! Ruleset envelope for per-rule second-pass deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{JsonRule, JsonRulesetDefinition};
use crate::error::DefinitionError;

/// First-pass view of a ruleset: the rule list is kept as raw JSON.
///
/// One malformed rule must not hide the others, so each entry is parsed
/// separately by [`parse_rules`](RulesetEnvelope::parse_rules).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesetEnvelope {
    #[serde(default)]
    pub rules: Vec<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

impl RulesetEnvelope {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Second pass: parse each rule independently.
    ///
    /// Entries are `(index, result)`; the rule name is recovered from the raw
    /// JSON for error reporting where possible.
    pub fn parse_rules(&self) -> Vec<(usize, Result<JsonRule, DefinitionError>)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, raw)| (i, JsonRule::from_value(raw)))
            .collect()
    }

    /// Name of the raw rule at `index`, or a positional placeholder.
    pub fn rule_name(&self, index: usize) -> String {
        self.rules
            .get(index)
            .and_then(|r| r.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{index}"))
    }

    /// Strict conversion: fails on the first invalid rule.
    pub fn into_definition(self) -> Result<JsonRulesetDefinition, DefinitionError> {
        let rules = self
            .rules
            .iter()
            .map(JsonRule::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JsonRulesetDefinition {
            rules,
            meta: self.meta,
        })
    }
}

impl From<&JsonRulesetDefinition> for RulesetEnvelope {
    fn from(def: &JsonRulesetDefinition) -> Self {
        Self {
            rules: def
                .rules
                .iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
            meta: def.meta.clone(),
        }
    }
}
