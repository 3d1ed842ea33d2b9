//! A compiled, deployed rule.

use crate::error::DefinitionError;
use crate::schema::{JsonRule, LogicGroup};
use crate::tracker::{RecurrencePolicy, ResetPolicy};
use crate::trigger::{compile_conditions, CompiledCondition};

/// Session-wide rule id: `{ruleset}/{name}`.
pub fn rule_id(ruleset: &str, name: &str) -> String {
    format!("{ruleset}/{name}")
}

#[derive(Debug, Clone)]
pub struct DeployedRule {
    pub id: String,
    pub ruleset: String,
    pub definition: JsonRule,
    pub conditions: Vec<CompiledCondition>,
    /// `when` with each leaf replaced by its index into `conditions`.
    pub when: LogicGroup<usize>,
    pub recurrence: RecurrencePolicy,
    pub enabled: bool,
}

impl DeployedRule {
    pub fn compile(ruleset: &str, definition: JsonRule) -> Result<Self, DefinitionError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        let recurrence = RecurrencePolicy::from_recurrence(definition.recurrence.as_ref())?;
        ResetPolicy::from_reset(definition.reset.as_ref())?;
        let (conditions, when) = compile_conditions(&definition)?;

        Ok(Self {
            id: rule_id(ruleset, name),
            ruleset: ruleset.to_string(),
            enabled: definition.enabled,
            definition,
            conditions,
            when,
            recurrence,
        })
    }

    pub fn name(&self) -> &str {
        self.definition.name.trim()
    }

    pub fn priority(&self) -> i32 {
        self.definition.priority
    }

    /// Rules without conditions only run lifecycle actions.
    pub fn has_trigger(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Evaluation order: priority, then ruleset, then name.
    pub fn sort_key(&self) -> (i32, &str, &str) {
        (self.priority(), self.ruleset.as_str(), self.name())
    }
}
