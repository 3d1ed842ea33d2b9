//! JSON rule model with serde deserialization.
//!
//! Defines the complete type hierarchy for rulesets:
//! - `LogicGroup`: recursive AND/OR tree used for `when` and attribute predicates
//! - `RuleCondition`: one trigger leaf (asset query or timer)
//! - `RuleAction`: tagged union discriminated by `action`
//! - `JsonRule` / `JsonRulesetDefinition`: top-level definitions
//! - `RulesetEnvelope`: first-pass view used by the loader

mod action;
mod condition;
mod envelope;
mod logic;
mod predicate;
mod query;
mod rule;
mod target;

pub use action::*;
pub use condition::*;
pub use envelope::*;
pub use logic::*;
pub use predicate::*;
pub use query::*;
pub use rule::*;
pub use target::*;

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests;
