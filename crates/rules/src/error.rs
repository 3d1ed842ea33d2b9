//! Error types for rule definition, evaluation and target resolution.

use assetflow_core::StoreError;
use thiserror::Error;

/// A rule cannot be deployed. The rule is kept inactive; other rules load normally.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("malformed rule: {0}")]
    Malformed(String),

    #[error("unknown action '{action}' in '{block}'")]
    UnknownAction { block: &'static str, action: String },

    #[error("condition '{tag}' has neither an asset query nor a timer")]
    EmptyTrigger { tag: String },

    #[error("invalid timer '{expr}' on condition '{tag}': {reason}")]
    InvalidTimer {
        tag: String,
        expr: String,
        reason: String,
    },

    #[error("invalid reset timer '{expr}': {reason}")]
    InvalidResetTimer { expr: String, reason: String },

    #[error("rule name must not be empty")]
    EmptyName,

    #[error("rule name '{0}' already used in this ruleset")]
    DuplicateName(String),

    #[error("condition tag '{0}' already used in this rule")]
    DuplicateTag(String),

    #[error("recurrence minutes must not be negative (got {0})")]
    NegativeRecurrence(i64),
}

/// A predicate cannot be applied to a fact's runtime value.
///
/// Never propagated past the predicate: the predicate is treated as
/// non-matching for that fact.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error("{predicate} predicate cannot be applied to a {found} value")]
    TypeMismatch {
        predicate: &'static str,
        found: &'static str,
    },

    #[error("invalid {predicate} operand: {reason}")]
    InvalidOperand {
        predicate: &'static str,
        reason: String,
    },
}

/// A declared target could not be resolved for one action.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TargetError {
    #[error("{target} lookup failed: {source}")]
    Collaborator {
        target: &'static str,
        #[source]
        source: StoreError,
    },
}

impl TargetError {
    pub fn collaborator(target: &'static str, source: StoreError) -> Self {
        TargetError::Collaborator { target, source }
    }
}

/// An external executor refused or failed an [`ActionDispatch`](crate::session::ActionDispatch).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error("executor rejected {action} action: {reason}")]
    Rejected { action: &'static str, reason: String },

    #[error("executor unavailable: {0}")]
    Unavailable(String),
}
