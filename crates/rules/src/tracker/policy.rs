//! Compiled recurrence and reset policies.

use std::time::Duration;

use crate::error::DefinitionError;
use crate::scheduler::parse_duration;
use crate::schema::{RuleRecurrence, RuleRecurrenceScope, RuleTriggerReset};

/// Refire cadence derived from `recurrence.mins`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceGate {
    /// `mins = 0`: no suppression.
    Always,
    /// `mins = null`: never refire after the first firing.
    Never,
    /// `mins > 0`: at least this many minutes between firings.
    Minutes(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrencePolicy {
    pub scope: RuleRecurrenceScope,
    pub gate: RecurrenceGate,
}

impl Default for RecurrencePolicy {
    /// A rule without a recurrence object is not suppressed.
    fn default() -> Self {
        Self {
            scope: RuleRecurrenceScope::PerAsset,
            gate: RecurrenceGate::Always,
        }
    }
}

impl RecurrencePolicy {
    pub fn from_recurrence(recurrence: Option<&RuleRecurrence>) -> Result<Self, DefinitionError> {
        let Some(r) = recurrence else {
            return Ok(Self::default());
        };
        let gate = match r.mins {
            None => RecurrenceGate::Never,
            Some(0) => RecurrenceGate::Always,
            Some(m) if m < 0 => return Err(DefinitionError::NegativeRecurrence(m)),
            Some(m) => RecurrenceGate::Minutes(u32::try_from(m).unwrap_or(u32::MAX)),
        };
        Ok(Self {
            scope: r.scope,
            gate,
        })
    }

    pub fn is_global(&self) -> bool {
        self.scope == RuleRecurrenceScope::Global
    }
}

/// OR-combination of reset conditions for one trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    pub never: bool,
    pub timer: Option<Duration>,
    pub no_longer_matches: bool,
    pub timestamp_changes: bool,
    pub value_changes: bool,
}

impl Default for ResetPolicy {
    /// With no reset conditions set, `noLongerMatches` applies.
    fn default() -> Self {
        Self {
            never: false,
            timer: None,
            no_longer_matches: true,
            timestamp_changes: false,
            value_changes: false,
        }
    }
}

impl ResetPolicy {
    pub fn from_reset(reset: Option<&RuleTriggerReset>) -> Result<Self, DefinitionError> {
        let Some(r) = reset.filter(|r| !r.is_unset()) else {
            return Ok(Self::default());
        };
        let timer = match r.timer.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(expr) => match parse_duration(expr) {
                Some(d) if !d.is_zero() && chrono::Duration::from_std(d).is_ok() => Some(d),
                _ => {
                    return Err(DefinitionError::InvalidResetTimer {
                        expr: expr.to_string(),
                        reason: "expected a positive duration".to_string(),
                    })
                }
            },
            None => None,
        };
        Ok(Self {
            never: r.never,
            timer,
            no_longer_matches: r.no_longer_matches,
            timestamp_changes: r.timestamp_changes,
            value_changes: r.value_changes,
        })
    }
}
