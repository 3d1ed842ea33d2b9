//! Rule session: deploy rules and run evaluation cycles.
//!
//! A [`RuleSession`] owns the compiled rules of one fact scope together with
//! their recurrence tracker and timer schedule. Each call to
//! [`RuleSession::evaluate`] reads one snapshot from the fact store, runs
//! every enabled rule in priority order and returns the resolved actions.
//! Executing those actions is left to an
//! [`ActionDispatcher`](crate::dispatch::ActionDispatcher).

mod actions;
mod core;
mod deployed;
mod outcome;


pub use self::core::RuleSession;
pub use self::deployed::{rule_id, DeployedRule};
pub use self::outcome::{
    ActionBatch, ActionBlock, ActionDispatch, CycleOutcome, DeployReport, SkippedAction,
};
