//! Recurrence & reset tracking per (rule, fact).
//!
//! The [`RecurrenceTracker`] remembers when each rule last fired for each
//! fact, and decides whether a currently matching fact may fire again:
//!
//! - the rule's [`RecurrencePolicy`] gates refiring cadence, per fact
//!   (`PER_ASSET`) or per rule (`GLOBAL`);
//! - the condition's [`ResetPolicy`] (OR of its active reset conditions)
//!   decides when a fact that already fired becomes eligible again.
//!
//! A fact must pass both. The tracker is owned by one rule session and can
//! be exported as a [`TrackerSnapshot`] for a persistence collaborator.

mod core;
mod entry;
mod policy;


pub use self::core::RecurrenceTracker;
pub use self::entry::{TrackerRecord, TrackerSnapshot, TriggerHistoryEntry};
pub use self::policy::{RecurrenceGate, RecurrencePolicy, ResetPolicy};
