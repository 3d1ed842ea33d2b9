//! Logic tree evaluation over facts.
//!
//! - [`LogicGroup::evaluate`]: recursive AND/OR evaluation with a caller
//!   supplied leaf function. Leaves must be side-effect free.
//! - [`predicates`]: value and attribute predicate matching for one fact.
//! - [`query`]: asset query scope filtering and per-asset attribute matching.

pub mod predicates;
pub mod query;

use crate::schema::{LogicGroup, LogicGroupOperator};

pub use predicates::{attribute_matches, string_matches, value_matches};
pub use query::{order_and_limit, run_query, QueryResult};

// ── Group evaluation ────────────────────────────────────────────────

impl<T> LogicGroup<T> {
    /// Evaluate the group, delegating each leaf item to `leaf`.
    ///
    /// A group with no items and no sub-groups is vacuously true, whatever
    /// its operator. Otherwise items and sub-groups are joined by the
    /// group's operator.
    pub fn evaluate<F>(&self, leaf: &mut F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        if self.is_empty() {
            return true;
        }
        match self.operator {
            LogicGroupOperator::And => {
                self.items.iter().all(|item| leaf(item))
                    && self.groups.iter().all(|g| g.evaluate(&mut *leaf))
            }
            LogicGroupOperator::Or => {
                self.items.iter().any(|item| leaf(item))
                    || self.groups.iter().any(|g| g.evaluate(&mut *leaf))
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
