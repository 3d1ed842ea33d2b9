//! Recursive AND/OR groups used for rule triggers and attribute predicates.

use serde::{Deserialize, Serialize};

/// Boolean operator joining the members of a [`LogicGroup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicGroupOperator {
    #[default]
    And,
    Or,
}

/// A recursively nested group of leaf items joined by one operator.
///
/// `items` are leaves, `groups` are nested sub-groups evaluated with their own
/// operator. The legacy field names `predicates` and `conditions` are accepted
/// when deserializing older rule definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicGroup<T> {
    #[serde(default)]
    pub operator: LogicGroupOperator,
    #[serde(default, alias = "predicates", skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<T>,
    #[serde(default, alias = "conditions", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<LogicGroup<T>>,
}

impl<T> Default for LogicGroup<T> {
    fn default() -> Self {
        Self {
            operator: LogicGroupOperator::And,
            items: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl<T> LogicGroup<T> {
    pub fn and(items: Vec<T>) -> Self {
        Self {
            operator: LogicGroupOperator::And,
            items,
            groups: Vec::new(),
        }
    }

    pub fn or(items: Vec<T>) -> Self {
        Self {
            operator: LogicGroupOperator::Or,
            items,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: LogicGroup<T>) -> Self {
        self.groups.push(group);
        self
    }

    /// True when the group has no items and no sub-groups.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.groups.is_empty()
    }

    /// Depth-first list of every leaf item across `groups`: at each level the
    /// group's own items come before the items of its sub-groups.
    pub fn flatten(groups: &[LogicGroup<T>]) -> Vec<&T> {
        let mut out = Vec::new();
        for group in groups {
            group.collect_into(&mut out);
        }
        out
    }

    /// Leaves of this group alone, in the same order as [`flatten`](Self::flatten).
    pub fn leaves(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a T>) {
        out.extend(self.items.iter());
        for group in &self.groups {
            group.collect_into(out);
        }
    }

    /// Build a group of the same shape with every leaf mapped through `f`.
    pub fn map<U, F>(&self, f: &mut F) -> LogicGroup<U>
    where
        F: FnMut(&T) -> U,
    {
        let items = self.items.iter().map(|item| f(item)).collect();
        let groups = self.groups.iter().map(|g| g.map(&mut *f)).collect();
        LogicGroup {
            operator: self.operator,
            items,
            groups,
        }
    }
}

/// Predicate-leaf groups carry the same shape as any other logic group.
pub type ConditionGroup<T> = LogicGroup<T>;
