//! Asset query evaluation: entity scope, attribute matching, order and limit.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use assetflow_core::AssetState;
use tracing::warn;

use super::predicates::{attribute_matches_lenient, string_matches};
use crate::schema::{AssetQuery, OrderBy, OrderByProperty};
use crate::store::FactStore;

/// Facts of one query run, grouped by asset id.
#[derive(Debug, Default)]
pub struct QueryResult<'a> {
    /// Matched assets with the facts that satisfied at least one attribute leaf.
    pub matched: BTreeMap<&'a str, Vec<&'a AssetState>>,
    /// Assets inside the entity scope whose attributes did not match.
    pub unmatched: BTreeSet<&'a str>,
}

impl<'a> QueryResult<'a> {
    pub fn matched_ids(&self) -> BTreeSet<&'a str> {
        self.matched.keys().copied().collect()
    }

    pub fn matched_facts(&self) -> impl Iterator<Item = &'a AssetState> + '_ {
        self.matched.values().flatten().copied()
    }
}

/// Whether a fact's asset lies inside the query's entity scope.
///
/// Everything but `attributes`, `orderBy` and `limit` is checked here. A
/// `userIds` filter needs the store; a failing lookup excludes the asset.
pub fn in_scope(query: &AssetQuery, fact: &AssetState, store: &dyn FactStore) -> bool {
    if !query.ids.is_empty() && !query.ids.iter().any(|id| *id == fact.id) {
        return false;
    }
    if !query.types.is_empty() && !query.types.iter().any(|t| *t == fact.asset_type) {
        return false;
    }
    if !query.names.is_empty() && !query.names.iter().any(|p| string_matches(p, &fact.name)) {
        return false;
    }
    if !query.parents.is_empty()
        && !query
            .parents
            .iter()
            .any(|p| p.id.is_some() && p.id == fact.parent_id)
    {
        return false;
    }
    if !query.paths.is_empty() && !query.paths.iter().any(|p| p.path == fact.path) {
        return false;
    }
    if let Some(realm) = query.realm.as_ref().and_then(|r| r.name.as_deref()) {
        if fact.realm != realm {
            return false;
        }
    }
    if !query.user_ids.is_empty() {
        match store.linked_users(&fact.id) {
            Ok(users) => {
                if !users.iter().any(|u| query.user_ids.contains(u)) {
                    return false;
                }
            }
            Err(e) => {
                warn!(asset_id = %fact.id, error = %e, "linked user lookup failed, asset excluded");
                return false;
            }
        }
    }
    true
}

/// Run a query over `facts`.
///
/// Facts are filtered by scope and grouped per asset. Without attribute
/// predicates every in-scope asset matches with all of its facts. Otherwise
/// an asset matches when its attribute group evaluates true, where each
/// leaf holds if any of the asset's facts satisfies it; the asset's matched
/// facts are those satisfying at least one leaf.
///
/// `orderBy` and `limit` are not applied here; see [`order_and_limit`].
pub fn run_query<'a, I>(query: &AssetQuery, facts: I, store: &dyn FactStore) -> QueryResult<'a>
where
    I: IntoIterator<Item = &'a AssetState>,
{
    let mut by_asset: BTreeMap<&'a str, Vec<&'a AssetState>> = BTreeMap::new();
    let mut scope_cache: BTreeMap<&'a str, bool> = BTreeMap::new();
    for fact in facts {
        let inside = *scope_cache
            .entry(fact.id.as_str())
            .or_insert_with(|| in_scope(query, fact, store));
        if inside {
            by_asset.entry(fact.id.as_str()).or_default().push(fact);
        }
    }

    let mut result = QueryResult::default();
    let attributes = query.attributes.as_ref().filter(|g| !g.is_empty());
    let Some(attributes) = attributes else {
        result.matched = by_asset;
        return result;
    };
    let leaves = attributes.leaves();

    for (asset_id, asset_facts) in by_asset {
        let hit = attributes.evaluate(&mut |pred| {
            asset_facts.iter().any(|f| attribute_matches_lenient(pred, f))
        });
        if hit {
            let matched: Vec<&AssetState> = asset_facts
                .iter()
                .copied()
                .filter(|f| leaves.iter().any(|pred| attribute_matches_lenient(pred, f)))
                .collect();
            result.matched.insert(asset_id, matched);
        } else {
            result.unmatched.insert(asset_id);
        }
    }
    result
}

fn compare_by(order: &OrderBy, a: &AssetState, b: &AssetState) -> Ordering {
    let ord = match order.property {
        OrderByProperty::Name => a.name.cmp(&b.name),
        OrderByProperty::AssetType => a.asset_type.cmp(&b.asset_type),
        OrderByProperty::ParentId => a.parent_id.cmp(&b.parent_id),
        OrderByProperty::Realm => a.realm.cmp(&b.realm),
        OrderByProperty::CreatedOn => a.created_on.cmp(&b.created_on),
    };
    if order.descending {
        ord.reverse()
    } else {
        ord
    }
}

/// Apply the query's `orderBy` and `limit` to matched asset ids.
///
/// Each asset is represented by its first fact. Ties and unordered input
/// fall back to asset id order. A limit of zero means unlimited.
pub fn order_and_limit<'a>(
    query: &AssetQuery,
    matched: &BTreeMap<&'a str, Vec<&'a AssetState>>,
) -> Vec<&'a str> {
    let mut ids: Vec<&'a str> = matched.keys().copied().collect();
    if let Some(order) = &query.order_by {
        ids.sort_by(|a, b| {
            let fa = matched.get(a).and_then(|f| f.first());
            let fb = matched.get(b).and_then(|f| f.first());
            match (fa, fb) {
                (Some(fa), Some(fb)) => compare_by(order, fa, fb),
                _ => Ordering::Equal,
            }
        });
    }
    if let Some(limit) = query.limit.filter(|l| *l > 0) {
        ids.truncate(limit);
    }
    ids
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::schema::{
        AssetQueryOperator, AttributePredicate, LogicGroup, ParentPredicate, PathPredicate,
        RealmPredicate, StringPredicate, ValuePredicate,
    };
    use crate::store::InMemoryFactStore;
    use assetflow_core::User;

    fn temp(id: &str, v: i64) -> AssetState {
        AssetState::new(id, "temp", json!(v), Utc::now()).with_type("Thermostat")
    }

    fn hot() -> AttributePredicate {
        AttributePredicate::new(
            "temp",
            ValuePredicate::number(AssetQueryOperator::GreaterThan, 25.0),
        )
    }

    #[test]
    fn no_attributes_matches_whole_scope() {
        let store = InMemoryFactStore::new();
        let facts = vec![temp("a1", 10), temp("a2", 30), AssetState::new("x", "temp", json!(1), Utc::now())];
        let q = AssetQuery::default().with_types(&["Thermostat"]);
        let r = run_query(&q, &facts, &store);
        assert_eq!(r.matched_ids(), BTreeSet::from(["a1", "a2"]));
        assert!(r.unmatched.is_empty());
    }

    #[test]
    fn attributes_split_matched_and_unmatched() {
        let store = InMemoryFactStore::new();
        let facts = vec![temp("a1", 30), temp("a2", 20)];
        let q = AssetQuery::default().with_attributes(LogicGroup::and(vec![hot()]));
        let r = run_query(&q, &facts, &store);
        assert_eq!(r.matched_ids(), BTreeSet::from(["a1"]));
        assert_eq!(r.unmatched, BTreeSet::from(["a2"]));
    }

    #[test]
    fn and_across_attributes_of_one_asset() {
        let store = InMemoryFactStore::new();
        let facts = vec![
            temp("a1", 30),
            AssetState::new("a1", "humidity", json!(80), Utc::now()),
            temp("a2", 30),
            AssetState::new("a2", "humidity", json!(10), Utc::now()),
        ];
        let humid = AttributePredicate::new(
            "humidity",
            ValuePredicate::number(AssetQueryOperator::GreaterEquals, 70.0),
        );
        let q = AssetQuery::default().with_attributes(LogicGroup::and(vec![hot(), humid]));
        let r = run_query(&q, &facts, &store);
        assert_eq!(r.matched_ids(), BTreeSet::from(["a1"]));
        assert_eq!(r.matched["a1"].len(), 2);
        assert_eq!(r.unmatched, BTreeSet::from(["a2"]));
    }

    #[test]
    fn matched_facts_only_include_leaf_hits() {
        let store = InMemoryFactStore::new();
        let facts = vec![temp("a1", 30), AssetState::new("a1", "label", json!("x"), Utc::now())];
        let q = AssetQuery::default().with_attributes(LogicGroup::and(vec![hot()]));
        let r = run_query(&q, &facts, &store);
        let names: Vec<&str> = r.matched_facts().map(|f| f.attribute_name.as_str()).collect();
        assert_eq!(names, vec!["temp"]);
    }

    #[test]
    fn type_mismatch_is_isolated_to_the_fact() {
        let store = InMemoryFactStore::new();
        let facts = vec![
            AssetState::new("a1", "temp", json!("broken"), Utc::now()),
            temp("a2", 40),
        ];
        let q = AssetQuery::default().with_attributes(LogicGroup::and(vec![hot()]));
        let r = run_query(&q, &facts, &store);
        assert_eq!(r.matched_ids(), BTreeSet::from(["a2"]));
        assert_eq!(r.unmatched, BTreeSet::from(["a1"]));
    }

    #[test]
    fn scope_filters() {
        let store = InMemoryFactStore::new();
        store.add_user(User {
            id: "u1".into(),
            username: "alice".into(),
            realm: String::new(),
            assets: vec!["kitchen".into()],
        });
        let kitchen = AssetState::new("kitchen", "temp", json!(1), Utc::now())
            .with_name("Kitchen")
            .with_parent(&["home"])
            .with_realm("master");
        let attic = AssetState::new("attic", "temp", json!(1), Utc::now()).with_name("Attic");

        let q = AssetQuery {
            names: vec![StringPredicate::exact("Kitchen")],
            ..Default::default()
        };
        assert!(in_scope(&q, &kitchen, &store));
        assert!(!in_scope(&q, &attic, &store));

        let q = AssetQuery {
            parents: vec![ParentPredicate { id: Some("home".into()) }],
            ..Default::default()
        };
        assert!(in_scope(&q, &kitchen, &store));
        assert!(!in_scope(&q, &attic, &store));

        let q = AssetQuery {
            paths: vec![PathPredicate { path: vec!["home".into(), "kitchen".into()] }],
            realm: Some(RealmPredicate { name: Some("master".into()) }),
            ..Default::default()
        };
        assert!(in_scope(&q, &kitchen, &store));

        let q = AssetQuery {
            user_ids: vec!["u1".into()],
            ..Default::default()
        };
        assert!(in_scope(&q, &kitchen, &store));
        assert!(!in_scope(&q, &attic, &store));
    }

    #[test]
    fn order_and_limit_matched_ids() {
        let store = InMemoryFactStore::new();
        let facts = vec![
            temp("a1", 30).with_name("Charlie"),
            temp("a2", 30).with_name("Alpha"),
            temp("a3", 30).with_name("Bravo"),
        ];
        let mut q = AssetQuery::default();
        let r = run_query(&q, &facts, &store);
        assert_eq!(order_and_limit(&q, &r.matched), vec!["a1", "a2", "a3"]);

        q.order_by = Some(OrderBy { property: OrderByProperty::Name, descending: false });
        q.limit = Some(2);
        assert_eq!(order_and_limit(&q, &r.matched), vec!["a2", "a3"]);

        q.order_by = Some(OrderBy { property: OrderByProperty::Name, descending: true });
        q.limit = Some(0);
        assert_eq!(order_and_limit(&q, &r.matched), vec!["a1", "a3", "a2"]);
    }
}
