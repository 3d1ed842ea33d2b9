//! Action target resolution.
//!
//! Maps a declared [`RuleActionTarget`] to concrete assets or users with a
//! fixed precedence. The first populated field decides, even if it resolves
//! to nothing. Resolution reads facts and the store only; nothing is
//! dispatched here.

use std::collections::{BTreeMap, BTreeSet};

use assetflow_core::{AssetId, AssetState, UserId};
use serde::Serialize;

use crate::error::TargetError;
use crate::evaluator::{order_and_limit, run_query};
use crate::schema::RuleActionTarget;
use crate::store::FactStore;

/// Concrete recipients of one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ids", rename_all = "camelCase")]
pub enum ResolvedTargets {
    Assets(BTreeSet<AssetId>),
    Users(BTreeSet<UserId>),
    /// Opaque value forwarded to the action implementation.
    Custom(String),
}

impl ResolvedTargets {
    pub fn is_empty(&self) -> bool {
        match self {
            ResolvedTargets::Assets(ids) => ids.is_empty(),
            ResolvedTargets::Users(ids) => ids.is_empty(),
            ResolvedTargets::Custom(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResolvedTargets::Assets(ids) => ids.len(),
            ResolvedTargets::Users(ids) => ids.len(),
            ResolvedTargets::Custom(_) => 1,
        }
    }
}

/// What an action block knows when its targets are resolved.
pub struct TargetContext<'a> {
    /// Assets that caused this block to run: the default target.
    pub block_assets: &'a BTreeSet<AssetId>,
    /// Facts of those assets, filtered by `matchedAssets` queries.
    pub block_facts: &'a [&'a AssetState],
    /// Per condition tag, the assets that condition contributed.
    pub condition_assets: &'a BTreeMap<String, BTreeSet<AssetId>>,
    /// The cycle's full fact snapshot, for standalone `assets` queries.
    pub snapshot: &'a [AssetState],
    pub store: &'a dyn FactStore,
}

/// Resolve `target` in `ctx`.
///
/// Precedence: `conditionAssets` > `matchedAssets` > `assets` > `users` >
/// `linkedUsers` > `custom`; with none set, the block's assets. An unknown
/// condition tag resolves to no assets.
pub fn resolve(
    target: Option<&RuleActionTarget>,
    ctx: &TargetContext<'_>,
) -> Result<ResolvedTargets, TargetError> {
    let Some(target) = target else {
        return Ok(ResolvedTargets::Assets(ctx.block_assets.clone()));
    };

    if let Some(tag) = &target.condition_assets {
        let ids = ctx.condition_assets.get(tag).cloned().unwrap_or_default();
        return Ok(ResolvedTargets::Assets(ids));
    }

    if let Some(query) = &target.matched_assets {
        let result = run_query(query, ctx.block_facts.iter().copied(), ctx.store);
        let ids = order_and_limit(query, &result.matched)
            .into_iter()
            .filter(|id| ctx.block_assets.contains(*id))
            .map(str::to_string)
            .collect();
        return Ok(ResolvedTargets::Assets(ids));
    }

    if let Some(query) = &target.assets {
        let result = run_query(query, ctx.snapshot, ctx.store);
        let ids = order_and_limit(query, &result.matched)
            .into_iter()
            .map(str::to_string)
            .collect();
        return Ok(ResolvedTargets::Assets(ids));
    }

    if let Some(query) = &target.users {
        let users = ctx
            .store
            .find_users(query)
            .map_err(|e| TargetError::collaborator("users", e))?;
        return Ok(ResolvedTargets::Users(users.into_iter().collect()));
    }

    if target.linked_users == Some(true) {
        let mut users = BTreeSet::new();
        for asset_id in ctx.block_assets {
            let linked = ctx
                .store
                .linked_users(asset_id)
                .map_err(|e| TargetError::collaborator("linkedUsers", e))?;
            users.extend(linked);
        }
        return Ok(ResolvedTargets::Users(users));
    }

    if let Some(custom) = &target.custom {
        return Ok(ResolvedTargets::Custom(custom.clone()));
    }

    Ok(ResolvedTargets::Assets(ctx.block_assets.clone()))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assetflow_core::{StoreError, User};
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::schema::{AssetQuery, UserQuery};
    use crate::store::InMemoryFactStore;

    struct Fixture {
        store: InMemoryFactStore,
        snapshot: Vec<AssetState>,
        block_assets: BTreeSet<AssetId>,
        condition_assets: BTreeMap<String, BTreeSet<AssetId>>,
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fixture() -> Fixture {
        let store = InMemoryFactStore::new();
        store.add_user(User {
            id: "u1".into(),
            username: "alice".into(),
            realm: String::new(),
            assets: vec!["a1".into()],
        });
        store.add_user(User {
            id: "u2".into(),
            username: "bob".into(),
            realm: String::new(),
            assets: vec!["a2".into(), "a3".into()],
        });
        let snapshot = vec![
            AssetState::new("a1", "temp", json!(30), Utc::now()).with_type("Thermostat"),
            AssetState::new("a2", "temp", json!(31), Utc::now()).with_type("Thermostat"),
            AssetState::new("a3", "co2", json!(900), Utc::now()).with_type("Room"),
        ];
        let mut condition_assets = BTreeMap::new();
        condition_assets.insert("hot".to_string(), ids(&["a2"]));
        condition_assets.insert("empty".to_string(), BTreeSet::new());
        Fixture {
            store,
            snapshot,
            block_assets: ids(&["a1", "a2"]),
            condition_assets,
        }
    }

    fn run(fx: &Fixture, target: Option<&RuleActionTarget>) -> Result<ResolvedTargets, TargetError> {
        let block_facts: Vec<&AssetState> = fx
            .snapshot
            .iter()
            .filter(|f| fx.block_assets.contains(&f.id))
            .collect();
        let ctx = TargetContext {
            block_assets: &fx.block_assets,
            block_facts: &block_facts,
            condition_assets: &fx.condition_assets,
            snapshot: &fx.snapshot,
            store: &fx.store,
        };
        resolve(target, &ctx)
    }

    #[test]
    fn default_is_block_assets() {
        let fx = fixture();
        assert_eq!(run(&fx, None).unwrap(), ResolvedTargets::Assets(ids(&["a1", "a2"])));
        let empty = RuleActionTarget::default();
        assert_eq!(run(&fx, Some(&empty)).unwrap(), ResolvedTargets::Assets(ids(&["a1", "a2"])));
    }

    #[test]
    fn condition_assets_beat_assets() {
        let fx = fixture();
        let target = RuleActionTarget {
            condition_assets: Some("hot".into()),
            assets: Some(AssetQuery::default().with_ids(&["a3"])),
            ..Default::default()
        };
        assert_eq!(run(&fx, Some(&target)).unwrap(), ResolvedTargets::Assets(ids(&["a2"])));
    }

    #[test]
    fn present_but_empty_does_not_fall_through() {
        let fx = fixture();
        let target = RuleActionTarget {
            condition_assets: Some("empty".into()),
            linked_users: Some(true),
            ..Default::default()
        };
        let resolved = run(&fx, Some(&target)).unwrap();
        assert_eq!(resolved, ResolvedTargets::Assets(BTreeSet::new()));
        assert!(resolved.is_empty());

        let target = RuleActionTarget {
            matched_assets: Some(AssetQuery::default().with_types(&["Room"])),
            custom: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(run(&fx, Some(&target)).unwrap(), ResolvedTargets::Assets(BTreeSet::new()));
    }

    #[test]
    fn matched_assets_filters_block() {
        let fx = fixture();
        let target = RuleActionTarget {
            matched_assets: Some(AssetQuery::default().with_ids(&["a2", "a3"])),
            ..Default::default()
        };
        assert_eq!(run(&fx, Some(&target)).unwrap(), ResolvedTargets::Assets(ids(&["a2"])));
    }

    #[test]
    fn assets_query_ignores_block() {
        let fx = fixture();
        let target = RuleActionTarget {
            assets: Some(AssetQuery::default().with_types(&["Room"])),
            ..Default::default()
        };
        assert_eq!(run(&fx, Some(&target)).unwrap(), ResolvedTargets::Assets(ids(&["a3"])));
    }

    #[test]
    fn users_and_linked_users() {
        let fx = fixture();
        let target = RuleActionTarget {
            users: Some(UserQuery {
                ids: vec!["u2".into()],
                ..Default::default()
            }),
            linked_users: Some(true),
            ..Default::default()
        };
        assert_eq!(run(&fx, Some(&target)).unwrap(), ResolvedTargets::Users(ids(&["u2"])));

        let target = RuleActionTarget {
            linked_users: Some(true),
            custom: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(run(&fx, Some(&target)).unwrap(), ResolvedTargets::Users(ids(&["u1", "u2"])));
    }

    #[test]
    fn custom_passes_through() {
        let fx = fixture();
        let target = RuleActionTarget {
            linked_users: Some(false),
            custom: Some("ops-channel".into()),
            ..Default::default()
        };
        assert_eq!(
            run(&fx, Some(&target)).unwrap(),
            ResolvedTargets::Custom("ops-channel".into())
        );
    }

    struct Offline;

    impl FactStore for Offline {
        fn current_facts(&self, _scope: &str) -> Result<Vec<AssetState>, StoreError> {
            Ok(Vec::new())
        }
        fn linked_users(&self, _asset_id: &str) -> Result<Vec<UserId>, StoreError> {
            Err(StoreError::Unavailable("directory down".into()))
        }
    }

    #[test]
    fn collaborator_failure_is_target_error() {
        let block_assets = ids(&["a1"]);
        let condition_assets = BTreeMap::new();
        let ctx = TargetContext {
            block_assets: &block_assets,
            block_facts: &[],
            condition_assets: &condition_assets,
            snapshot: &[],
            store: &Offline,
        };
        let target = RuleActionTarget {
            linked_users: Some(true),
            ..Default::default()
        };
        let err = resolve(Some(&target), &ctx).unwrap_err();
        assert!(matches!(err, TargetError::Collaborator { target: "linkedUsers", .. }));

        let target = RuleActionTarget {
            users: Some(UserQuery::default()),
            ..Default::default()
        };
        let err = resolve(Some(&target), &ctx).unwrap_err();
        assert_eq!(
            err,
            TargetError::collaborator("users", StoreError::Unsupported("find_users"))
        );
    }
}
