//! Asset and user query types used by triggers and action targets.

use serde::{Deserialize, Serialize};

use super::{AttributePredicate, LogicGroup, StringPredicate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentPredicate {
    #[serde(default)]
    pub id: Option<String>,
}

/// Exact match against an asset's full path (root first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPredicate {
    #[serde(default)]
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmPredicate {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderByProperty {
    CreatedOn,
    #[default]
    Name,
    AssetType,
    ParentId,
    Realm,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    #[serde(default)]
    pub property: OrderByProperty,
    #[serde(default)]
    pub descending: bool,
}

/// Query selecting asset states.
///
/// Every populated list is an any-of filter; populated fields are AND-ed.
/// `attributes` is evaluated per asset across all of that asset's states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<StringPredicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentPredicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathPredicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<RealmPredicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<LogicGroup<AttributePredicate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl AssetQuery {
    pub fn with_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_ids(mut self, ids: &[&str]) -> Self {
        self.ids = ids.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_attributes(mut self, attributes: LogicGroup<AttributePredicate>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// The same entity scope with the attribute-value predicates removed.
    pub fn relaxed(&self) -> AssetQuery {
        AssetQuery {
            attributes: None,
            order_by: None,
            limit: None,
            ..self.clone()
        }
    }
}

/// Query selecting users, resolved by the fact store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usernames: Vec<StringPredicate>,
    /// Users linked to any of these assets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
    #[serde(default, alias = "realmPredicate", skip_serializing_if = "Option::is_none")]
    pub realm: Option<RealmPredicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}
