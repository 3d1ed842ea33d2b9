//! Action target declarations.

use serde::{Deserialize, Serialize};

use super::{AssetQuery, UserQuery};

/// Declares who an action addresses.
///
/// Resolved with strict precedence: `conditionAssets` > `matchedAssets` >
/// `assets` > `users` > `linkedUsers` > `custom`. With nothing set the action
/// targets the assets that caused the rule to trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleActionTarget {
    /// Tag of the `when` condition whose matched assets are targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_assets: Option<String>,
    /// Filter applied to the assets that triggered the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_assets: Option<AssetQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<AssetQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<UserQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_users: Option<bool>,
    /// Opaque value forwarded to the action implementation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

impl RuleActionTarget {
    pub fn condition_assets(tag: impl Into<String>) -> Self {
        Self {
            condition_assets: Some(tag.into()),
            ..Default::default()
        }
    }
}
