use serde::{Deserialize, Serialize};

use crate::fact::AssetId;

pub type UserId = String;

/// A user known to the fact store, with the assets linked to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub realm: String,
    #[serde(default)]
    pub assets: Vec<AssetId>,
}

impl User {
    pub fn is_linked_to(&self, asset_id: &str) -> bool {
        self.assets.iter().any(|a| a == asset_id)
    }
}
