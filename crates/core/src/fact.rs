use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type AssetId = String;

/// Identity of a fact: one attribute of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactKey {
    pub asset_id: AssetId,
    pub attribute_name: String,
}

impl FactKey {
    pub fn new(asset_id: impl Into<String>, attribute_name: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            attribute_name: attribute_name.into(),
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset_id, self.attribute_name)
    }
}

/// Immutable snapshot of a single asset attribute (an "asset state").
///
/// Supplied by the fact store once per evaluation cycle. The rules engine
/// never mutates these; a changed attribute arrives as a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetState {
    /// Asset id.
    pub id: AssetId,
    /// Asset name.
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub asset_type: String,
    #[serde(default)]
    pub parent_id: Option<AssetId>,
    /// Ancestor ids from the root down to (and including) this asset.
    #[serde(default)]
    pub path: Vec<AssetId>,
    #[serde(default)]
    pub realm: String,
    pub attribute_name: String,
    #[serde(default)]
    pub value: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub old_value: Option<Value>,
    #[serde(default)]
    pub old_value_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
}

impl AssetState {
    pub fn new(
        asset_id: impl Into<String>,
        attribute_name: impl Into<String>,
        value: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let id = asset_id.into();
        Self {
            name: id.clone(),
            path: vec![id.clone()],
            id,
            asset_type: String::new(),
            parent_id: None,
            realm: String::new(),
            attribute_name: attribute_name.into(),
            value: if value.is_null() { None } else { Some(value) },
            timestamp,
            old_value: None,
            old_value_timestamp: None,
            created_on: None,
        }
    }

    pub fn key(&self) -> FactKey {
        FactKey::new(self.id.clone(), self.attribute_name.clone())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = asset_type.into();
        self
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Set the parent and rebuild `path` as `parent_path + [id]`.
    pub fn with_parent(mut self, parent_path: &[&str]) -> Self {
        self.parent_id = parent_path.last().map(|p| p.to_string());
        self.path = parent_path.iter().map(|p| p.to_string()).collect();
        self.path.push(self.id.clone());
        self
    }

    pub fn with_old_value(mut self, old_value: Value) -> Self {
        self.old_value = if old_value.is_null() { None } else { Some(old_value) };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_identifies_asset_and_attribute() {
        let state = AssetState::new("a1", "temp", json!(21.5), Utc::now());
        assert_eq!(state.key(), FactKey::new("a1", "temp"));
        assert_eq!(state.key().to_string(), "a1:temp");
    }

    #[test]
    fn null_value_is_absent() {
        let state = AssetState::new("a1", "temp", Value::Null, Utc::now());
        assert!(state.value.is_none());
    }

    #[test]
    fn with_parent_builds_path() {
        let state = AssetState::new("room", "temp", json!(1), Utc::now())
            .with_parent(&["site", "building"]);
        assert_eq!(state.parent_id.as_deref(), Some("building"));
        assert_eq!(state.path, vec!["site", "building", "room"]);
    }

    #[test]
    fn deserializes_camel_case_snapshot() {
        let state: AssetState = serde_json::from_str(
            r#"{
                "id": "a1",
                "name": "Boiler",
                "type": "ThermostatAsset",
                "realm": "master",
                "attributeName": "temp",
                "value": 30,
                "timestamp": "2024-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(state.asset_type, "ThermostatAsset");
        assert_eq!(state.value, Some(json!(30)));
        assert!(state.parent_id.is_none());
    }
}
