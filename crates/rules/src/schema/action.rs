//! Rule action types, discriminated by the `action` property.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RuleActionTarget;

/// Discriminator strings accepted for `action`.
pub const ACTION_KINDS: &[&str] = &[
    "wait",
    "write-attribute",
    "notification",
    "update-attribute",
    "webhook",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum RuleAction {
    Wait(RuleActionWait),
    WriteAttribute(RuleActionWriteAttribute),
    Notification(RuleActionNotification),
    UpdateAttribute(RuleActionUpdateAttribute),
    Webhook(RuleActionWebhook),
}

impl RuleAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleAction::Wait(_) => "wait",
            RuleAction::WriteAttribute(_) => "write-attribute",
            RuleAction::Notification(_) => "notification",
            RuleAction::UpdateAttribute(_) => "update-attribute",
            RuleAction::Webhook(_) => "webhook",
        }
    }

    pub fn target(&self) -> Option<&RuleActionTarget> {
        match self {
            RuleAction::Wait(a) => a.target.as_ref(),
            RuleAction::WriteAttribute(a) => a.target.as_ref(),
            RuleAction::Notification(a) => a.target.as_ref(),
            RuleAction::UpdateAttribute(a) => a.target.as_ref(),
            RuleAction::Webhook(a) => a.target.as_ref(),
        }
    }

    /// Write and update actions address attributes, so only assets make sense.
    pub fn requires_asset_targets(&self) -> bool {
        matches!(
            self,
            RuleAction::WriteAttribute(_) | RuleAction::UpdateAttribute(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleActionWait {
    #[serde(default)]
    pub millis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RuleActionTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleActionWriteAttribute {
    pub attribute_name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RuleActionTarget>,
}

/// Notification payload is passed through untouched to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleActionNotification {
    #[serde(default)]
    pub notification: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RuleActionTarget>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateAction {
    Add,
    #[default]
    AddOrReplace,
    Replace,
    Delete,
    Clear,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleActionUpdateAttribute {
    pub attribute_name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub update_action: UpdateAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RuleActionTarget>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub http_method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleActionWebhook {
    pub webhook: Webhook,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<RuleActionTarget>,
}
