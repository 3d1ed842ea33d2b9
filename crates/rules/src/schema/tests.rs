//! Tests for schema types.

use serde_json::json;

use super::*;
use crate::error::DefinitionError;

const THERMOSTAT_RULESET: &str = r#"
{
  "rules": [
    {
      "name": "Too hot",
      "priority": 10,
      "when": {
        "operator": "OR",
        "groups": [
          {
            "items": [
              {
                "tag": "hot",
                "assets": {
                  "types": ["ThermostatAsset"],
                  "attributes": {
                    "items": [
                      {
                        "name": {"predicateType": "string", "value": "temperature"},
                        "value": {"predicateType": "number", "operator": "GREATER_THAN", "value": 25}
                      }
                    ]
                  }
                }
              }
            ]
          }
        ]
      },
      "then": [
        {"action": "wait", "millis": 500},
        {
          "action": "write-attribute",
          "attributeName": "fanOn",
          "value": true,
          "target": {"conditionAssets": "hot"}
        },
        {
          "action": "notification",
          "notification": {"name": "hot", "message": {"type": "push", "title": "Hot"}},
          "target": {"linkedUsers": true}
        }
      ],
      "otherwise": [
        {"action": "update-attribute", "attributeName": "log", "value": "cool", "updateAction": "ADD"}
      ],
      "recurrence": {"scope": "PER_ASSET", "mins": 0},
      "reset": {"noLongerMatches": true}
    }
  ]
}
"#;

#[test]
fn deserialize_full_ruleset() {
    let def: JsonRulesetDefinition = serde_json::from_str(THERMOSTAT_RULESET).unwrap();
    assert_eq!(def.rules.len(), 1);
    let rule = &def.rules[0];
    assert_eq!(rule.name, "Too hot");
    assert_eq!(rule.priority, 10);
    assert!(rule.enabled);

    let when = rule.when.as_ref().unwrap();
    assert_eq!(when.operator, LogicGroupOperator::Or);
    assert!(when.items.is_empty());
    let leaves = when.leaves();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].tag.as_deref(), Some("hot"));
    match leaves[0].trigger() {
        Some(RuleTrigger::Assets(query)) => {
            assert_eq!(query.types, vec!["ThermostatAsset"]);
            let attrs = query.attributes.as_ref().unwrap();
            assert_eq!(
                attrs.items[0].value,
                Some(ValuePredicate::number(AssetQueryOperator::GreaterThan, 25.0))
            );
        }
        other => panic!("expected asset trigger, got {other:?}"),
    }

    assert_eq!(rule.then.len(), 3);
    assert_eq!(rule.then[0].kind(), "wait");
    assert_eq!(
        rule.then[1].target(),
        Some(&RuleActionTarget::condition_assets("hot"))
    );
    assert_eq!(rule.then[2].target().unwrap().linked_users, Some(true));

    match &rule.otherwise[0] {
        RuleAction::UpdateAttribute(a) => assert_eq!(a.update_action, UpdateAction::Add),
        other => panic!("expected update-attribute, got {other:?}"),
    }

    assert_eq!(
        rule.recurrence,
        Some(RuleRecurrence {
            scope: RuleRecurrenceScope::PerAsset,
            mins: Some(0)
        })
    );
    assert!(rule.reset.as_ref().unwrap().no_longer_matches);
}

#[test]
fn rule_defaults() {
    let rule: JsonRule = serde_json::from_value(json!({"name": "bare"})).unwrap();
    assert_eq!(rule.priority, DEFAULT_PRIORITY);
    assert!(rule.enabled);
    assert!(rule.when.is_none());
    assert!(!rule.has_trigger());
    assert!(rule.recurrence.is_none());
}

#[test]
fn legacy_group_field_names() {
    let group: LogicGroup<RuleCondition> = serde_json::from_value(json!({
        "operator": "AND",
        "predicates": [{"timer": "1h"}],
        "conditions": [{"operator": "OR", "predicates": [{"timer": "0 0 * * *"}]}]
    }))
    .unwrap();
    assert_eq!(group.items.len(), 1);
    assert_eq!(group.groups.len(), 1);
    assert_eq!(group.groups[0].operator, LogicGroupOperator::Or);
}

#[test]
fn flatten_is_depth_first_items_before_groups() {
    let groups = vec![LogicGroup::and(vec!["a", "b"]).with_group(LogicGroup::and(vec!["c"]))];
    let flat: Vec<&str> = LogicGroup::flatten(&groups).into_iter().copied().collect();
    assert_eq!(flat, vec!["a", "b", "c"]);
}

#[test]
fn flatten_across_sibling_groups() {
    let groups = vec![
        LogicGroup::or(vec![1]).with_group(LogicGroup::and(vec![2, 3])),
        LogicGroup::and(vec![4]),
    ];
    let flat: Vec<i32> = LogicGroup::flatten(&groups).into_iter().copied().collect();
    assert_eq!(flat, vec![1, 2, 3, 4]);
}

#[test]
fn map_preserves_shape() {
    let group = LogicGroup::or(vec![1, 2]).with_group(LogicGroup::and(vec![3]));
    let mapped = group.map(&mut |n: &i32| n * 10);
    assert_eq!(mapped.operator, LogicGroupOperator::Or);
    assert_eq!(mapped.items, vec![10, 20]);
    assert_eq!(mapped.groups[0].items, vec![30]);
}

#[test]
fn asset_trigger_wins_over_timer() {
    let condition = RuleCondition {
        assets: Some(AssetQuery::default().with_ids(&["a1"])),
        timer: Some("1h".into()),
        ..Default::default()
    };
    assert!(matches!(condition.trigger(), Some(RuleTrigger::Assets(_))));
    assert_eq!(RuleCondition::timer("  ").trigger(), None);
    assert_eq!(
        RuleCondition::timer("5m").trigger(),
        Some(RuleTrigger::Timer("5m"))
    );
}

#[test]
fn recurrence_null_mins_is_preserved() {
    let r: RuleRecurrence = serde_json::from_value(json!({"scope": "GLOBAL"})).unwrap();
    assert_eq!(r.scope, RuleRecurrenceScope::Global);
    assert_eq!(r.mins, None);

    let r: RuleRecurrence = serde_json::from_value(json!({"mins": 10})).unwrap();
    assert_eq!(r.scope, RuleRecurrenceScope::PerAsset);
    assert_eq!(r.mins, Some(10));
}

#[test]
fn reset_unset_detection() {
    assert!(RuleTriggerReset::default().is_unset());
    let r: RuleTriggerReset = serde_json::from_value(json!({"timer": " "})).unwrap();
    assert!(r.is_unset());
    let r: RuleTriggerReset = serde_json::from_value(json!({"valueChanges": true})).unwrap();
    assert!(!r.is_unset());
}

#[test]
fn value_predicate_discriminators() {
    let cases = [
        (json!({"predicateType": "string", "value": "x"}), "string"),
        (json!({"predicateType": "number", "value": 1}), "number"),
        (json!({"predicateType": "boolean", "value": true}), "boolean"),
        (json!({"predicateType": "datetime", "value": "2024-01-01T00:00:00Z"}), "datetime"),
        (json!({"predicateType": "array", "lengthEquals": 2}), "array"),
        (json!({"predicateType": "value-any"}), "value-any"),
        (json!({"predicateType": "value-empty"}), "value-empty"),
    ];
    for (raw, expected) in cases {
        let p: ValuePredicate = serde_json::from_value(raw).unwrap();
        assert_eq!(p.type_name(), expected);
    }
    assert!(serde_json::from_value::<ValuePredicate>(json!({"predicateType": "geo"})).is_err());
}

#[test]
fn action_discriminators_roundtrip_exactly() {
    let action = RuleAction::WriteAttribute(RuleActionWriteAttribute {
        attribute_name: "on".into(),
        value: json!(true),
        target: None,
    });
    let v = serde_json::to_value(&action).unwrap();
    assert_eq!(v["action"], "write-attribute");
    assert_eq!(v["attributeName"], "on");

    let webhook: RuleAction = serde_json::from_value(json!({
        "action": "webhook",
        "webhook": {"url": "https://example.com/hook", "httpMethod": "PUT"},
        "mediaType": "application/json"
    }))
    .unwrap();
    match webhook {
        RuleAction::Webhook(w) => {
            assert_eq!(w.webhook.http_method, HttpMethod::Put);
            assert_eq!(w.media_type.as_deref(), Some("application/json"));
        }
        other => panic!("expected webhook, got {other:?}"),
    }
}

#[test]
fn attribute_actions_require_asset_targets() {
    let wait = RuleAction::Wait(RuleActionWait::default());
    assert!(!wait.requires_asset_targets());
    let update = RuleAction::UpdateAttribute(RuleActionUpdateAttribute::default());
    assert!(update.requires_asset_targets());
}

#[test]
fn unknown_action_is_reported_by_name() {
    let err = JsonRule::from_value(&json!({
        "name": "r",
        "then": [{"action": "email"}]
    }))
    .unwrap_err();
    assert_eq!(
        err,
        DefinitionError::UnknownAction {
            block: "then",
            action: "email".into()
        }
    );

    let err = JsonRule::from_value(&json!({"name": "r", "onStop": [{"millis": 5}]})).unwrap_err();
    assert!(matches!(err, DefinitionError::UnknownAction { block: "onStop", .. }));
}

#[test]
fn malformed_rule_is_a_definition_error() {
    let err = JsonRule::from_value(&json!({"priority": 3})).unwrap_err();
    assert!(matches!(err, DefinitionError::Malformed(_)));
}

#[test]
fn envelope_isolates_bad_rules() {
    let envelope = RulesetEnvelope::from_json(
        r#"{"rules": [
            {"name": "good", "when": {"items": [{"timer": "1h"}]}},
            {"name": "bad", "then": [{"action": "teleport"}]}
        ]}"#,
    )
    .unwrap();
    let parsed = envelope.parse_rules();
    assert_eq!(parsed.len(), 2);
    assert!(parsed[0].1.is_ok());
    assert!(parsed[1].1.is_err());
    assert_eq!(envelope.rule_name(1), "bad");
    assert_eq!(envelope.rule_name(7), "#7");
    assert!(envelope.into_definition().is_err());
}

#[test]
fn envelope_from_yaml() {
    let yaml = r#"
rules:
  - name: nightly
    when:
      items:
        - timer: "0 2 * * *"
    then:
      - action: notification
        notification:
          name: nightly-report
meta:
  owner: ops
"#;
    let envelope = RulesetEnvelope::from_yaml(yaml).unwrap();
    assert_eq!(envelope.meta.get("owner"), Some(&json!("ops")));
    let def = envelope.into_definition().unwrap();
    assert_eq!(def.rules[0].name, "nightly");
    assert_eq!(def.rules[0].then[0].kind(), "notification");
}

#[test]
fn asset_query_relaxed_drops_value_predicates() {
    let query = AssetQuery {
        types: vec!["Room".into()],
        limit: Some(1),
        order_by: Some(OrderBy::default()),
        ..Default::default()
    }
    .with_attributes(LogicGroup::and(vec![AttributePredicate::new(
        "co2",
        ValuePredicate::number(AssetQueryOperator::GreaterThan, 800.0),
    )]));
    let relaxed = query.relaxed();
    assert_eq!(relaxed.types, vec!["Room"]);
    assert!(relaxed.attributes.is_none());
    assert!(relaxed.limit.is_none());
    assert!(relaxed.order_by.is_none());
}

#[test]
fn user_query_accepts_realm_predicate_alias() {
    let q: UserQuery =
        serde_json::from_value(json!({"realmPredicate": {"name": "master"}, "limit": 2})).unwrap();
    assert_eq!(q.realm.unwrap().name.as_deref(), Some("master"));
    assert_eq!(q.limit, Some(2));
}
