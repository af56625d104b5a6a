//! Sink policy documents.
//!
//! A sink policy names the source accounts allowed to attach links to a sink
//! and restricts which resource types those links may share. The builder is
//! pure: account ids are passed through untouched and only the provider
//! decides whether they are valid.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::contract::stable_contract_json;
use crate::resource_types::link_resource_types;

pub const POLICY_VERSION: &str = "2012-10-17";
pub const LINK_ACTIONS: [&str; 2] = ["oam:CreateLink", "oam:UpdateLink"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SinkPolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: Vec<String>,
    pub effect: String,
    pub resource: String,
    pub principal: PolicyPrincipal,
    pub condition: PolicyCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyPrincipal {
    #[serde(rename = "AWS")]
    pub aws: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyCondition {
    #[serde(rename = "ForAllValues:StringEquals")]
    pub for_all_values_string_equals: ResourceTypeCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceTypeCondition {
    #[serde(rename = "oam:ResourceTypes")]
    pub resource_types: Vec<String>,
}

pub fn build_sink_policy<S: AsRef<str>>(account_ids: &[S]) -> SinkPolicyDocument {
    SinkPolicyDocument {
        version: POLICY_VERSION.to_string(),
        statement: vec![PolicyStatement {
            action: LINK_ACTIONS.iter().map(|action| action.to_string()).collect(),
            effect: "Allow".to_string(),
            resource: "*".to_string(),
            principal: PolicyPrincipal {
                aws: account_ids
                    .iter()
                    .map(|account_id| account_id.as_ref().to_string())
                    .collect(),
            },
            condition: PolicyCondition {
                for_all_values_string_equals: ResourceTypeCondition {
                    resource_types: link_resource_types(),
                },
            },
        }],
    }
}

impl SinkPolicyDocument {
    pub fn to_json(&self) -> String {
        stable_contract_json(self)
    }

    /// Principals across all statements, in declaration order.
    pub fn principals(&self) -> Vec<&str> {
        self.statement
            .iter()
            .flat_map(|statement| statement.principal.aws.iter().map(String::as_str))
            .collect()
    }

    pub fn allowed_resource_types(&self) -> BTreeSet<&str> {
        self.statement
            .iter()
            .flat_map(|statement| {
                statement
                    .condition
                    .for_all_values_string_equals
                    .resource_types
                    .iter()
                    .map(String::as_str)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn policy_json_matches_wire_shape() {
        let document = build_sink_policy(&["111111111111", "222222222222"]);
        let parsed: Value = serde_json::from_str(&document.to_json()).expect("valid json");

        assert_eq!(
            parsed,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": ["oam:CreateLink", "oam:UpdateLink"],
                    "Effect": "Allow",
                    "Resource": "*",
                    "Principal": {"AWS": ["111111111111", "222222222222"]},
                    "Condition": {
                        "ForAllValues:StringEquals": {
                            "oam:ResourceTypes": [
                                "AWS::ApplicationInsights::Application",
                                "AWS::CloudWatch::Metric",
                                "AWS::Logs::LogGroup",
                                "AWS::XRay::Trace"
                            ]
                        }
                    }
                }]
            })
        );
    }

    #[test]
    fn policy_json_keeps_field_order() {
        let encoded = build_sink_policy(&["111111111111"]).to_json();
        let version_at = encoded.find("\"Version\"").expect("version present");
        let statement_at = encoded.find("\"Statement\"").expect("statement present");
        let action_at = encoded.find("\"Action\"").expect("action present");
        let condition_at = encoded.find("\"Condition\"").expect("condition present");

        assert!(version_at < statement_at);
        assert!(action_at < condition_at);
    }

    #[test]
    fn principals_preserve_input_order() {
        let document = build_sink_policy(&["333333333333", "111111111111"]);
        assert_eq!(document.principals(), vec!["333333333333", "111111111111"]);
    }

    #[test]
    fn empty_account_list_still_builds_a_document() {
        let document = build_sink_policy::<&str>(&[]);
        assert!(document.principals().is_empty());
        assert_eq!(document.allowed_resource_types().len(), 4);
    }
}
