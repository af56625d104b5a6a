use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MANIFEST_SCHEMA_VERSION: &str = "v1";
pub const DEFAULT_ASSUME_ROLE_NAME: &str = "OrganizationAccountAccessRole";
pub const DEFAULT_LABEL_TEMPLATE: &str = "$AccountName";
/// Account ids shipped in sample configuration start with this marker and
/// must be replaced before anything is synthesized.
pub const PLACEHOLDER_SENTINEL: &str = "__UPDATE_ME";
pub const PROJECT_ID_TAG: &str = "ProjectId";

pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    #[default]
    Remove,
    Retain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceAccountSpec {
    pub name: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyRequest {
    pub project_id: String,
    pub regions: Vec<String>,
    pub source_accounts: Vec<SourceAccountSpec>,
    #[serde(default = "default_assume_role_name")]
    pub assume_role_name: String,
    #[serde(default = "default_label_template")]
    pub label_template: String,
    #[serde(default)]
    pub removal: RemovalPolicy,
    #[serde(default)]
    pub default_tags: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedTopology {
    pub project_id: String,
    pub regions: Vec<String>,
    pub source_accounts: Vec<SourceAccountSpec>,
    pub assume_role_name: String,
    pub label_template: String,
    pub removal: RemovalPolicy,
    pub tags: Tags,
}

impl NormalizedTopology {
    pub fn source_account_ids(&self) -> Vec<String> {
        self.source_accounts
            .iter()
            .map(|account| account.account_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn default_assume_role_name() -> String {
    DEFAULT_ASSUME_ROLE_NAME.to_string()
}

pub fn default_label_template() -> String {
    DEFAULT_LABEL_TEMPLATE.to_string()
}

pub fn is_placeholder(value: &str) -> bool {
    value.starts_with(PLACEHOLDER_SENTINEL)
}

pub fn normalize_request(payload: TopologyRequest) -> Result<NormalizedTopology, ValidationError> {
    let project_id = payload.project_id.trim().to_string();
    if project_id.is_empty() {
        return Err(ValidationError::new("project_id cannot be empty"));
    }

    if payload.regions.is_empty() {
        return Err(ValidationError::new("regions cannot be empty"));
    }

    let mut regions = Vec::with_capacity(payload.regions.len());
    let mut seen_regions = BTreeSet::new();
    for region in &payload.regions {
        let region = region.trim();
        if region.is_empty() {
            return Err(ValidationError::new("region names must be non-empty strings"));
        }
        if !seen_regions.insert(region.to_string()) {
            return Err(ValidationError::new(format!(
                "Region '{region}' is listed more than once"
            )));
        }
        regions.push(region.to_string());
    }

    if payload.source_accounts.is_empty() {
        return Err(ValidationError::new("source_accounts cannot be empty"));
    }

    let mut source_accounts = Vec::with_capacity(payload.source_accounts.len());
    let mut seen_names = BTreeSet::new();
    let mut seen_ids = BTreeSet::new();
    for account in &payload.source_accounts {
        let name = account.name.trim();
        let account_id = account.account_id.trim();
        if name.is_empty() {
            return Err(ValidationError::new(
                "source account names must be non-empty strings",
            ));
        }
        if !seen_names.insert(name.to_string()) {
            return Err(ValidationError::new(format!(
                "Source account name '{name}' is used more than once"
            )));
        }
        if account_id.is_empty() {
            return Err(ValidationError::new(format!(
                "Source account '{name}' has an empty account_id"
            )));
        }
        if is_placeholder(account_id) {
            return Err(ValidationError::new(format!(
                "Source account '{name}' still has placeholder account_id '{account_id}'; replace it before deploying"
            )));
        }
        if !seen_ids.insert(account_id.to_string()) {
            return Err(ValidationError::new(format!(
                "Account id '{account_id}' is assigned to more than one source account"
            )));
        }
        source_accounts.push(SourceAccountSpec {
            name: name.to_string(),
            account_id: account_id.to_string(),
        });
    }

    let assume_role_name = payload.assume_role_name.trim().to_string();
    if assume_role_name.is_empty() {
        return Err(ValidationError::new("assume_role_name cannot be empty"));
    }

    let label_template = payload.label_template.trim().to_string();
    if label_template.is_empty() {
        return Err(ValidationError::new("label_template cannot be empty"));
    }

    let mut tags: Tags = payload
        .default_tags
        .into_iter()
        .map(|(key, value)| (key.trim().to_string(), value))
        .filter(|(key, _)| !key.is_empty())
        .collect();
    tags.insert(PROJECT_ID_TAG.to_string(), project_id.clone());

    Ok(NormalizedTopology {
        project_id,
        regions,
        source_accounts,
        assume_role_name,
        label_template,
        removal: payload.removal,
        tags,
    })
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
