use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contract::{
    stable_contract_json, NormalizedTopology, RemovalPolicy, Tags, ValidationError,
};
use crate::identifiers::{
    assume_role_arn, cloud_resource_name, is_valid_declaration_id, resource_declaration_id,
    DeclarationKind, MONITORING_SEGMENT,
};
use crate::policy::{build_sink_policy, SinkPolicyDocument};
use crate::resource_types::link_resource_types;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    /// Whatever the execution environment resolves (env keys, profile, ...).
    Ambient,
    AssumeRole { role_arn: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AccountRole {
    Monitoring,
    Source { name: String, account_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderDeclaration {
    pub id: String,
    pub region: String,
    pub account: AccountRole,
    pub credentials: CredentialSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SinkDeclaration {
    pub id: String,
    pub provider_id: String,
    pub region: String,
    pub name: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SinkPolicyDeclaration {
    pub id: String,
    pub provider_id: String,
    pub region: String,
    pub sink_id: String,
    pub policy: SinkPolicyDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkDeclaration {
    pub id: String,
    pub provider_id: String,
    pub region: String,
    pub source_account: String,
    pub account_id: String,
    pub sink_id: String,
    pub label_template: String,
    pub resource_types: Vec<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclarationSet {
    pub project_id: String,
    pub removal: RemovalPolicy,
    pub providers: Vec<ProviderDeclaration>,
    pub sinks: Vec<SinkDeclaration>,
    pub sink_policies: Vec<SinkPolicyDeclaration>,
    pub links: Vec<LinkDeclaration>,
}

impl DeclarationSet {
    pub fn declaration_ids(&self) -> impl Iterator<Item = &str> {
        self.providers
            .iter()
            .map(|provider| provider.id.as_str())
            .chain(self.sinks.iter().map(|sink| sink.id.as_str()))
            .chain(self.sink_policies.iter().map(|policy| policy.id.as_str()))
            .chain(self.links.iter().map(|link| link.id.as_str()))
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderDeclaration> {
        self.providers.iter().find(|provider| provider.id == id)
    }

    pub fn sink(&self, id: &str) -> Option<&SinkDeclaration> {
        self.sinks.iter().find(|sink| sink.id == id)
    }

    pub fn sink_for_region(&self, region: &str) -> Option<&SinkDeclaration> {
        self.sinks.iter().find(|sink| sink.region == region)
    }

    pub fn policy_for_sink(&self, sink_id: &str) -> Option<&SinkPolicyDeclaration> {
        self.sink_policies
            .iter()
            .find(|policy| policy.sink_id == sink_id)
    }

    pub fn links_for_sink<'a>(
        &'a self,
        sink_id: &'a str,
    ) -> impl Iterator<Item = &'a LinkDeclaration> + 'a {
        self.links.iter().filter(move |link| link.sink_id == sink_id)
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(stable_contract_json(self));
        format!("{:x}", hasher.finalize())
    }
}

/// Expands regions × accounts into provider, sink, policy and link
/// declarations, then validates the result.
pub fn compute_topology(request: &NormalizedTopology) -> Result<DeclarationSet, ValidationError> {
    let account_ids = request.source_account_ids();
    let region_count = request.regions.len();
    let mut providers = Vec::with_capacity(region_count * (request.source_accounts.len() + 1));
    let mut sinks = Vec::with_capacity(region_count);
    let mut sink_policies = Vec::with_capacity(region_count);
    let mut links = Vec::with_capacity(region_count * request.source_accounts.len());

    for region in &request.regions {
        let provider_id =
            resource_declaration_id(MONITORING_SEGMENT, DeclarationKind::Provider, region)?;
        let sink_id = resource_declaration_id(MONITORING_SEGMENT, DeclarationKind::Sink, region)?;
        let policy_id =
            resource_declaration_id(MONITORING_SEGMENT, DeclarationKind::SinkPolicy, region)?;

        providers.push(ProviderDeclaration {
            id: provider_id.clone(),
            region: region.clone(),
            account: AccountRole::Monitoring,
            credentials: CredentialSource::Ambient,
        });
        sinks.push(SinkDeclaration {
            id: sink_id.clone(),
            provider_id: provider_id.clone(),
            region: region.clone(),
            name: cloud_resource_name(&sink_id),
            tags: request.tags.clone(),
        });
        sink_policies.push(SinkPolicyDeclaration {
            id: policy_id,
            provider_id,
            region: region.clone(),
            sink_id,
            policy: build_sink_policy(&account_ids),
        });
    }

    for account in &request.source_accounts {
        let role_arn = assume_role_arn(&account.account_id, &request.assume_role_name);
        for (region, sink) in request.regions.iter().zip(&sinks) {
            let provider_id =
                resource_declaration_id(&account.name, DeclarationKind::Provider, region)?;
            let link_id = resource_declaration_id(&account.name, DeclarationKind::Link, region)?;

            providers.push(ProviderDeclaration {
                id: provider_id.clone(),
                region: region.clone(),
                account: AccountRole::Source {
                    name: account.name.clone(),
                    account_id: account.account_id.clone(),
                },
                credentials: CredentialSource::AssumeRole {
                    role_arn: role_arn.clone(),
                },
            });
            links.push(LinkDeclaration {
                id: link_id,
                provider_id,
                region: region.clone(),
                source_account: account.name.clone(),
                account_id: account.account_id.clone(),
                sink_id: sink.id.clone(),
                label_template: request.label_template.clone(),
                resource_types: link_resource_types(),
                tags: request.tags.clone(),
            });
        }
    }

    let declarations = DeclarationSet {
        project_id: request.project_id.clone(),
        removal: request.removal,
        providers,
        sinks,
        sink_policies,
        links,
    };
    validate_declarations(&declarations)?;
    Ok(declarations)
}

pub fn validate_declarations(declarations: &DeclarationSet) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for id in declarations.declaration_ids() {
        if !is_valid_declaration_id(id) {
            return Err(ValidationError::new(format!(
                "Declaration identifier '{id}' violates the naming rule"
            )));
        }
        if !seen.insert(id) {
            return Err(ValidationError::new(format!(
                "Declaration identifier '{id}' is declared more than once"
            )));
        }
    }

    let mut sinks_per_region: BTreeMap<&str, usize> = BTreeMap::new();
    for sink in &declarations.sinks {
        *sinks_per_region.entry(sink.region.as_str()).or_default() += 1;
        check_provider(declarations, &sink.id, &sink.provider_id, &sink.region)?;
    }
    if let Some((region, count)) = sinks_per_region.iter().find(|(_, count)| **count != 1) {
        return Err(ValidationError::new(format!(
            "Region '{region}' has {count} sinks; exactly one is required"
        )));
    }

    for sink in &declarations.sinks {
        let policies = declarations
            .sink_policies
            .iter()
            .filter(|policy| policy.sink_id == sink.id)
            .count();
        if policies != 1 {
            return Err(ValidationError::new(format!(
                "Sink '{}' has {policies} sink policies; exactly one is required",
                sink.id
            )));
        }
    }

    for policy in &declarations.sink_policies {
        check_provider(declarations, &policy.id, &policy.provider_id, &policy.region)?;
        if declarations.sink(&policy.sink_id).is_none() {
            return Err(ValidationError::new(format!(
                "Sink policy '{}' references unknown sink '{}'",
                policy.id, policy.sink_id
            )));
        }
    }

    let expected_principals: Vec<&str> = declarations
        .links
        .iter()
        .map(|link| link.account_id.as_str())
        .fold(Vec::new(), |mut acc, account_id| {
            if !acc.contains(&account_id) {
                acc.push(account_id);
            }
            acc
        });

    for link in &declarations.links {
        check_provider(declarations, &link.id, &link.provider_id, &link.region)?;
        let Some(sink) = declarations.sink(&link.sink_id) else {
            return Err(ValidationError::new(format!(
                "Link '{}' references unknown sink '{}'",
                link.id, link.sink_id
            )));
        };
        if sink.region != link.region {
            return Err(ValidationError::new(format!(
                "Link '{}' in region '{}' targets sink '{}' in region '{}'",
                link.id, link.region, sink.id, sink.region
            )));
        }

        let Some(policy) = declarations.policy_for_sink(&sink.id) else {
            return Err(ValidationError::new(format!(
                "Sink '{}' has no sink policy",
                sink.id
            )));
        };
        let allowed = policy.policy.allowed_resource_types();
        let requested: BTreeSet<&str> = link.resource_types.iter().map(String::as_str).collect();
        if !requested.is_subset(&allowed) {
            return Err(ValidationError::new(format!(
                "Link '{}' shares resource types not allowed by sink policy '{}'",
                link.id, policy.id
            )));
        }
        if !policy.policy.principals().contains(&link.account_id.as_str()) {
            return Err(ValidationError::new(format!(
                "Sink policy '{}' does not grant account '{}' used by link '{}'",
                policy.id, link.account_id, link.id
            )));
        }
    }

    for policy in &declarations.sink_policies {
        if policy.policy.principals() != expected_principals {
            return Err(ValidationError::new(format!(
                "Sink policy '{}' principals do not match the configured source accounts",
                policy.id
            )));
        }
    }

    Ok(())
}

fn check_provider(
    declarations: &DeclarationSet,
    declaration_id: &str,
    provider_id: &str,
    region: &str,
) -> Result<(), ValidationError> {
    match declarations.provider(provider_id) {
        Some(provider) if provider.region == region => Ok(()),
        Some(provider) => Err(ValidationError::new(format!(
            "Declaration '{declaration_id}' in region '{region}' uses provider '{provider_id}' bound to region '{}'",
            provider.region
        ))),
        None => Err(ValidationError::new(format!(
            "Declaration '{declaration_id}' references unknown provider '{provider_id}'"
        ))),
    }
}
