use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use oam_topology_core::contract::Tags;
use oam_topology_core::topology::{
    validate_declarations, DeclarationSet, LinkDeclaration, SinkDeclaration,
    SinkPolicyDeclaration,
};
use serde_json::Value;

use crate::adapters::credentials::OamApiRegistry;
use crate::adapters::oam_api::OamApi;
use crate::handlers::report::{
    finished_at, log_outcome, DeployError, DeployReport, ResourceAction, ResourceKind,
    ResourceOutcome,
};

/// Tag keys under this prefix belong to the service and cannot be removed.
const RESERVED_TAG_PREFIX: &str = "aws:";

/// Sink state resolved while walking declarations in dependency order.
#[derive(Debug, Clone)]
struct ResolvedSink {
    arn: Option<String>,
    created: bool,
}

pub(crate) fn api_for(
    registry: &impl OamApiRegistry,
    declaration_id: &str,
    provider_id: &str,
) -> Result<Arc<dyn OamApi>, DeployError> {
    registry
        .api_for(provider_id)
        .map_err(|message| DeployError::Registry {
            declaration_id: declaration_id.to_string(),
            message,
        })
}

pub(crate) fn apply_error(declaration_id: &str) -> impl FnOnce(String) -> DeployError + '_ {
    move |message| DeployError::Apply {
        declaration_id: declaration_id.to_string(),
        message,
    }
}

/// Reconciles sinks, then sink policies, then links. With `dry_run` only
/// read calls are made and the outcomes describe what a deploy would do.
pub fn deploy_topology(
    declarations: &DeclarationSet,
    registry: &impl OamApiRegistry,
    dry_run: bool,
) -> Result<DeployReport, DeployError> {
    validate_declarations(declarations)?;
    let operation = if dry_run { "plan" } else { "deploy" };
    let fingerprint = declarations.fingerprint();
    tracing::info!(
        component = "deploy_handler",
        event = "reconcile_started",
        operation,
        project_id = %declarations.project_id,
        fingerprint = %fingerprint,
        sinks = declarations.sinks.len(),
        links = declarations.links.len(),
    );

    let mut outcomes = Vec::with_capacity(
        declarations.sinks.len() + declarations.sink_policies.len() + declarations.links.len(),
    );
    let mut resolved: HashMap<&str, ResolvedSink> = HashMap::new();

    for sink in &declarations.sinks {
        let (outcome, state) = reconcile_sink(sink, registry, dry_run)?;
        log_outcome(operation, &outcome);
        outcomes.push(outcome);
        resolved.insert(sink.id.as_str(), state);
    }

    for policy in &declarations.sink_policies {
        let sink = resolved
            .get(policy.sink_id.as_str())
            .ok_or_else(|| DeployError::Dangling {
                declaration_id: policy.id.clone(),
                missing: format!("sink '{}'", policy.sink_id),
            })?;
        let outcome = reconcile_sink_policy(policy, sink, registry, dry_run)?;
        log_outcome(operation, &outcome);
        outcomes.push(outcome);
    }

    for link in &declarations.links {
        let sink = resolved
            .get(link.sink_id.as_str())
            .ok_or_else(|| DeployError::Dangling {
                declaration_id: link.id.clone(),
                missing: format!("sink '{}'", link.sink_id),
            })?;
        let outcome = reconcile_link(link, sink, registry, dry_run)?;
        log_outcome(operation, &outcome);
        outcomes.push(outcome);
    }

    let report = DeployReport {
        operation: operation.to_string(),
        project_id: declarations.project_id.clone(),
        fingerprint,
        dry_run,
        finished_at: finished_at(),
        outcomes,
    };
    tracing::info!(
        component = "deploy_handler",
        event = "reconcile_completed",
        operation,
        changes = report.changes(),
        resources = report.outcomes.len(),
    );
    Ok(report)
}

fn reconcile_sink(
    sink: &SinkDeclaration,
    registry: &impl OamApiRegistry,
    dry_run: bool,
) -> Result<(ResourceOutcome, ResolvedSink), DeployError> {
    let api = api_for(registry, &sink.id, &sink.provider_id)?;
    let existing = api
        .find_sink_by_name(&sink.name)
        .map_err(apply_error(&sink.id))?;

    let (action, state) = match existing {
        Some(record) => {
            let retagged =
                reconcile_tags(api.as_ref(), &sink.id, &record.arn, &sink.tags, dry_run)?;
            (
                changed_action(retagged, dry_run),
                ResolvedSink {
                    arn: Some(record.arn),
                    created: false,
                },
            )
        }
        None if dry_run => (
            ResourceAction::WouldCreate,
            ResolvedSink {
                arn: None,
                created: true,
            },
        ),
        None => {
            let record = api
                .create_sink(&sink.name, &sink.tags)
                .map_err(apply_error(&sink.id))?;
            (
                ResourceAction::Created,
                ResolvedSink {
                    arn: Some(record.arn),
                    created: true,
                },
            )
        }
    };

    Ok((
        ResourceOutcome {
            declaration_id: sink.id.clone(),
            kind: ResourceKind::Sink,
            region: sink.region.clone(),
            action,
            arn: state.arn.clone(),
        },
        state,
    ))
}

fn reconcile_sink_policy(
    policy: &SinkPolicyDeclaration,
    sink: &ResolvedSink,
    registry: &impl OamApiRegistry,
    dry_run: bool,
) -> Result<ResourceOutcome, DeployError> {
    let outcome = |action| ResourceOutcome {
        declaration_id: policy.id.clone(),
        kind: ResourceKind::SinkPolicy,
        region: policy.region.clone(),
        action,
        arn: sink.arn.clone(),
    };

    let Some(sink_arn) = sink.arn.as_deref() else {
        return Ok(outcome(ResourceAction::WouldCreate));
    };

    let api = api_for(registry, &policy.id, &policy.provider_id)?;
    let current = if sink.created {
        None
    } else {
        api.get_sink_policy(sink_arn)
            .map_err(apply_error(&policy.id))?
    };

    let desired = policy.policy.to_json();
    if current
        .as_deref()
        .is_some_and(|current| policy_documents_match(current, &desired))
    {
        return Ok(outcome(ResourceAction::Unchanged));
    }

    let action = match (current.is_some(), dry_run) {
        (false, true) => ResourceAction::WouldCreate,
        (true, true) => ResourceAction::WouldUpdate,
        (false, false) => ResourceAction::Created,
        (true, false) => ResourceAction::Updated,
    };
    if !dry_run {
        api.put_sink_policy(sink_arn, &desired)
            .map_err(apply_error(&policy.id))?;
    }
    Ok(outcome(action))
}

/// Compares policies as JSON values so whitespace and key order returned by
/// the service do not count as drift.
fn policy_documents_match(current: &str, desired: &str) -> bool {
    match (
        serde_json::from_str::<Value>(current),
        serde_json::from_str::<Value>(desired),
    ) {
        (Ok(current), Ok(desired)) => current == desired,
        _ => false,
    }
}

fn reconcile_link(
    link: &LinkDeclaration,
    sink: &ResolvedSink,
    registry: &impl OamApiRegistry,
    dry_run: bool,
) -> Result<ResourceOutcome, DeployError> {
    let outcome = |action, arn: Option<String>| ResourceOutcome {
        declaration_id: link.id.clone(),
        kind: ResourceKind::Link,
        region: link.region.clone(),
        action,
        arn,
    };

    let Some(sink_arn) = sink.arn.as_deref() else {
        return Ok(outcome(ResourceAction::WouldCreate, None));
    };

    let api = api_for(registry, &link.id, &link.provider_id)?;
    let existing = api
        .find_link_for_sink(sink_arn)
        .map_err(apply_error(&link.id))?;

    let Some(existing) = existing else {
        if dry_run {
            return Ok(outcome(ResourceAction::WouldCreate, None));
        }
        let record = api
            .create_link(sink_arn, &link.label_template, &link.resource_types, &link.tags)
            .map_err(apply_error(&link.id))?;
        return Ok(outcome(ResourceAction::Created, Some(record.arn)));
    };

    // The label template cannot be changed on an existing link.
    if existing.label_template != link.label_template {
        if dry_run {
            return Ok(outcome(ResourceAction::WouldReplace, Some(existing.arn)));
        }
        api.delete_link(&existing.arn)
            .map_err(apply_error(&link.id))?;
        let record = api
            .create_link(sink_arn, &link.label_template, &link.resource_types, &link.tags)
            .map_err(apply_error(&link.id))?;
        return Ok(outcome(ResourceAction::Replaced, Some(record.arn)));
    }

    let desired: BTreeSet<&str> = link.resource_types.iter().map(String::as_str).collect();
    let retyped = existing.resource_type_set() != desired;
    if retyped && !dry_run {
        api.update_link(&existing.arn, &link.resource_types)
            .map_err(apply_error(&link.id))?;
    }
    let retagged = reconcile_tags(api.as_ref(), &link.id, &existing.arn, &link.tags, dry_run)?;

    Ok(outcome(
        changed_action(retyped || retagged, dry_run),
        Some(existing.arn),
    ))
}

fn changed_action(changed: bool, dry_run: bool) -> ResourceAction {
    match (changed, dry_run) {
        (false, _) => ResourceAction::Unchanged,
        (true, true) => ResourceAction::WouldUpdate,
        (true, false) => ResourceAction::Updated,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct TagDrift {
    upsert: Tags,
    remove: Vec<String>,
}

impl TagDrift {
    fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }
}

/// Declared tags own the resource's tag set: missing or changed values are
/// written, undeclared keys are removed.
fn tag_drift(current: &Tags, desired: &Tags) -> TagDrift {
    let upsert = desired
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let remove = current
        .keys()
        .filter(|key| !desired.contains_key(*key) && !key.starts_with(RESERVED_TAG_PREFIX))
        .cloned()
        .collect();
    TagDrift { upsert, remove }
}

/// Returns whether the resource's tags differed from the declaration. In
/// dry-run mode nothing is written.
fn reconcile_tags(
    api: &dyn OamApi,
    declaration_id: &str,
    resource_arn: &str,
    desired: &Tags,
    dry_run: bool,
) -> Result<bool, DeployError> {
    let current = api
        .list_tags(resource_arn)
        .map_err(apply_error(declaration_id))?;
    let drift = tag_drift(&current, desired);
    if drift.is_empty() {
        return Ok(false);
    }

    if !dry_run {
        if !drift.upsert.is_empty() {
            api.tag_resource(resource_arn, &drift.upsert)
                .map_err(apply_error(declaration_id))?;
        }
        if !drift.remove.is_empty() {
            api.untag_resource(resource_arn, &drift.remove)
                .map_err(apply_error(declaration_id))?;
        }
    }
    Ok(true)
}
