use std::collections::HashMap;

use oam_topology_core::contract::RemovalPolicy;
use oam_topology_core::topology::DeclarationSet;

use crate::adapters::credentials::OamApiRegistry;
use crate::handlers::deploy::{api_for, apply_error};
use crate::handlers::report::{
    finished_at, log_outcome, DeployError, DeployReport, ResourceAction, ResourceKind,
    ResourceOutcome,
};

/// Tears down links first, then sinks. Deleting a sink drops its policy, so
/// policies are reported with their sink's action. A `retain` removal policy
/// leaves everything in place.
pub fn destroy_topology(
    declarations: &DeclarationSet,
    registry: &impl OamApiRegistry,
    dry_run: bool,
) -> Result<DeployReport, DeployError> {
    let operation = if dry_run { "plan_destroy" } else { "destroy" };
    let fingerprint = declarations.fingerprint();
    tracing::info!(
        component = "destroy_handler",
        event = "teardown_started",
        operation,
        project_id = %declarations.project_id,
        removal = ?declarations.removal,
    );

    let outcomes = if declarations.removal == RemovalPolicy::Retain {
        let outcomes = retained_outcomes(declarations);
        for outcome in &outcomes {
            log_outcome(operation, outcome);
        }
        outcomes
    } else {
        remove_resources(declarations, registry, operation, dry_run)?
    };

    let report = DeployReport {
        operation: operation.to_string(),
        project_id: declarations.project_id.clone(),
        fingerprint,
        dry_run,
        finished_at: finished_at(),
        outcomes,
    };
    tracing::info!(
        component = "destroy_handler",
        event = "teardown_completed",
        operation,
        changes = report.changes(),
    );
    Ok(report)
}

fn retained_outcomes(declarations: &DeclarationSet) -> Vec<ResourceOutcome> {
    let links = declarations
        .links
        .iter()
        .map(|link| (link.id.as_str(), ResourceKind::Link, link.region.as_str()));
    let policies = declarations
        .sink_policies
        .iter()
        .map(|policy| (policy.id.as_str(), ResourceKind::SinkPolicy, policy.region.as_str()));
    let sinks = declarations
        .sinks
        .iter()
        .map(|sink| (sink.id.as_str(), ResourceKind::Sink, sink.region.as_str()));

    links
        .chain(policies)
        .chain(sinks)
        .map(|(declaration_id, kind, region)| ResourceOutcome {
            declaration_id: declaration_id.to_string(),
            kind,
            region: region.to_string(),
            action: ResourceAction::Retained,
            arn: None,
        })
        .collect()
}

/// Outcomes are logged as they are produced so a failure part way through
/// still leaves a record of what was already deleted.
fn remove_resources(
    declarations: &DeclarationSet,
    registry: &impl OamApiRegistry,
    operation: &str,
    dry_run: bool,
) -> Result<Vec<ResourceOutcome>, DeployError> {
    let removed = if dry_run {
        ResourceAction::WouldDelete
    } else {
        ResourceAction::Deleted
    };
    let mut outcomes = Vec::new();
    let mut record = |outcome: ResourceOutcome| {
        log_outcome(operation, &outcome);
        outcomes.push(outcome);
    };

    let mut sink_arns: HashMap<&str, Option<String>> = HashMap::new();
    for sink in &declarations.sinks {
        let api = api_for(registry, &sink.id, &sink.provider_id)?;
        let existing = api
            .find_sink_by_name(&sink.name)
            .map_err(apply_error(&sink.id))?;
        sink_arns.insert(sink.id.as_str(), existing.map(|record| record.arn));
    }

    for link in declarations.links.iter().rev() {
        let Some(sink_arn) = sink_arns.get(link.sink_id.as_str()).cloned().flatten() else {
            record(absent(&link.id, ResourceKind::Link, &link.region));
            continue;
        };
        let api = api_for(registry, &link.id, &link.provider_id)?;
        let existing = api
            .find_link_for_sink(&sink_arn)
            .map_err(apply_error(&link.id))?;
        let Some(existing) = existing else {
            record(absent(&link.id, ResourceKind::Link, &link.region));
            continue;
        };
        if !dry_run {
            api.delete_link(&existing.arn)
                .map_err(apply_error(&link.id))?;
        }
        record(ResourceOutcome {
            declaration_id: link.id.clone(),
            kind: ResourceKind::Link,
            region: link.region.clone(),
            action: removed,
            arn: Some(existing.arn),
        });
    }

    for sink in declarations.sinks.iter().rev() {
        let policies = declarations
            .sink_policies
            .iter()
            .filter(|policy| policy.sink_id == sink.id);
        let Some(sink_arn) = sink_arns.get(sink.id.as_str()).cloned().flatten() else {
            for policy in policies {
                record(absent(&policy.id, ResourceKind::SinkPolicy, &policy.region));
            }
            record(absent(&sink.id, ResourceKind::Sink, &sink.region));
            continue;
        };
        let api = api_for(registry, &sink.id, &sink.provider_id)?;
        let attached_policy = api
            .get_sink_policy(&sink_arn)
            .map_err(apply_error(&sink.id))?
            .is_some();
        if !dry_run {
            api.delete_sink(&sink_arn).map_err(apply_error(&sink.id))?;
        }
        for policy in policies {
            if attached_policy {
                record(ResourceOutcome {
                    declaration_id: policy.id.clone(),
                    kind: ResourceKind::SinkPolicy,
                    region: policy.region.clone(),
                    action: removed,
                    arn: Some(sink_arn.clone()),
                });
            } else {
                record(absent(&policy.id, ResourceKind::SinkPolicy, &policy.region));
            }
        }
        record(ResourceOutcome {
            declaration_id: sink.id.clone(),
            kind: ResourceKind::Sink,
            region: sink.region.clone(),
            action: removed,
            arn: Some(sink_arn),
        });
    }

    Ok(outcomes)
}

fn absent(declaration_id: &str, kind: ResourceKind, region: &str) -> ResourceOutcome {
    ResourceOutcome {
        declaration_id: declaration_id.to_string(),
        kind,
        region: region.to_string(),
        action: ResourceAction::Absent,
        arn: None,
    }
}
