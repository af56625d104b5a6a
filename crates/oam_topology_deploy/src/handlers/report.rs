use oam_topology_core::contract::ValidationError;
use oam_topology_core::identifiers::DeclarationKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Sink,
    SinkPolicy,
    Link,
}

impl From<ResourceKind> for DeclarationKind {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Sink => DeclarationKind::Sink,
            ResourceKind::SinkPolicy => DeclarationKind::SinkPolicy,
            ResourceKind::Link => DeclarationKind::Link,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    Created,
    Updated,
    Replaced,
    Unchanged,
    Deleted,
    Retained,
    Absent,
    WouldCreate,
    WouldUpdate,
    WouldReplace,
    WouldDelete,
}

impl ResourceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Replaced => "replaced",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Retained => "retained",
            Self::Absent => "absent",
            Self::WouldCreate => "would_create",
            Self::WouldUpdate => "would_update",
            Self::WouldReplace => "would_replace",
            Self::WouldDelete => "would_delete",
        }
    }

    pub fn is_change(self) -> bool {
        !matches!(self, Self::Unchanged | Self::Retained | Self::Absent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceOutcome {
    pub declaration_id: String,
    pub kind: ResourceKind,
    pub region: String,
    pub action: ResourceAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployReport {
    pub operation: String,
    pub project_id: String,
    pub fingerprint: String,
    pub dry_run: bool,
    pub finished_at: String,
    pub outcomes: Vec<ResourceOutcome>,
}

impl DeployReport {
    pub fn changes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.action.is_change())
            .count()
    }

    pub fn outcome(&self, declaration_id: &str) -> Option<&ResourceOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.declaration_id == declaration_id)
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("declarations rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("no credential context for '{declaration_id}': {message}")]
    Registry {
        declaration_id: String,
        message: String,
    },
    #[error("declaration '{declaration_id}' references unknown {missing}")]
    Dangling {
        declaration_id: String,
        missing: String,
    },
    #[error("apply failed for '{declaration_id}': {message}")]
    Apply {
        declaration_id: String,
        message: String,
    },
}

pub(crate) fn log_outcome(operation: &str, outcome: &ResourceOutcome) {
    tracing::info!(
        component = "deploy_handler",
        event = "resource_reconciled",
        operation,
        declaration_id = %outcome.declaration_id,
        kind = DeclarationKind::from(outcome.kind).as_str(),
        region = %outcome.region,
        action = outcome.action.as_str(),
        arn = outcome.arn.as_deref().unwrap_or(""),
    );
}

pub(crate) fn finished_at() -> String {
    chrono::Utc::now().to_rfc3339()
}
