use serde::{Deserialize, Serialize};

use crate::contract::{RemovalPolicy, MANIFEST_SCHEMA_VERSION};
use crate::topology::DeclarationSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestSummary {
    pub providers: usize,
    pub sinks: usize,
    pub sink_policies: usize,
    pub links: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopologyManifest {
    pub schema_version: String,
    pub project_id: String,
    pub removal: RemovalPolicy,
    pub fingerprint: String,
    pub summary: ManifestSummary,
    pub declarations: DeclarationSet,
}

pub fn build_manifest(declarations: &DeclarationSet) -> TopologyManifest {
    TopologyManifest {
        schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
        project_id: declarations.project_id.clone(),
        removal: declarations.removal,
        fingerprint: declarations.fingerprint(),
        summary: ManifestSummary {
            providers: declarations.providers.len(),
            sinks: declarations.sinks.len(),
            sink_policies: declarations.sink_policies.len(),
            links: declarations.links.len(),
        },
        declarations: declarations.clone(),
    }
}

pub fn render_manifest(manifest: &TopologyManifest) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(manifest)
}
