#![allow(dead_code)]

use oam_topology_core::contract::{
    normalize_request, NormalizedTopology, RemovalPolicy, SourceAccountSpec, Tags,
    TopologyRequest,
};
use oam_topology_core::topology::{compute_topology, DeclarationSet};

pub const US_EAST_1: &str = "us-east-1";
pub const AP_SOUTHEAST_2: &str = "ap-southeast-2";

/// Request builder for reproducible test topologies.
pub fn request(regions: &[&str], accounts: &[(&str, &str)]) -> TopologyRequest {
    TopologyRequest {
        project_id: "cloudwatch-observability-access-manager".to_string(),
        regions: regions.iter().map(|region| region.to_string()).collect(),
        source_accounts: accounts
            .iter()
            .map(|(name, account_id)| SourceAccountSpec {
                name: name.to_string(),
                account_id: account_id.to_string(),
            })
            .collect(),
        assume_role_name: "OrganizationAccountAccessRole".to_string(),
        label_template: "$AccountName".to_string(),
        removal: RemovalPolicy::Remove,
        default_tags: Tags::from([("Framework".to_string(), "oam-topology".to_string())]),
    }
}

pub fn normalized(regions: &[&str], accounts: &[(&str, &str)]) -> NormalizedTopology {
    normalize_request(request(regions, accounts)).expect("request should pass")
}

pub fn declarations(regions: &[&str], accounts: &[(&str, &str)]) -> DeclarationSet {
    compute_topology(&normalized(regions, accounts)).expect("topology should build")
}

pub fn two_region_two_source() -> DeclarationSet {
    declarations(
        &[US_EAST_1, AP_SOUTHEAST_2],
        &[("SourceA", "111111111111"), ("SourceB", "222222222222")],
    )
}
