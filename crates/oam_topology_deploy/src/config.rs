//! Topology configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use oam_topology_core::contract::{normalize_request, NormalizedTopology, TopologyRequest};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "oam-topology.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config '{path}': {message}")]
    Validation { path: PathBuf, message: String },
}

/// Values supplied on the command line or environment that take precedence
/// over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub regions: Vec<String>,
}

pub fn parse_request(path: &Path, content: &str) -> Result<TopologyRequest, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn apply_overrides(mut request: TopologyRequest, overrides: &ConfigOverrides) -> TopologyRequest {
    if !overrides.regions.is_empty() {
        request.regions = overrides.regions.clone();
    }
    request
}

/// Reads, overrides and normalizes the configuration. Placeholder account
/// ids fail here, before any AWS call is made.
pub fn load_topology(
    path: &Path,
    overrides: &ConfigOverrides,
) -> Result<NormalizedTopology, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let request = apply_overrides(parse_request(path, &content)?, overrides);

    normalize_request(request).map_err(|error| ConfigError::Validation {
        path: path.to_path_buf(),
        message: error.message().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use oam_topology_core::contract::RemovalPolicy;

    use super::*;

    const SAMPLE: &str = r#"
project_id = "cloudwatch-observability-access-manager"
regions = ["us-east-1", "ap-southeast-2"]
removal = "retain"

[default_tags]
Framework = "oam-topology"

[[source_accounts]]
name = "SourceA"
account_id = "111111111111"

[[source_accounts]]
name = "SourceB"
account_id = "222222222222"
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn loads_and_normalizes_sample_config() {
        let file = write_config(SAMPLE);
        let topology =
            load_topology(file.path(), &ConfigOverrides::default()).expect("config should load");

        assert_eq!(topology.regions, vec!["us-east-1", "ap-southeast-2"]);
        assert_eq!(topology.removal, RemovalPolicy::Retain);
        assert_eq!(topology.assume_role_name, "OrganizationAccountAccessRole");
        assert_eq!(topology.source_accounts.len(), 2);
    }

    #[test]
    fn region_override_replaces_file_regions() {
        let file = write_config(SAMPLE);
        let overrides = ConfigOverrides {
            regions: vec!["eu-west-1".to_string()],
        };
        let topology = load_topology(file.path(), &overrides).expect("config should load");

        assert_eq!(topology.regions, vec!["eu-west-1"]);
    }

    #[test]
    fn placeholder_account_fails_fast() {
        let file = write_config(&SAMPLE.replace("222222222222", "__UPDATE_ME_SOURCE_ACCOUNT_B_ID__"));
        let error = load_topology(file.path(), &ConfigOverrides::default())
            .expect_err("placeholder should fail");

        assert!(matches!(error, ConfigError::Validation { .. }));
        assert!(error.to_string().contains("placeholder"));
    }

    #[test]
    fn shipped_sample_parses_but_still_needs_account_ids() {
        let sample = include_str!("../../../oam-topology.toml");
        let request =
            parse_request(Path::new("oam-topology.toml"), sample).expect("sample should parse");
        assert_eq!(request.source_accounts.len(), 2);

        let file = write_config(sample);
        let error = load_topology(file.path(), &ConfigOverrides::default())
            .expect_err("placeholders should fail");
        assert!(error.to_string().contains("SourceA"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let file = write_config("regions = [");
        let error = load_topology(file.path(), &ConfigOverrides::default())
            .expect_err("parse should fail");

        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let error = load_topology(
            Path::new("/nonexistent/oam-topology.toml"),
            &ConfigOverrides::default(),
        )
        .expect_err("missing file should fail");

        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
