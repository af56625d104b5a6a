//! Credential contexts, one per provider declaration.
//!
//! The monitoring account uses whatever credentials the environment resolves
//! (`AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`, `AWS_PROFILE`, ...). Source
//! accounts are reached by assuming a role from those ambient credentials; the
//! role must trust the monitoring principal.

use std::collections::HashMap;
use std::sync::Arc;

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_oam::config::Region;
use oam_topology_core::topology::{CredentialSource, ProviderDeclaration};

use crate::adapters::oam_api::{AwsOamApi, OamApi};

pub const ASSUME_ROLE_SESSION_NAME: &str = "oam-topology";

pub trait OamApiRegistry {
    fn api_for(&self, provider_id: &str) -> Result<Arc<dyn OamApi>, String>;
}

#[derive(Default)]
pub struct StaticOamApiRegistry {
    apis: HashMap<String, Arc<dyn OamApi>>,
}

impl StaticOamApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, provider_id: impl Into<String>, api: Arc<dyn OamApi>) {
        self.apis.insert(provider_id.into(), api);
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

impl OamApiRegistry for StaticOamApiRegistry {
    fn api_for(&self, provider_id: &str) -> Result<Arc<dyn OamApi>, String> {
        self.apis
            .get(provider_id)
            .cloned()
            .ok_or_else(|| format!("no credential context registered for provider '{provider_id}'"))
    }
}

pub async fn load_provider_config(base: &SdkConfig, provider: &ProviderDeclaration) -> SdkConfig {
    let region = Region::new(provider.region.clone());
    match &provider.credentials {
        CredentialSource::Ambient => base.to_builder().region(region).build(),
        CredentialSource::AssumeRole { role_arn } => {
            let credentials = AssumeRoleProvider::builder(role_arn.clone())
                .session_name(ASSUME_ROLE_SESSION_NAME)
                .region(region.clone())
                .configure(base)
                .build()
                .await;
            aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(credentials)
                .load()
                .await
        }
    }
}

/// Builds one OAM client per provider. Role assumption is lazy: credentials
/// are fetched on the first call made through the context.
pub async fn build_aws_registry(providers: &[ProviderDeclaration]) -> StaticOamApiRegistry {
    let base = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let mut registry = StaticOamApiRegistry::new();
    for provider in providers {
        let config = load_provider_config(&base, provider).await;
        tracing::debug!(
            component = "credentials",
            provider_id = %provider.id,
            region = %provider.region,
            assume_role = matches!(provider.credentials, CredentialSource::AssumeRole { .. }),
            "credential context prepared"
        );
        registry.insert(
            provider.id.clone(),
            Arc::new(AwsOamApi::new(aws_sdk_oam::Client::new(&config))),
        );
    }
    registry
}
