use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{Arc, Mutex};

use oam_topology_core::contract::{
    normalize_request, RemovalPolicy, SourceAccountSpec, Tags, TopologyRequest,
};
use oam_topology_core::topology::{compute_topology, AccountRole, DeclarationSet};

use crate::adapters::credentials::StaticOamApiRegistry;
use crate::adapters::oam_api::{LinkRecord, OamApi, SinkRecord};

pub const MONITORING_ACCOUNT_ID: &str = "999999999999";

#[derive(Default)]
struct FakeState {
    sinks: Vec<SinkRecord>,
    policies: HashMap<String, String>,
    links: Vec<LinkRecord>,
    tags: HashMap<String, Tags>,
    next_id: usize,
}

/// In-memory OAM endpoint for one account and region.
pub struct InMemoryOam {
    account_id: String,
    region: String,
    state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<&'static str>>,
}

impl InMemoryOam {
    pub fn new(account_id: &str, region: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            region: region.to_string(),
            state: Mutex::new(FakeState::default()),
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        }
    }

    pub fn fail_on(&self, operation: &'static str) {
        *self.fail_on.lock().expect("poisoned mutex") = Some(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !call.starts_with("find_") && !call.starts_with("get_") && !call.starts_with("list_")
            })
            .collect()
    }

    pub fn sinks(&self) -> Vec<SinkRecord> {
        self.state.lock().expect("poisoned mutex").sinks.clone()
    }

    pub fn links(&self) -> Vec<LinkRecord> {
        self.state.lock().expect("poisoned mutex").links.clone()
    }

    pub fn policy(&self, sink_arn: &str) -> Option<String> {
        self.state
            .lock()
            .expect("poisoned mutex")
            .policies
            .get(sink_arn)
            .cloned()
    }

    pub fn seed_policy(&self, sink_arn: &str, policy_json: &str) {
        self.state
            .lock()
            .expect("poisoned mutex")
            .policies
            .insert(sink_arn.to_string(), policy_json.to_string());
    }

    pub fn tags(&self, resource_arn: &str) -> Tags {
        self.state
            .lock()
            .expect("poisoned mutex")
            .tags
            .get(resource_arn)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed_tags(&self, resource_arn: &str, tags: Tags) {
        self.state
            .lock()
            .expect("poisoned mutex")
            .tags
            .insert(resource_arn.to_string(), tags);
    }

    pub fn seed_link(&self, record: LinkRecord) {
        self.state.lock().expect("poisoned mutex").links.push(record);
    }

    fn record(&self, operation: &'static str) -> Result<(), String> {
        self.calls
            .lock()
            .expect("poisoned mutex")
            .push(operation.to_string());
        if *self.fail_on.lock().expect("poisoned mutex") == Some(operation) {
            return Err(format!("simulated {operation} failure"));
        }
        Ok(())
    }

    fn next_arn(&self, kind: &str) -> String {
        let mut state = self.state.lock().expect("poisoned mutex");
        state.next_id += 1;
        format!(
            "arn:aws:oam:{}:{}:{kind}/{:04}",
            self.region, self.account_id, state.next_id
        )
    }
}

impl OamApi for InMemoryOam {
    fn find_sink_by_name(&self, name: &str) -> Result<Option<SinkRecord>, String> {
        self.record("find_sink_by_name")?;
        Ok(self
            .state
            .lock()
            .expect("poisoned mutex")
            .sinks
            .iter()
            .find(|sink| sink.name == name)
            .cloned())
    }

    fn create_sink(&self, name: &str, tags: &Tags) -> Result<SinkRecord, String> {
        self.record("create_sink")?;
        let record = SinkRecord {
            arn: self.next_arn("sink"),
            name: name.to_string(),
        };
        self.state
            .lock()
            .expect("poisoned mutex")
            .sinks
            .push(record.clone());
        self.seed_tags(&record.arn, tags.clone());
        Ok(record)
    }

    fn get_sink_policy(&self, sink_arn: &str) -> Result<Option<String>, String> {
        self.record("get_sink_policy")?;
        Ok(self.policy(sink_arn))
    }

    fn put_sink_policy(&self, sink_arn: &str, policy_json: &str) -> Result<(), String> {
        self.record("put_sink_policy")?;
        self.seed_policy(sink_arn, policy_json);
        Ok(())
    }

    fn delete_sink(&self, sink_arn: &str) -> Result<(), String> {
        self.record("delete_sink")?;
        let mut state = self.state.lock().expect("poisoned mutex");
        state.sinks.retain(|sink| sink.arn != sink_arn);
        state.policies.remove(sink_arn);
        state.tags.remove(sink_arn);
        Ok(())
    }

    fn find_link_for_sink(&self, sink_arn: &str) -> Result<Option<LinkRecord>, String> {
        self.record("find_link_for_sink")?;
        Ok(self
            .links()
            .into_iter()
            .find(|link| link.sink_arn == sink_arn))
    }

    fn create_link(
        &self,
        sink_arn: &str,
        label_template: &str,
        resource_types: &[String],
        tags: &Tags,
    ) -> Result<LinkRecord, String> {
        self.record("create_link")?;
        let record = LinkRecord {
            arn: self.next_arn("link"),
            sink_arn: sink_arn.to_string(),
            label_template: label_template.to_string(),
            resource_types: resource_types.to_vec(),
        };
        self.seed_link(record.clone());
        self.seed_tags(&record.arn, tags.clone());
        Ok(record)
    }

    fn update_link(&self, link_arn: &str, resource_types: &[String]) -> Result<(), String> {
        self.record("update_link")?;
        let mut state = self.state.lock().expect("poisoned mutex");
        let link = state
            .links
            .iter_mut()
            .find(|link| link.arn == link_arn)
            .ok_or_else(|| format!("link {link_arn} not found"))?;
        link.resource_types = resource_types.to_vec();
        Ok(())
    }

    fn delete_link(&self, link_arn: &str) -> Result<(), String> {
        self.record("delete_link")?;
        let mut state = self.state.lock().expect("poisoned mutex");
        state.links.retain(|link| link.arn != link_arn);
        state.tags.remove(link_arn);
        Ok(())
    }

    fn list_tags(&self, resource_arn: &str) -> Result<Tags, String> {
        self.record("list_tags")?;
        Ok(self.tags(resource_arn))
    }

    fn tag_resource(&self, resource_arn: &str, tags: &Tags) -> Result<(), String> {
        self.record("tag_resource")?;
        let mut state = self.state.lock().expect("poisoned mutex");
        state
            .tags
            .entry(resource_arn.to_string())
            .or_default()
            .extend(tags.iter().map(|(key, value)| (key.clone(), value.clone())));
        Ok(())
    }

    fn untag_resource(&self, resource_arn: &str, tag_keys: &[String]) -> Result<(), String> {
        self.record("untag_resource")?;
        let mut state = self.state.lock().expect("poisoned mutex");
        if let Some(tags) = state.tags.get_mut(resource_arn) {
            tags.retain(|key, _| !tag_keys.contains(key));
        }
        Ok(())
    }
}

/// Collects JSON log lines emitted while a closure runs.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("poisoned mutex")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    pub fn capture<T>(&self, run: impl FnOnce() -> T) -> T {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, run)
    }

    pub fn events(&self) -> Vec<serde_json::Value> {
        let buffer = self.buffer.lock().expect("poisoned mutex");
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

pub struct FakeCloud {
    pub registry: StaticOamApiRegistry,
    pub endpoints: BTreeMap<String, Arc<InMemoryOam>>,
}

impl FakeCloud {
    pub fn endpoint(&self, provider_id: &str) -> &InMemoryOam {
        self.endpoints
            .get(provider_id)
            .unwrap_or_else(|| panic!("no fake endpoint for {provider_id}"))
    }
}

pub fn fake_cloud(declarations: &DeclarationSet) -> FakeCloud {
    let mut registry = StaticOamApiRegistry::new();
    let mut endpoints = BTreeMap::new();
    for provider in &declarations.providers {
        let account_id = match &provider.account {
            AccountRole::Monitoring => MONITORING_ACCOUNT_ID,
            AccountRole::Source { account_id, .. } => account_id.as_str(),
        };
        let endpoint = Arc::new(InMemoryOam::new(account_id, &provider.region));
        registry.insert(provider.id.clone(), endpoint.clone());
        endpoints.insert(provider.id.clone(), endpoint);
    }
    FakeCloud {
        registry,
        endpoints,
    }
}

pub fn sample_declarations(removal: RemovalPolicy) -> DeclarationSet {
    let topology = normalize_request(TopologyRequest {
        project_id: "cloudwatch-observability-access-manager".to_string(),
        regions: vec!["us-east-1".to_string(), "ap-southeast-2".to_string()],
        source_accounts: vec![
            SourceAccountSpec {
                name: "SourceA".to_string(),
                account_id: "111111111111".to_string(),
            },
            SourceAccountSpec {
                name: "SourceB".to_string(),
                account_id: "222222222222".to_string(),
            },
        ],
        assume_role_name: "OrganizationAccountAccessRole".to_string(),
        label_template: "$AccountName".to_string(),
        removal,
        default_tags: Tags::new(),
    })
    .expect("request should pass");
    compute_topology(&topology).expect("topology should build")
}
