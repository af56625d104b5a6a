use std::collections::{BTreeSet, HashMap};

use aws_sdk_oam::types::ResourceType as SdkResourceType;
use oam_topology_core::contract::Tags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub arn: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub arn: String,
    pub sink_arn: String,
    pub label_template: String,
    pub resource_types: Vec<String>,
}

impl LinkRecord {
    pub fn resource_type_set(&self) -> BTreeSet<&str> {
        self.resource_types.iter().map(String::as_str).collect()
    }
}

/// OAM operations bound to one account and region.
pub trait OamApi {
    fn find_sink_by_name(&self, name: &str) -> Result<Option<SinkRecord>, String>;
    fn create_sink(&self, name: &str, tags: &Tags) -> Result<SinkRecord, String>;
    fn get_sink_policy(&self, sink_arn: &str) -> Result<Option<String>, String>;
    fn put_sink_policy(&self, sink_arn: &str, policy_json: &str) -> Result<(), String>;
    fn delete_sink(&self, sink_arn: &str) -> Result<(), String>;
    fn find_link_for_sink(&self, sink_arn: &str) -> Result<Option<LinkRecord>, String>;
    fn create_link(
        &self,
        sink_arn: &str,
        label_template: &str,
        resource_types: &[String],
        tags: &Tags,
    ) -> Result<LinkRecord, String>;
    fn update_link(&self, link_arn: &str, resource_types: &[String]) -> Result<(), String>;
    fn delete_link(&self, link_arn: &str) -> Result<(), String>;
    fn list_tags(&self, resource_arn: &str) -> Result<Tags, String>;
    fn tag_resource(&self, resource_arn: &str, tags: &Tags) -> Result<(), String>;
    fn untag_resource(&self, resource_arn: &str, tag_keys: &[String]) -> Result<(), String>;
}

pub struct AwsOamApi {
    client: aws_sdk_oam::Client,
}

impl AwsOamApi {
    pub fn new(client: aws_sdk_oam::Client) -> Self {
        Self { client }
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn sdk_tags(tags: &Tags) -> HashMap<String, String> {
    tags.iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn sdk_resource_types(resource_types: &[String]) -> Vec<SdkResourceType> {
    resource_types
        .iter()
        .map(|value| SdkResourceType::from(value.as_str()))
        .collect()
}

fn resource_type_names<T: AsRef<str>>(values: &[T]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.as_ref().to_string())
        .collect()
}

impl OamApi for AwsOamApi {
    fn find_sink_by_name(&self, name: &str) -> Result<Option<SinkRecord>, String> {
        let client = self.client.clone();
        let items = block_on(async move {
            client
                .list_sinks()
                .into_paginator()
                .items()
                .send()
                .collect::<Result<Vec<_>, _>>()
                .await
                .map_err(|error| format!("failed to list sinks: {error}"))
        })?;

        Ok(items.into_iter().find_map(|item| match (item.name(), item.arn()) {
            (Some(item_name), Some(arn)) if item_name == name => Some(SinkRecord {
                arn: arn.to_string(),
                name: item_name.to_string(),
            }),
            _ => None,
        }))
    }

    fn create_sink(&self, name: &str, tags: &Tags) -> Result<SinkRecord, String> {
        let client = self.client.clone();
        let sink_name = name.to_string();
        let tags = sdk_tags(tags);
        let output = block_on(async move {
            client
                .create_sink()
                .name(sink_name)
                .set_tags(Some(tags))
                .send()
                .await
                .map_err(|error| format!("failed to create sink: {error}"))
        })?;

        let arn = output
            .arn()
            .ok_or_else(|| format!("create sink '{name}' returned no ARN"))?;
        Ok(SinkRecord {
            arn: arn.to_string(),
            name: output.name().unwrap_or(name).to_string(),
        })
    }

    fn get_sink_policy(&self, sink_arn: &str) -> Result<Option<String>, String> {
        let client = self.client.clone();
        let sink_identifier = sink_arn.to_string();
        block_on(async move {
            match client
                .get_sink_policy()
                .sink_identifier(sink_identifier)
                .send()
                .await
            {
                Ok(output) => Ok(output.policy().map(str::to_string)),
                Err(error)
                    if error
                        .as_service_error()
                        .map(|service| service.is_resource_not_found_exception())
                        .unwrap_or(false) =>
                {
                    Ok(None)
                }
                Err(error) => Err(format!("failed to get sink policy: {error}")),
            }
        })
    }

    fn put_sink_policy(&self, sink_arn: &str, policy_json: &str) -> Result<(), String> {
        let client = self.client.clone();
        let sink_arn = sink_arn.to_string();
        let policy = policy_json.to_string();
        block_on(async move {
            client
                .put_sink_policy()
                .sink_identifier(sink_arn)
                .policy(policy)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to put sink policy: {error}"))
        })
    }

    fn delete_sink(&self, sink_arn: &str) -> Result<(), String> {
        let client = self.client.clone();
        let sink_arn = sink_arn.to_string();
        block_on(async move {
            client
                .delete_sink()
                .identifier(sink_arn)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to delete sink: {error}"))
        })
    }

    fn find_link_for_sink(&self, sink_arn: &str) -> Result<Option<LinkRecord>, String> {
        let client = self.client.clone();
        let items = block_on(async move {
            client
                .list_links()
                .into_paginator()
                .items()
                .send()
                .collect::<Result<Vec<_>, _>>()
                .await
                .map_err(|error| format!("failed to list links: {error}"))
        })?;

        let Some(link_arn) = items
            .iter()
            .filter(|item| item.sink_arn() == Some(sink_arn))
            .find_map(|item| item.arn().map(str::to_string))
        else {
            return Ok(None);
        };

        // Listing only exposes the resolved label, not the template.
        let client = self.client.clone();
        let identifier = link_arn.clone();
        let output = block_on(async move {
            client
                .get_link()
                .identifier(identifier)
                .send()
                .await
                .map_err(|error| format!("failed to describe link: {error}"))
        })?;

        Ok(Some(LinkRecord {
            arn: link_arn,
            sink_arn: sink_arn.to_string(),
            label_template: output.label_template().unwrap_or_default().to_string(),
            resource_types: resource_type_names(output.resource_types()),
        }))
    }

    fn create_link(
        &self,
        sink_arn: &str,
        label_template: &str,
        resource_types: &[String],
        tags: &Tags,
    ) -> Result<LinkRecord, String> {
        let client = self.client.clone();
        let sink_identifier = sink_arn.to_string();
        let template = label_template.to_string();
        let sdk_types = sdk_resource_types(resource_types);
        let tags = sdk_tags(tags);
        let output = block_on(async move {
            client
                .create_link()
                .sink_identifier(sink_identifier)
                .label_template(template)
                .set_resource_types(Some(sdk_types))
                .set_tags(Some(tags))
                .send()
                .await
                .map_err(|error| format!("failed to create link: {error}"))
        })?;

        let arn = output
            .arn()
            .ok_or_else(|| format!("create link to '{sink_arn}' returned no ARN"))?;
        Ok(LinkRecord {
            arn: arn.to_string(),
            sink_arn: sink_arn.to_string(),
            label_template: label_template.to_string(),
            resource_types: resource_types.to_vec(),
        })
    }

    fn update_link(&self, link_arn: &str, resource_types: &[String]) -> Result<(), String> {
        let client = self.client.clone();
        let identifier = link_arn.to_string();
        let sdk_types = sdk_resource_types(resource_types);
        block_on(async move {
            client
                .update_link()
                .identifier(identifier)
                .set_resource_types(Some(sdk_types))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to update link: {error}"))
        })
    }

    fn delete_link(&self, link_arn: &str) -> Result<(), String> {
        let client = self.client.clone();
        let identifier = link_arn.to_string();
        block_on(async move {
            client
                .delete_link()
                .identifier(identifier)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to delete link: {error}"))
        })
    }

    fn list_tags(&self, resource_arn: &str) -> Result<Tags, String> {
        let client = self.client.clone();
        let resource_arn = resource_arn.to_string();
        let output = block_on(async move {
            client
                .list_tags_for_resource()
                .resource_arn(resource_arn)
                .send()
                .await
                .map_err(|error| format!("failed to list tags: {error}"))
        })?;

        Ok(output
            .tags()
            .map(|tags| {
                tags.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn tag_resource(&self, resource_arn: &str, tags: &Tags) -> Result<(), String> {
        let client = self.client.clone();
        let resource_arn = resource_arn.to_string();
        let tags = sdk_tags(tags);
        block_on(async move {
            client
                .tag_resource()
                .resource_arn(resource_arn)
                .set_tags(Some(tags))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to tag resource: {error}"))
        })
    }

    fn untag_resource(&self, resource_arn: &str, tag_keys: &[String]) -> Result<(), String> {
        let client = self.client.clone();
        let resource_arn = resource_arn.to_string();
        let tag_keys = tag_keys.to_vec();
        block_on(async move {
            client
                .untag_resource()
                .resource_arn(resource_arn)
                .set_tag_keys(Some(tag_keys))
                .send()
                .await
                .map(|_| ())
                .map_err(|error| format!("failed to untag resource: {error}"))
        })
    }
}
