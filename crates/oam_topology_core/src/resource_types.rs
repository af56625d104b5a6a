use serde::{Deserialize, Serialize};

/// Observability data categories a source account may share with a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "AWS::ApplicationInsights::Application")]
    ApplicationInsightsApplication,
    #[serde(rename = "AWS::CloudWatch::Metric")]
    CloudWatchMetric,
    #[serde(rename = "AWS::Logs::LogGroup")]
    LogsLogGroup,
    #[serde(rename = "AWS::XRay::Trace")]
    XRayTrace,
}

/// The allow-list shared by every sink policy and every link. Order is the
/// wire order.
pub const LINK_RESOURCE_TYPES: [ResourceType; 4] = [
    ResourceType::ApplicationInsightsApplication,
    ResourceType::CloudWatchMetric,
    ResourceType::LogsLogGroup,
    ResourceType::XRayTrace,
];

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApplicationInsightsApplication => "AWS::ApplicationInsights::Application",
            Self::CloudWatchMetric => "AWS::CloudWatch::Metric",
            Self::LogsLogGroup => "AWS::Logs::LogGroup",
            Self::XRayTrace => "AWS::XRay::Trace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        LINK_RESOURCE_TYPES
            .into_iter()
            .find(|candidate| candidate.as_str() == value)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn link_resource_types() -> Vec<String> {
    LINK_RESOURCE_TYPES
        .iter()
        .map(|resource_type| resource_type.as_str().to_string())
        .collect()
}
