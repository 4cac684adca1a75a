use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::CodeConfiguration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineEndpointProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub auth_mode: String,
    pub compute_configuration: ComputeConfiguration,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Always sent on writes, even when empty, so the service drops stale rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_rules: Option<BTreeMap<String, u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swagger_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "computeType")]
pub enum ComputeConfiguration {
    Managed,
    #[serde(rename = "AKS", rename_all = "camelCase")]
    Aks { compute_name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineDeploymentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_configuration: Option<CodeConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_reference: Option<ModelReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_settings: Option<ScaleSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_settings: Option<RequestSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<LivenessProbe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReference {
    pub reference_type: String,
    pub asset_id: String,
}

impl ModelReference {
    pub fn by_id(asset_id: impl Into<String>) -> Self {
        Self {
            reference_type: "Id".to_string(),
            asset_id: asset_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scaleType", rename_all_fields = "camelCase")]
pub enum ScaleSettings {
    Manual {
        instance_count: u32,
    },
    Auto {
        minimum: u32,
        maximum: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        polling_interval: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_utilization_percentage: Option<u32>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_requests_per_instance: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue_wait_ms: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_in_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAuthKeys {
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub secondary_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEndpointProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_rules: Option<BTreeMap<String, u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeploymentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_configuration: Option<CodeConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_reference: Option<ModelReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_settings: Option<BatchDeploymentSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_settings: Option<BatchScaleSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// How a batch deployment splits, retries and writes out its work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeploymentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitioning_scheme: Option<BatchPartitioningScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_configuration: Option<BatchOutputConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_settings: Option<BatchRetrySettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPartitioningScheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mini_batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitioning_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutputConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_row_file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRetrySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in_seconds: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScaleSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compute_configuration_round_trips() {
        let aks = ComputeConfiguration::Aks {
            compute_name: "inference".to_string(),
        };
        let value = serde_json::to_value(&aks).unwrap();
        assert_eq!(value, json!({"computeType": "AKS", "computeName": "inference"}));
        assert_eq!(
            serde_json::from_value::<ComputeConfiguration>(json!({"computeType": "Managed"}))
                .unwrap(),
            ComputeConfiguration::Managed
        );
    }

    #[test]
    fn empty_traffic_is_serialized() {
        let properties = OnlineEndpointProperties {
            description: None,
            auth_mode: "Key".to_string(),
            compute_configuration: ComputeConfiguration::Managed,
            properties: BTreeMap::new(),
            traffic_rules: Some(BTreeMap::new()),
            endpoint: None,
            swagger_endpoint: None,
            provisioning_state: None,
        };
        let value = serde_json::to_value(&properties).unwrap();
        assert_eq!(value["trafficRules"], json!({}));
    }

    #[test]
    fn batch_settings_use_camel_case() {
        let settings = BatchDeploymentSettings {
            compute_id: Some("/subscriptions/s/computes/cpu".to_string()),
            partitioning_scheme: Some(BatchPartitioningScheme {
                mini_batch_size: Some(10),
                partitioning_keys: Vec::new(),
            }),
            retry_settings: Some(BatchRetrySettings {
                maximum_retries: Some(3),
                timeout_in_seconds: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            json!({
                "computeId": "/subscriptions/s/computes/cpu",
                "partitioningScheme": {"miniBatchSize": 10},
                "retrySettings": {"maximumRetries": 3}
            })
        );
    }
}
