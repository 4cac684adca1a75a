use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use super::CodeConfiguration;

/// Job payload, discriminated by `jobType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "jobType")]
pub enum JobProperties {
    Command(CommandJobProperties),
    Sweep(SweepJobProperties),
}

impl JobProperties {
    pub fn status(&self) -> Option<&str> {
        match self {
            JobProperties::Command(job) => job.status.as_deref(),
            JobProperties::Sweep(job) => job.status.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandJobProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub compute_binding: ComputeBinding,
    pub code_configuration: CodeConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_bindings: BTreeMap<String, DataBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_configuration: Option<DistributionConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_run_duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_endpoints: Option<InteractionEndpoints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DataBindingMode {
    Mount,
    Download,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_new::new)]
#[serde(rename_all = "camelCase")]
pub struct DataBinding {
    pub source_data_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DataBindingMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distributionType", rename_all_fields = "camelCase")]
pub enum DistributionConfiguration {
    Mpi {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        process_count_per_instance: Option<u32>,
    },
    TensorFlow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worker_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameter_server_count: Option<u32>,
    },
    PyTorch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        process_count_per_node: Option<u32>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionEndpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grafana: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensorboard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepJobProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub compute_binding: ComputeBinding,
    pub parameter_sampling_configuration: ParameterSamplingConfiguration,
    pub termination_configuration: TerminationConfiguration,
    pub evaluation_configuration: EvaluationConfiguration,
    pub trial_job: TrialJob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSamplingConfiguration {
    /// Parameter name to `[distribution, [arguments]]`.
    pub parameter_space: BTreeMap<String, Value>,
    pub sampling_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_runs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_runs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_termination_policy_configuration: Option<EarlyTerminationPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policyType", rename_all_fields = "camelCase")]
pub enum EarlyTerminationPolicy {
    Bandit {
        #[serde(default)]
        evaluation_interval: u32,
        #[serde(default)]
        delay_evaluation: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slack_factor: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slack_amount: Option<f64>,
    },
    MedianStopping {
        #[serde(default)]
        evaluation_interval: u32,
        #[serde(default)]
        delay_evaluation: u32,
    },
    TruncationSelection {
        #[serde(default)]
        evaluation_interval: u32,
        #[serde(default)]
        delay_evaluation: u32,
        truncation_percentage: u32,
        #[serde(default)]
        exclude_finished_jobs: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationConfiguration {
    pub primary_metric_name: String,
    pub primary_metric_goal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialJob {
    pub code_configuration: CodeConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data_bindings: BTreeMap<String, DataBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_configuration: Option<DistributionConfiguration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_type_discriminates_properties() {
        let properties: JobProperties = serde_json::from_value(json!({
            "jobType": "Command",
            "computeBinding": {"computeId": "cpu-cluster"},
            "codeConfiguration": {"command": "python train.py"},
            "status": "Running"
        }))
        .unwrap();

        assert!(matches!(properties, JobProperties::Command(_)));
        assert_eq!(properties.status(), Some("Running"));
    }

    #[test]
    fn termination_policy_is_tagged() {
        let policy = EarlyTerminationPolicy::Bandit {
            evaluation_interval: 1,
            delay_evaluation: 5,
            slack_factor: Some(0.1),
            slack_amount: None,
        };
        assert_eq!(
            serde_json::to_value(&policy).unwrap(),
            json!({"policyType": "Bandit", "evaluationInterval": 1, "delayEvaluation": 5, "slackFactor": 0.1})
        );
    }
}
