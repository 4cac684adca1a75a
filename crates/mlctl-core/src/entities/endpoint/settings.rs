//! Runtime settings of an online deployment.

use mlctl_client::schemas::{LivenessProbe, RequestSettings, ResourceRequirements, ScaleSettings};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Instance scaling, keyed by `scale_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scale_type", rename_all = "lowercase", deny_unknown_fields)]
pub enum ScaleSettingsSchema {
    Manual {
        instance_count: u32,
    },
    Auto {
        min_instances: u32,
        max_instances: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        polling_interval: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_utilization_percentage: Option<u32>,
    },
}

impl ScaleSettingsSchema {
    pub fn validate(&self) -> Vec<ValidationError> {
        let ScaleSettingsSchema::Auto {
            min_instances,
            max_instances,
            instance_count,
            target_utilization_percentage,
            ..
        } = self
        else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        if min_instances > max_instances {
            errors.push(ValidationError::new(
                "min_instances",
                "must not exceed max_instances",
            ));
        } else if let Some(count) = instance_count {
            if count < min_instances || count > max_instances {
                errors.push(ValidationError::new(
                    "instance_count",
                    "Instance count must be within the range defined by min_instances and max_instances",
                ));
            }
        }
        if matches!(target_utilization_percentage, Some(p) if *p > 100) {
            errors.push(ValidationError::new(
                "target_utilization_percentage",
                "must be at most 100",
            ));
        }
        errors
    }
}

impl From<&ScaleSettingsSchema> for ScaleSettings {
    fn from(settings: &ScaleSettingsSchema) -> Self {
        match settings.clone() {
            ScaleSettingsSchema::Manual { instance_count } => ScaleSettings::Manual { instance_count },
            ScaleSettingsSchema::Auto {
                min_instances,
                max_instances,
                instance_count,
                polling_interval,
                target_utilization_percentage,
            } => ScaleSettings::Auto {
                minimum: min_instances,
                maximum: max_instances,
                instance_count,
                polling_interval,
                target_utilization_percentage,
            },
        }
    }
}

impl From<ScaleSettings> for ScaleSettingsSchema {
    fn from(settings: ScaleSettings) -> Self {
        match settings {
            ScaleSettings::Manual { instance_count } => ScaleSettingsSchema::Manual { instance_count },
            ScaleSettings::Auto {
                minimum,
                maximum,
                instance_count,
                polling_interval,
                target_utilization_percentage,
            } => ScaleSettingsSchema::Auto {
                min_instances: minimum,
                max_instances: maximum,
                instance_count,
                polling_interval,
                target_utilization_percentage,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSettingsSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_requests_per_instance: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_queue_wait_ms: Option<u32>,
}

impl From<&RequestSettingsSchema> for RequestSettings {
    fn from(settings: &RequestSettingsSchema) -> Self {
        RequestSettings {
            request_timeout_ms: settings.request_timeout_ms,
            max_concurrent_requests_per_instance: settings.max_concurrent_requests_per_instance,
            max_queue_wait_ms: settings.max_queue_wait_ms,
        }
    }
}

impl From<RequestSettings> for RequestSettingsSchema {
    fn from(settings: RequestSettings) -> Self {
        RequestSettingsSchema {
            request_timeout_ms: settings.request_timeout_ms,
            max_concurrent_requests_per_instance: settings.max_concurrent_requests_per_instance,
            max_queue_wait_ms: settings.max_queue_wait_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceRequirementsSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    /// Gigabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<u32>,
}

impl From<&ResourceRequirementsSchema> for ResourceRequirements {
    fn from(requirements: &ResourceRequirementsSchema) -> Self {
        ResourceRequirements {
            cpu: requirements.cpu,
            memory_in_gb: requirements.memory,
            gpu: requirements.gpu,
        }
    }
}

impl From<ResourceRequirements> for ResourceRequirementsSchema {
    fn from(requirements: ResourceRequirements) -> Self {
        ResourceRequirementsSchema {
            cpu: requirements.cpu,
            memory: requirements.memory_in_gb,
            gpu: requirements.gpu,
        }
    }
}

/// Health check timings, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LivenessProbeSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

/// `PT{n}S`, the duration format the service expects.
fn to_duration(seconds: Option<u32>) -> Option<String> {
    seconds.map(|s| format!("PT{s}S"))
}

fn from_duration(duration: Option<&str>) -> Option<u32> {
    duration?.strip_prefix("PT")?.strip_suffix('S')?.parse().ok()
}

impl From<&LivenessProbeSchema> for LivenessProbe {
    fn from(probe: &LivenessProbeSchema) -> Self {
        LivenessProbe {
            initial_delay: to_duration(probe.initial_delay_seconds),
            period: to_duration(probe.period_seconds),
            timeout: to_duration(probe.timeout_seconds),
            success_threshold: probe.success_threshold,
            failure_threshold: probe.failure_threshold,
        }
    }
}

impl From<LivenessProbe> for LivenessProbeSchema {
    fn from(probe: LivenessProbe) -> Self {
        LivenessProbeSchema {
            initial_delay_seconds: from_duration(probe.initial_delay.as_deref()),
            period_seconds: from_duration(probe.period.as_deref()),
            timeout_seconds: from_duration(probe.timeout.as_deref()),
            success_threshold: probe.success_threshold,
            failure_threshold: probe.failure_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manual_scale_requires_an_instance_count() {
        assert!(serde_yaml::from_str::<ScaleSettingsSchema>("scale_type: manual\n").is_err());
        let manual: ScaleSettingsSchema =
            serde_yaml::from_str("scale_type: manual\ninstance_count: 2\n").unwrap();
        assert_eq!(
            serde_json::to_value(ScaleSettings::from(&manual)).unwrap(),
            json!({"scaleType": "Manual", "instanceCount": 2})
        );
    }

    #[test]
    fn auto_scale_bounds_are_checked() {
        let inverted: ScaleSettingsSchema =
            serde_yaml::from_str("scale_type: auto\nmin_instances: 3\nmax_instances: 1\n").unwrap();
        assert_eq!(inverted.validate()[0].field, "min_instances");

        let outside: ScaleSettingsSchema = serde_yaml::from_str(
            "scale_type: auto\nmin_instances: 1\nmax_instances: 3\ninstance_count: 5\n",
        )
        .unwrap();
        assert_eq!(outside.validate()[0].field, "instance_count");

        let ok: ScaleSettingsSchema =
            serde_yaml::from_str("scale_type: auto\nmin_instances: 1\nmax_instances: 3\n").unwrap();
        assert!(ok.validate().is_empty());
        assert_eq!(
            serde_json::to_value(ScaleSettings::from(&ok)).unwrap(),
            json!({"scaleType": "Auto", "minimum": 1, "maximum": 3})
        );
    }

    #[test]
    fn probe_timings_become_durations() {
        let probe = LivenessProbeSchema {
            initial_delay_seconds: Some(10),
            period_seconds: Some(5),
            ..LivenessProbeSchema::default()
        };
        let wire = LivenessProbe::from(&probe);
        assert_eq!(wire.initial_delay.as_deref(), Some("PT10S"));
        assert_eq!(wire.timeout, None);
        assert_eq!(LivenessProbeSchema::from(wire), probe);
    }
}
