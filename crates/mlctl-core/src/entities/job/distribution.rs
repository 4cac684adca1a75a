use mlctl_client::schemas::DistributionConfiguration;
use serde::{Deserialize, Serialize};

/// Multi-process launch settings, keyed by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum Distribution {
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

impl From<&Distribution> for DistributionConfiguration {
    fn from(distribution: &Distribution) -> Self {
        match *distribution {
            Distribution::Mpi {
                process_count_per_instance,
            } => DistributionConfiguration::Mpi {
                process_count_per_instance,
            },
            Distribution::TensorFlow {
                worker_count,
                parameter_server_count,
            } => DistributionConfiguration::TensorFlow {
                worker_count,
                parameter_server_count,
            },
            Distribution::PyTorch {
                process_count_per_node,
            } => DistributionConfiguration::PyTorch {
                process_count_per_node,
            },
        }
    }
}

impl From<DistributionConfiguration> for Distribution {
    fn from(configuration: DistributionConfiguration) -> Self {
        match configuration {
            DistributionConfiguration::Mpi {
                process_count_per_instance,
            } => Distribution::Mpi {
                process_count_per_instance,
            },
            DistributionConfiguration::TensorFlow {
                worker_count,
                parameter_server_count,
            } => Distribution::TensorFlow {
                worker_count,
                parameter_server_count,
            },
            DistributionConfiguration::PyTorch {
                process_count_per_node,
            } => Distribution::PyTorch {
                process_count_per_node,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_type_maps_to_wire_distribution_type() {
        let distribution: Distribution =
            serde_yaml::from_str("type: pytorch\nprocess_count_per_node: 4\n").unwrap();
        let wire = DistributionConfiguration::from(&distribution);
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"distributionType": "PyTorch", "processCountPerNode": 4})
        );
        assert_eq!(Distribution::from(wire), distribution);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_yaml::from_str::<Distribution>("type: mpi\nworkers: 2\n").is_err());
        assert!(serde_yaml::from_str::<Distribution>("type: horovod\n").is_err());
    }
}
