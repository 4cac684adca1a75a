//! Online and batch endpoints and the deployments they route traffic to.

pub mod batch;
pub mod code_configuration;
pub mod deployment;
pub mod online;
pub mod settings;

pub use batch::{
    BatchDeployment, BatchDeploymentSchema, BatchEndpoint, BatchEndpointSchema,
    BatchSettingsSchema, OutputAction,
};
pub use code_configuration::{CodeConfigurationSchema, DeploymentCode};
pub use deployment::{OnlineDeployment, OnlineDeploymentSchema};
pub use online::{AuthMode, Infrastructure, OnlineEndpoint, OnlineEndpointSchema};
pub use settings::{
    LivenessProbeSchema, RequestSettingsSchema, ResourceRequirementsSchema, ScaleSettingsSchema,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::error::ValidationError;

/// Provisioning states after which an endpoint or deployment no longer changes.
pub const TERMINAL_PROVISIONING_STATES: [&str; 3] = ["Succeeded", "Failed", "Canceled"];

/// Key of the optional `type` discriminator in endpoint documents.
pub const ENDPOINT_TYPE_KEY: &str = "type";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EndpointType {
    #[default]
    Online,
    Batch,
}

impl EndpointType {
    /// The `type` a document declares, if any.
    pub fn declared_by(document: &serde_yaml::Value) -> Result<Option<Self>, ValidationError> {
        let Some(value) = document.get(ENDPOINT_TYPE_KEY) else {
            return Ok(None);
        };
        let invalid = || {
            ValidationError::new(
                ENDPOINT_TYPE_KEY,
                format!("expected online or batch, got {value:?}"),
            )
        };
        value
            .as_str()
            .ok_or_else(invalid)?
            .parse()
            .map(Some)
            .map_err(|_| invalid())
    }

    /// Rejects a document whose `type` names the other kind of endpoint.
    pub(crate) fn check(self, declared: Option<EndpointType>) -> Result<(), ValidationError> {
        match declared {
            Some(declared) if declared != self => Err(ValidationError::new(
                ENDPOINT_TYPE_KEY,
                format!("{declared} endpoint documents cannot be loaded as {self} endpoints"),
            )),
            _ => Ok(()),
        }
    }
}

/// Traffic percentages may add up to at most 100.
pub(crate) fn validate_traffic(traffic: &BTreeMap<String, u8>) -> Option<ValidationError> {
    let total: u32 = traffic.values().map(|&p| u32::from(p)).sum();
    (total > 100).then(|| {
        ValidationError::new(
            "traffic",
            "Traffic rule percentages must sum to less than or equal to 100%",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("name: e\n", None)]
    #[case("name: e\ntype: batch\n", Some(EndpointType::Batch))]
    #[case("name: e\ntype: Online\n", Some(EndpointType::Online))]
    fn declared_type_is_read_from_the_document(
        #[case] yaml: &str,
        #[case] expected: Option<EndpointType>,
    ) {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(EndpointType::declared_by(&document).unwrap(), expected);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let document: serde_yaml::Value = serde_yaml::from_str("type: streaming\n").unwrap();
        let err = EndpointType::declared_by(&document).unwrap_err();
        assert_eq!(err.field, "type");
    }

    #[test]
    fn mismatched_type_is_rejected() {
        let err = EndpointType::Online
            .check(Some(EndpointType::Batch))
            .unwrap_err();
        assert!(err.message.contains("batch endpoint documents cannot be loaded as online"));
        assert!(EndpointType::Batch.check(None).is_ok());
    }
}
