use mlctl_client::schemas::{
    ArmResource, ComputeConfiguration, OnlineEndpointProperties, ResourceIdentity,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumString};

use super::deployment::{OnlineDeployment, OnlineDeploymentSchema};
use super::{EndpointType, validate_traffic};
use crate::arm_id::{ARM_ID_PREFIX, ArmId, AssetKind, is_canonical, to_canonical};
use crate::error::{Error, ReferenceError, ValidationError, ValidationErrors};
use crate::schema::{LoadContext, Nested, Schema};

const MANAGED: &str = "managed";

/// How callers authenticate against the scoring URI.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum AuthMode {
    #[default]
    Key,
    #[strum(to_string = "AMLToken", serialize = "aml_token")]
    AmlToken,
    #[strum(to_string = "AADToken", serialize = "aad_token")]
    AadToken,
}

/// Where the endpoint runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Infrastructure {
    Managed,
    /// Canonical compute id, or the bare name until a workspace is known.
    Compute(String),
}

impl Infrastructure {
    fn decode(value: Option<&str>, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        let Some(value) = value else {
            return Ok(Infrastructure::Managed);
        };
        if value.eq_ignore_ascii_case(MANAGED) {
            return Ok(Infrastructure::Managed);
        }
        let remainder = value.strip_prefix(ARM_ID_PREFIX).ok_or_else(|| {
            ValidationErrors::single(
                "infrastructure",
                format!("expected managed or an azureml: compute reference, got {value}"),
            )
        })?;
        let compute = match &ctx.workspace {
            Some(scope) => to_canonical(Some(scope), AssetKind::Compute, remainder, None)
                .map_err(|e| ValidationErrors::single("infrastructure", e.to_string()))?,
            None => remainder.to_string(),
        };
        Ok(Infrastructure::Compute(compute))
    }

    fn to_document(&self) -> String {
        match self {
            Infrastructure::Managed => MANAGED.to_string(),
            Infrastructure::Compute(compute) => format!("{ARM_ID_PREFIX}{compute}"),
        }
    }

    /// Compute configuration and the identity the service provisions for it.
    fn to_rest(&self) -> (ComputeConfiguration, ResourceIdentity) {
        match self {
            Infrastructure::Managed => (
                ComputeConfiguration::Managed,
                ResourceIdentity {
                    identity_type: "SystemAssigned".to_string(),
                },
            ),
            Infrastructure::Compute(compute) => {
                let compute_name = match ArmId::from_str(compute) {
                    Ok(id) => id.name,
                    Err(_) => compute.rsplit('/').next().unwrap_or(compute).to_string(),
                };
                (
                    ComputeConfiguration::Aks { compute_name },
                    ResourceIdentity {
                        identity_type: "None".to_string(),
                    },
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnlineEndpointSchema {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<EndpointType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub traffic: BTreeMap<String, u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployments: BTreeMap<String, Nested<OnlineDeploymentSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swagger_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnlineEndpoint {
    pub name: String,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
    pub traffic: BTreeMap<String, u8>,
    pub auth_mode: AuthMode,
    pub infrastructure: Infrastructure,
    pub location: Option<String>,
    pub deployments: BTreeMap<String, OnlineDeployment>,
    pub scoring_uri: Option<String>,
    pub swagger_uri: Option<String>,
    pub provisioning_state: Option<String>,
    pub id: Option<String>,
}

impl OnlineEndpoint {
    pub fn is_managed(&self) -> bool {
        self.infrastructure == Infrastructure::Managed
    }

    pub fn compute_mut(&mut self) -> Option<&mut String> {
        match &mut self.infrastructure {
            Infrastructure::Compute(compute) => Some(compute),
            Infrastructure::Managed => None,
        }
    }

    /// Endpoint shell. With `with_traffic` unset the traffic map is sent empty,
    /// which is how the shell is created before any deployment exists.
    pub fn translate_to_rest_object(
        &self,
        location: Option<String>,
        with_traffic: bool,
    ) -> Result<ArmResource<OnlineEndpointProperties>, Error> {
        if let Infrastructure::Compute(compute) = &self.infrastructure {
            if !is_canonical(compute) {
                return Err(ReferenceError::Unresolved {
                    field: "infrastructure".to_string(),
                }
                .into());
            }
        }
        let (compute_configuration, identity) = self.infrastructure.to_rest();
        let traffic_rules = if with_traffic {
            self.traffic.clone()
        } else {
            BTreeMap::new()
        };

        let properties = OnlineEndpointProperties {
            description: self.description.clone(),
            auth_mode: self.auth_mode.to_string(),
            compute_configuration,
            properties: self.properties.clone(),
            traffic_rules: Some(traffic_rules),
            endpoint: None,
            swagger_endpoint: None,
            provisioning_state: None,
        };

        Ok(ArmResource::new(properties)
            .with_name(self.name.clone())
            .with_tags(self.tags.clone())
            .with_location(location)
            .with_identity(identity))
    }

    pub fn from_rest(
        resource: ArmResource<Value>,
        deployments: Vec<ArmResource<Value>>,
    ) -> Result<Self, Error> {
        let resource = resource.typed::<OnlineEndpointProperties>()?;
        let properties = resource.properties;

        let mut by_name = BTreeMap::new();
        for deployment in deployments {
            let deployment = OnlineDeployment::from_rest(deployment)?;
            if let Some(name) = deployment.name.clone() {
                by_name.insert(name, deployment);
            }
        }

        let infrastructure = match properties.compute_configuration {
            ComputeConfiguration::Managed => Infrastructure::Managed,
            ComputeConfiguration::Aks { compute_name } => Infrastructure::Compute(compute_name),
        };

        Ok(Self {
            name: resource.name.unwrap_or_default(),
            description: properties.description,
            tags: resource.tags,
            properties: properties.properties,
            traffic: properties.traffic_rules.unwrap_or_default(),
            auth_mode: AuthMode::from_str(&properties.auth_mode).unwrap_or_default(),
            infrastructure,
            location: resource.location,
            deployments: by_name,
            scoring_uri: properties.endpoint,
            swagger_uri: properties.swagger_endpoint,
            provisioning_state: properties.provisioning_state,
            id: resource.id,
        })
    }
}

impl Schema for OnlineEndpoint {
    type Document = OnlineEndpointSchema;

    fn from_document(
        doc: OnlineEndpointSchema,
        ctx: &LoadContext,
    ) -> Result<Self, ValidationErrors> {
        EndpointType::Online.check(doc.endpoint_type)?;
        let infrastructure = Infrastructure::decode(doc.infrastructure.as_deref(), ctx)?;

        let mut errors = Vec::new();
        let mut deployments = BTreeMap::new();
        for (name, nested) in doc.deployments {
            match nested.load::<OnlineDeployment>(ctx) {
                Ok(mut deployment) => {
                    deployment.name = Some(name.clone());
                    deployments.insert(name, deployment);
                }
                Err(e) => errors.extend(e.within(&format!("deployments.{name}")).0),
            }
        }
        ValidationErrors::from(errors).into_result()?;

        Ok(Self {
            name: doc.name,
            description: doc.description,
            tags: doc.tags,
            properties: doc.properties,
            traffic: doc.traffic,
            auth_mode: doc.auth_mode.unwrap_or_default(),
            infrastructure,
            location: doc.location,
            deployments,
            scoring_uri: doc.scoring_uri,
            swagger_uri: doc.swagger_uri,
            provisioning_state: doc.provisioning_state,
            id: None,
        })
    }

    fn to_document(&self) -> Result<OnlineEndpointSchema, ValidationErrors> {
        let mut deployments = BTreeMap::new();
        for (name, deployment) in &self.deployments {
            let mut doc = deployment
                .to_document()
                .map_err(|e| e.within(&format!("deployments.{name}")))?;
            doc.name = None;
            deployments.insert(name.clone(), Nested::Inline(doc));
        }

        Ok(OnlineEndpointSchema {
            name: self.name.clone(),
            endpoint_type: Some(EndpointType::Online),
            description: self.description.clone(),
            tags: self.tags.clone(),
            properties: self.properties.clone(),
            traffic: self.traffic.clone(),
            auth_mode: Some(self.auth_mode),
            infrastructure: Some(self.infrastructure.to_document()),
            location: self.location.clone(),
            deployments,
            scoring_uri: self.scoring_uri.clone(),
            swagger_uri: self.swagger_uri.clone(),
            provisioning_state: self.provisioning_state.clone(),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> =
            validate_traffic(&self.traffic).into_iter().collect();
        if self.is_managed() {
            for (name, deployment) in &self.deployments {
                if deployment.sku.is_none() {
                    errors.push(ValidationError::new(
                        format!("deployments.{name}.sku"),
                        "A sku must be specified for a managed inference cluster",
                    ));
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceScope;
    use crate::schema::{dump, load_str};
    use rstest::rstest;
    use serde_json::json;

    const ENDPOINT: &str = r#"
name: iris-endpoint
auth_mode: aml_token
traffic:
  blue: 100
deployments:
  blue:
    model: azureml:sklearn-model:1
    environment: azureml:sklearn-env:1
    sku: Standard_F2s_v2
    scale_settings:
      scale_type: manual
      instance_count: 1
"#;

    fn scoped() -> LoadContext {
        LoadContext::new("/work").with_workspace(WorkspaceScope::new(
            "sub".into(),
            "rg".into(),
            "ws".into(),
        ))
    }

    #[test]
    fn deployments_take_their_map_key_as_name() {
        let endpoint = load_str::<OnlineEndpoint>(ENDPOINT, &scoped()).unwrap();
        assert_eq!(endpoint.deployments["blue"].name.as_deref(), Some("blue"));
        assert!(endpoint.is_managed());
        assert_eq!(endpoint.auth_mode, AuthMode::AmlToken);
    }

    #[test]
    fn traffic_over_one_hundred_is_rejected() {
        let yaml = ENDPOINT.replace("  blue: 100\n", "  blue: 60\n  green: 50\n");
        let err = load_str::<OnlineEndpoint>(&yaml, &scoped()).unwrap_err();
        assert!(err.to_string().contains("must sum to less than or equal to 100%"));
    }

    #[test]
    fn single_deployment_above_one_hundred_is_rejected() {
        let yaml = ENDPOINT.replace("  blue: 100\n", "  blue: 101\n");
        let err = load_str::<OnlineEndpoint>(&yaml, &scoped()).unwrap_err();
        assert!(err.to_string().contains("traffic"));
    }

    #[rstest]
    #[case::split_evenly(50, 50)]
    #[case::mostly_green(1, 99)]
    fn two_deployments_summing_to_one_hundred_are_accepted(
        #[case] blue: u8,
        #[case] green: u8,
    ) {
        let green_deployment = ENDPOINT
            .split_once("  blue:\n")
            .map(|(_, body)| format!("  green:\n{body}"))
            .unwrap();
        let yaml = format!("{ENDPOINT}{green_deployment}")
            .replace("  blue: 100\n", &format!("  blue: {blue}\n  green: {green}\n"));

        let endpoint = load_str::<OnlineEndpoint>(&yaml, &scoped()).unwrap();
        assert_eq!(endpoint.traffic.values().map(|&p| u32::from(p)).sum::<u32>(), 100);
        assert_eq!(endpoint.deployments.len(), 2);
    }

    #[test]
    fn managed_deployments_need_a_sku() {
        let yaml = ENDPOINT.replace("    sku: Standard_F2s_v2\n", "");
        let err = load_str::<OnlineEndpoint>(&yaml, &scoped()).unwrap_err();
        assert!(err.to_string().contains("deployments.blue.sku"));

        let aks = yaml.replace("auth_mode: aml_token\n", "infrastructure: azureml:aks-cluster\n");
        assert!(load_str::<OnlineEndpoint>(&aks, &scoped()).is_ok());
    }

    #[test]
    fn shell_is_sent_without_traffic() {
        let endpoint = load_str::<OnlineEndpoint>(ENDPOINT, &scoped()).unwrap();

        let shell = endpoint
            .translate_to_rest_object(Some("westus2".into()), false)
            .unwrap();
        let value = shell.to_value().unwrap();
        assert_eq!(value["properties"]["trafficRules"], json!({}));
        assert_eq!(value["properties"]["authMode"], json!("AMLToken"));
        assert_eq!(value["properties"]["computeConfiguration"], json!({"computeType": "Managed"}));
        assert_eq!(value["identity"], json!({"type": "SystemAssigned"}));

        let full = endpoint
            .translate_to_rest_object(Some("westus2".into()), true)
            .unwrap();
        assert_eq!(full.properties.traffic_rules, Some(BTreeMap::from([("blue".to_string(), 100)])));
    }

    #[test]
    fn aks_compute_is_sent_by_name() {
        let yaml = ENDPOINT.replace("auth_mode: aml_token\n", "infrastructure: azureml:aks-cluster\n");
        let endpoint = load_str::<OnlineEndpoint>(&yaml, &scoped()).unwrap();
        let rest = endpoint.translate_to_rest_object(None, false).unwrap();
        assert_eq!(
            rest.properties.compute_configuration,
            ComputeConfiguration::Aks {
                compute_name: "aks-cluster".into()
            }
        );
        assert!(dump(&endpoint).unwrap().contains("infrastructure: azureml:/subscriptions/sub"));
    }

    #[test]
    fn from_rest_collects_deployments() {
        let endpoint: ArmResource<Value> = serde_json::from_value(json!({
            "id": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/onlineEndpoints/iris-endpoint",
            "name": "iris-endpoint",
            "location": "westus2",
            "properties": {
                "authMode": "Key",
                "computeConfiguration": {"computeType": "Managed"},
                "trafficRules": {"blue": 100},
                "endpoint": "https://iris-endpoint.westus2.inference.ml.azure.com/score",
                "provisioningState": "Succeeded"
            }
        }))
        .unwrap();
        let blue: ArmResource<Value> = serde_json::from_value(json!({
            "name": "blue",
            "properties": {
                "modelReference": {"referenceType": "Id", "assetId": "/subscriptions/sub/models/m/versions/1"},
                "sku": "Standard_F2s_v2"
            }
        }))
        .unwrap();

        let endpoint = OnlineEndpoint::from_rest(endpoint, vec![blue]).unwrap();
        assert_eq!(endpoint.traffic["blue"], 100);
        assert_eq!(endpoint.deployments["blue"].sku.as_deref(), Some("Standard_F2s_v2"));
        assert_eq!(endpoint.provisioning_state.as_deref(), Some("Succeeded"));
        assert!(dump(&endpoint).unwrap().contains("scoring_uri:"));
    }
}
