use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;
use mlctl_client::schemas::{ArmResource, ComputeProperties};
use serde::Serialize;
use serde_json::Value;

use super::ServiceContext;
use crate::arm_id::AssetKind;
use crate::error::Error;

const KIND: AssetKind = AssetKind::Compute;
const API: &str = API_VERSION_2020_09_01_PREVIEW;

/// A compute target attached to the workspace. Read only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compute {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub compute_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Type-specific settings as the service returns them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

impl Compute {
    fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<ComputeProperties>()?;
        let properties = resource.properties;
        Ok(Self {
            name: resource.name.unwrap_or_default(),
            id: resource.id,
            location: properties.compute_location.or(resource.location),
            compute_type: properties.compute_type,
            provisioning_state: properties.provisioning_state,
            description: properties.description,
            properties: properties.properties,
        })
    }
}

pub struct ComputeOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ComputeOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, name: &str) -> Result<Compute, Error> {
        let resource = self.ctx.get(
            &self.ctx.resource_path(KIND, name),
            API,
            &[],
            KIND.label(),
            name,
        )?;
        Compute::from_rest(resource)
    }

    pub fn list(&self) -> Result<Vec<Compute>, Error> {
        self.ctx
            .list(&self.ctx.collection(KIND), API, &[])?
            .into_iter()
            .map(Compute::from_rest)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::{Method, RecordingTransport, service_context};
    use serde_json::json;

    #[test]
    fn compute_is_read_from_the_workspace() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        transport.seed(
            &ctx.resource_path(KIND, "cpu-cluster"),
            json!({
                "location": "westus2",
                "properties": {
                    "computeType": "AmlCompute",
                    "provisioningState": "Succeeded",
                    "properties": {"vmSize": "STANDARD_D2_V2"}
                }
            }),
        );

        let compute = ComputeOperations::new(&ctx).get("cpu-cluster").unwrap();

        assert_eq!(compute.name, "cpu-cluster");
        assert_eq!(compute.compute_type.as_deref(), Some("AmlCompute"));
        assert_eq!(compute.location.as_deref(), Some("westus2"));
        assert_eq!(compute.properties.unwrap()["vmSize"], "STANDARD_D2_V2");
        assert_eq!(transport.calls()[0].api_version, API);
    }

    #[test]
    fn list_returns_every_compute() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        for name in ["cpu-cluster", "gpu-cluster"] {
            transport.seed(&ctx.resource_path(KIND, name), json!({"properties": {}}));
        }

        let names: Vec<String> = ComputeOperations::new(&ctx)
            .list()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();

        assert_eq!(names, ["cpu-cluster", "gpu-cluster"]);
        assert_eq!(transport.count(Method::List), 1);
    }

    #[test]
    fn unknown_compute_is_not_found() {
        let (ctx, _) = service_context(RecordingTransport::new());
        let err = ComputeOperations::new(&ctx).get("absent").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
