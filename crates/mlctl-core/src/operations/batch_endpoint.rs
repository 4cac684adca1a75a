use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;
use mlctl_client::schemas::{ArmResource, EndpointAuthKeys};
use serde_json::Value;

use super::ServiceContext;
use crate::arm_id::AssetKind;
use crate::entities::{BatchDeployment, BatchEndpoint};
use crate::error::Error;
use crate::orchestrator::OperationOrchestrator;

const KIND: AssetKind = AssetKind::BatchEndpoint;
const API: &str = API_VERSION_2020_09_01_PREVIEW;

pub struct BatchEndpointOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> BatchEndpointOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn path(&self, name: &str) -> String {
        self.ctx.resource_path(KIND, name)
    }

    fn deployments_path(&self, endpoint: &str) -> String {
        format!("{}/deployments", self.path(endpoint))
    }

    pub fn get(&self, name: &str) -> Result<BatchEndpoint, Error> {
        let resource = self
            .ctx
            .get(&self.path(name), API, &[], KIND.label(), name)?;
        let deployments = self.ctx.list(&self.deployments_path(name), API, &[])?;
        BatchEndpoint::from_rest(resource, deployments)
    }

    pub fn list(&self) -> Result<Vec<BatchEndpoint>, Error> {
        self.ctx
            .list(&self.ctx.collection(KIND), API, &[])?
            .into_iter()
            .map(|resource| BatchEndpoint::from_rest(resource, Vec::new()))
            .collect()
    }

    /// Shell without traffic, each deployment, then the shell with traffic.
    pub fn create_or_update(&self, endpoint: &mut BatchEndpoint) -> Result<BatchEndpoint, Error> {
        let location = endpoint
            .location
            .clone()
            .or_else(|| self.ctx.location().map(str::to_string));
        let path = self.path(&endpoint.name);

        self.ctx.put(
            &path,
            API,
            &endpoint.translate_to_rest_object(location.clone(), false),
        )?;
        log::debug!("Created batch endpoint shell {}", endpoint.name);

        let mut deployments = Vec::with_capacity(endpoint.deployments.len());
        for deployment in endpoint.deployments.values_mut() {
            deployments.push(self.put_deployment(&endpoint.name, deployment, location.clone())?);
        }

        let created = self
            .ctx
            .put(&path, API, &endpoint.translate_to_rest_object(location, true))?;
        log::info!("Created batch endpoint {}", endpoint.name);
        BatchEndpoint::from_rest(created, deployments)
    }

    pub fn create_or_update_deployment(
        &self,
        endpoint: &str,
        deployment: &mut BatchDeployment,
    ) -> Result<BatchDeployment, Error> {
        let location = self.ctx.location().map(str::to_string);
        let created = self.put_deployment(endpoint, deployment, location)?;
        BatchDeployment::from_rest(created)
    }

    fn put_deployment(
        &self,
        endpoint: &str,
        deployment: &mut BatchDeployment,
        location: Option<String>,
    ) -> Result<ArmResource<Value>, Error> {
        let name = deployment.name.clone().ok_or(Error::MissingRequiredField {
            entity: "batch deployment",
            field: "name",
        })?;
        OperationOrchestrator::new(self.ctx).resolve_batch_deployment(deployment)?;
        let created = self.ctx.put(
            &format!("{}/{name}", self.deployments_path(endpoint)),
            API,
            &deployment.translate_to_rest_object(location)?,
        )?;
        log::info!("Created batch deployment {name} under {endpoint}");
        Ok(created)
    }

    pub fn get_keys(&self, name: &str) -> Result<EndpointAuthKeys, Error> {
        let keys = self
            .ctx
            .post(&format!("{}/listKeys", self.path(name)), API)?;
        Ok(serde_json::from_value(keys)?)
    }

    pub fn delete(&self, name: &str) -> Result<(), Error> {
        self.ctx.delete(&self.path(name), API)?;
        log::info!("Deleted batch endpoint {name}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::{Method, RecordingTransport, service_context};
    use crate::schema::load_str;
    use serde_json::json;

    const MODEL: &str = "azureml:/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/models/iris/versions/1";

    fn endpoint_yaml() -> String {
        format!(
            "name: nightly\ntype: batch\nlocation: eastus\ntraffic:\n  blue: 100\ndeployments:\n  blue:\n    model: {MODEL}\n    compute:\n      target: azureml:cpu-cluster\n      node_count: 3\n"
        )
    }

    #[test]
    fn create_puts_shell_deployment_and_traffic() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let operations = BatchEndpointOperations::new(&ctx);
        let mut endpoint: BatchEndpoint =
            load_str(&endpoint_yaml(), &ctx.load_context("/work")).unwrap();

        let created = operations.create_or_update(&mut endpoint).unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.method == Method::Put && c.api_version == API));
        assert_eq!(calls[0].body.as_ref().unwrap()["properties"]["trafficRules"], json!({}));
        assert_eq!(calls[1].path, format!("{}/deployments/blue", operations.path("nightly")));
        assert!(
            calls[1].body.as_ref().unwrap()["properties"]["batchSettings"]["computeId"]
                .as_str()
                .unwrap()
                .ends_with("/workspaces/ws/computes/cpu-cluster")
        );
        assert_eq!(created.traffic["blue"], 100);
        assert_eq!(created.deployments["blue"].compute.node_count, Some(3));
    }

    #[test]
    fn get_reads_the_endpoint_and_its_deployments() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let operations = BatchEndpointOperations::new(&ctx);
        let path = operations.path("nightly");
        transport.seed(&path, json!({"properties": {"trafficRules": {"blue": 100}}}));
        transport.seed(
            &format!("{path}/deployments/blue"),
            json!({"properties": {
                "modelReference": {"referenceType": "Id", "assetId": MODEL.trim_start_matches("azureml:")},
                "batchSettings": {"computeId": "/subscriptions/sub/computes/cpu-cluster"}
            }}),
        );

        let endpoint = operations.get("nightly").unwrap();

        assert_eq!(endpoint.deployments.len(), 1);
        assert_eq!(transport.count(Method::Get), 1);
        assert_eq!(transport.count(Method::List), 1);
    }

    #[test]
    fn missing_endpoint_is_not_found() {
        let (ctx, _) = service_context(RecordingTransport::new());
        let err = BatchEndpointOperations::new(&ctx).get("absent").unwrap_err();
        assert_eq!(err.to_string(), "batch endpoint absent not found");
    }

    #[test]
    fn delete_targets_the_batch_collection() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let operations = BatchEndpointOperations::new(&ctx);

        operations.delete("nightly").unwrap();

        let call = &transport.calls()[0];
        assert!(call.path.ends_with("/batchEndpoints/nightly"));
        assert_eq!(call.api_version, API);
    }
}
