use mlctl_client::api::API_VERSION_2020_12_01_PREVIEW;
use mlctl_client::schemas::{ArmResource, EndpointAuthKeys};
use serde_json::Value;

use super::ServiceContext;
use crate::arm_id::AssetKind;
use crate::entities::{OnlineDeployment, OnlineEndpoint};
use crate::error::Error;
use crate::orchestrator::OperationOrchestrator;

const KIND: AssetKind = AssetKind::OnlineEndpoint;
const API: &str = API_VERSION_2020_12_01_PREVIEW;

pub struct EndpointOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> EndpointOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn path(&self, name: &str) -> String {
        self.ctx.resource_path(KIND, name)
    }

    fn deployments_path(&self, endpoint: &str) -> String {
        format!("{}/deployments", self.path(endpoint))
    }

    /// The endpoint together with its deployments.
    pub fn get(&self, name: &str) -> Result<OnlineEndpoint, Error> {
        let resource = self
            .ctx
            .get(&self.path(name), API, &[], KIND.label(), name)?;
        let deployments = self.ctx.list(&self.deployments_path(name), API, &[])?;
        OnlineEndpoint::from_rest(resource, deployments)
    }

    /// Endpoint shells; deployments are only fetched by [`Self::get`].
    pub fn list(&self) -> Result<Vec<OnlineEndpoint>, Error> {
        self.ctx
            .list(&self.ctx.collection(KIND), API, &[])?
            .into_iter()
            .map(|resource| OnlineEndpoint::from_rest(resource, Vec::new()))
            .collect()
    }

    /// Creates the endpoint in three steps: the shell without traffic, each
    /// deployment, then the shell again with the declared traffic.
    ///
    /// Nothing is rolled back when a step fails; the shell stays behind.
    pub fn create_or_update(&self, endpoint: &mut OnlineEndpoint) -> Result<OnlineEndpoint, Error> {
        if let Some(compute) = endpoint.compute_mut() {
            OperationOrchestrator::new(self.ctx).resolve_compute(compute)?;
        }
        let location = endpoint.location.clone().or_else(|| self.default_location());
        let path = self.path(&endpoint.name);

        self.ctx.put(
            &path,
            API,
            &endpoint.translate_to_rest_object(location.clone(), false)?,
        )?;
        log::debug!("Created endpoint shell {}", endpoint.name);

        let mut deployments = Vec::with_capacity(endpoint.deployments.len());
        for deployment in endpoint.deployments.values_mut() {
            deployments.push(self.put_deployment(&endpoint.name, deployment, location.clone())?);
        }

        let created = self.ctx.put(
            &path,
            API,
            &endpoint.translate_to_rest_object(location, true)?,
        )?;
        log::info!("Created online endpoint {}", endpoint.name);
        OnlineEndpoint::from_rest(created, deployments)
    }

    /// Resolves the deployment's references and PUTs it under `endpoint`.
    pub fn create_or_update_deployment(
        &self,
        endpoint: &str,
        deployment: &mut OnlineDeployment,
    ) -> Result<OnlineDeployment, Error> {
        let location = self.default_location();
        let created = self.put_deployment(endpoint, deployment, location)?;
        OnlineDeployment::from_rest(created)
    }

    fn put_deployment(
        &self,
        endpoint: &str,
        deployment: &mut OnlineDeployment,
        location: Option<String>,
    ) -> Result<ArmResource<Value>, Error> {
        let name = deployment.name.clone().ok_or(Error::MissingRequiredField {
            entity: "deployment",
            field: "name",
        })?;
        OperationOrchestrator::new(self.ctx).resolve_deployment(deployment)?;
        let created = self.ctx.put(
            &format!("{}/{name}", self.deployments_path(endpoint)),
            API,
            &deployment.translate_to_rest_object(location)?,
        )?;
        log::info!("Created deployment {name} under {endpoint}");
        Ok(created)
    }

    /// Authentication keys of a key-auth endpoint.
    pub fn get_keys(&self, name: &str) -> Result<EndpointAuthKeys, Error> {
        let keys = self
            .ctx
            .post(&format!("{}/listKeys", self.path(name)), API)?;
        Ok(serde_json::from_value(keys)?)
    }

    /// Deletes the endpoint; the service removes its deployments with it.
    pub fn delete(&self, name: &str) -> Result<(), Error> {
        self.ctx.delete(&self.path(name), API)?;
        log::info!("Deleted online endpoint {name}");
        Ok(())
    }

    /// Region set on the client. Without one the service places the
    /// resource in the workspace region.
    fn default_location(&self) -> Option<String> {
        self.ctx.location().map(str::to_string)
    }
}
