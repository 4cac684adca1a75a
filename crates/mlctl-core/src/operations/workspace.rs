use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;
use mlctl_client::schemas::{ArmResource, ResourceIdentity, WorkspaceProperties};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::ServiceContext;
use super::lro::PollStatus;
use crate::arm_id::RESOURCE_PROVIDER;
use crate::entities::endpoint::TERMINAL_PROVISIONING_STATES;
use crate::error::Error;

const API: &str = API_VERSION_2020_09_01_PREVIEW;
const SUCCEEDED: &str = "Succeeded";

/// A workspace as the CLI shows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Workspace {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(flatten)]
    pub properties: WorkspaceProperties,
}

impl Workspace {
    pub fn new(name: impl Into<String>, location: Option<String>) -> Self {
        Self {
            name: name.into(),
            location,
            ..Default::default()
        }
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<WorkspaceProperties>()?;
        Ok(Self {
            name: resource.name.unwrap_or_default(),
            id: resource.id,
            location: resource.location,
            tags: resource.tags,
            properties: resource.properties,
        })
    }

    fn translate_to_rest_object(&self) -> ArmResource<WorkspaceProperties> {
        let properties = WorkspaceProperties {
            provisioning_state: None,
            discovery_url: None,
            ..self.properties.clone()
        };
        ArmResource::new(properties)
            .with_name(self.name.clone())
            .with_tags(self.tags.clone())
            .with_location(self.location.clone())
            .with_identity(ResourceIdentity {
                identity_type: "SystemAssigned".to_string(),
            })
    }
}

/// Fault carried by a resource whose provisioning did not succeed.
fn provisioning_fault(resource: &ArmResource<Value>, state: &str) -> Error {
    let error = &resource.properties["error"];
    let code = error["code"].as_str().unwrap_or(state);
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "workspace {} ended in state {state}",
                resource.name.as_deref().unwrap_or_default()
            )
        });
    Error::RemoteOperation {
        status: code.to_string(),
        message,
    }
}

fn provisioning_state(resource: &ArmResource<Value>) -> Option<&str> {
    resource.properties["provisioningState"].as_str()
}

pub struct WorkspaceOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> WorkspaceOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn collection(&self) -> String {
        format!(
            "{}/providers/{RESOURCE_PROVIDER}/workspaces",
            self.ctx.scope().resource_group_path()
        )
    }

    fn path(&self, name: &str) -> String {
        format!("{}/{name}", self.collection())
    }

    fn fetch(&self, name: &str) -> Result<ArmResource<Value>, Error> {
        self.ctx.get(&self.path(name), API, &[], "workspace", name)
    }

    pub fn get(&self, name: &str) -> Result<Workspace, Error> {
        Workspace::from_rest(self.fetch(name)?)
    }

    /// Workspaces of the client's resource group.
    pub fn list(&self) -> Result<Vec<Workspace>, Error> {
        self.ctx
            .list(&self.collection(), API, &[])?
            .into_iter()
            .map(Workspace::from_rest)
            .collect()
    }

    /// PUTs the workspace and waits for provisioning to finish.
    ///
    /// A missing provisioning state counts as done. Any terminal state other
    /// than `Succeeded` is a [`Error::RemoteOperation`].
    pub fn create_or_update(&self, workspace: &Workspace) -> Result<Workspace, Error> {
        let name = &workspace.name;
        self.ctx
            .put(&self.path(name), API, &workspace.translate_to_rest_object())?;
        log::info!("Provisioning workspace {name}");

        let resource = self
            .ctx
            .poller()
            .poll(&format!("workspace {name}"), || {
                let resource = self.fetch(name)?;
                match provisioning_state(&resource) {
                    None | Some(SUCCEEDED) => Ok(PollStatus::Done(resource)),
                    Some(state) if TERMINAL_PROVISIONING_STATES.contains(&state) => {
                        Err(provisioning_fault(&resource, state))
                    }
                    Some(state) => {
                        log::debug!("Workspace {name} is {state}");
                        Ok(PollStatus::Pending)
                    }
                }
            })?;
        Workspace::from_rest(resource)
    }

    /// Deletes the workspace and waits until the service no longer knows it.
    pub fn delete(&self, name: &str) -> Result<(), Error> {
        self.ctx.delete(&self.path(name), API)?;
        self.ctx.poller().poll(&format!("deletion of {name}"), || {
            let resource = match self.fetch(name) {
                Ok(resource) => resource,
                Err(Error::NotFound { .. }) => return Ok(PollStatus::Done(())),
                Err(e) => return Err(e),
            };
            match provisioning_state(&resource) {
                Some(SUCCEEDED) | None => Ok(PollStatus::Pending),
                Some(state) if TERMINAL_PROVISIONING_STATES.contains(&state) => {
                    Err(provisioning_fault(&resource, state))
                }
                Some(_) => Ok(PollStatus::Pending),
            }
        })?;
        log::info!("Deleted workspace {name}");
        Ok(())
    }
}
