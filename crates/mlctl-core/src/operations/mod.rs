//! Resource operations reachable from [`MlClient`].
//!
//! Every façade borrows the same [`ServiceContext`], which carries the
//! transport and storage collaborators along with the workspace scope. The
//! façades never talk to each other through globals: cross-resource work goes
//! through [`crate::orchestrator::OperationOrchestrator`].

mod batch_endpoint;
mod code;
mod compute;
mod data;
mod datastore;
mod endpoint;
mod environment;
mod job;
pub mod lro;
mod model;
mod workspace;

#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use batch_endpoint::BatchEndpointOperations;
pub use code::CodeOperations;
pub use compute::{Compute, ComputeOperations};
pub use data::DataOperations;
pub use datastore::{Datastore, DatastoreOperations};
pub use endpoint::EndpointOperations;
pub use environment::EnvironmentOperations;
pub use job::JobOperations;
pub use model::ModelOperations;
pub use workspace::{Workspace, WorkspaceOperations};

use mlctl_client::schemas::{ArmResource, AssetPath};
use mlctl_client::storage::{ArtifactUploader, BlobStorageClient};
use mlctl_client::{Client, Transport};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::arm_id::{ArmId, AssetKind, collection_path};
use crate::config::{MlClientConfig, WorkspaceScope};
use crate::error::Error;
use crate::schema::{LoadContext, SchemaOptions};
use lro::{CancellationToken, Poller};

/// Query selecting the most recently created version of an asset.
pub(crate) const LATEST_VERSION_QUERY: [(&str, &str); 2] =
    [("$orderBy", "createdtime desc"), ("$top", "1")];

/// Version given to new assets that do not name one.
pub(crate) const DEFAULT_VERSION: &str = "1";

/// Whether two registrations point at the same uploaded content.
pub(crate) fn same_path(a: &Option<AssetPath>, b: &Option<AssetPath>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.path == b.path,
        _ => false,
    }
}

/// Collaborators and scope shared by every façade.
#[derive(Clone)]
pub struct ServiceContext {
    transport: Arc<dyn Transport>,
    uploader: Arc<dyn ArtifactUploader>,
    scope: WorkspaceScope,
    options: SchemaOptions,
    poller: Poller,
    location: Option<String>,
}

impl ServiceContext {
    pub fn new(
        scope: WorkspaceScope,
        transport: Arc<dyn Transport>,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> Self {
        Self {
            transport,
            uploader,
            scope,
            options: SchemaOptions::default(),
            poller: Poller::default(),
            location: None,
        }
    }

    pub fn scope(&self) -> &WorkspaceScope {
        &self.scope
    }

    pub fn options(&self) -> SchemaOptions {
        self.options
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    /// Configured region for resources that carry one, if any.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub(crate) fn uploader(&self) -> &dyn ArtifactUploader {
        self.uploader.as_ref()
    }

    /// Load context for documents submitted through this client.
    pub fn load_context(&self, base_path: impl Into<PathBuf>) -> LoadContext {
        LoadContext::new(base_path)
            .with_workspace(self.scope.clone())
            .with_options(self.options)
    }

    pub(crate) fn collection(&self, kind: AssetKind) -> String {
        collection_path(&self.scope, kind)
    }

    pub(crate) fn resource_path(&self, kind: AssetKind, name: &str) -> String {
        ArmId::new(&self.scope, kind, name).to_string()
    }

    pub(crate) fn version_path(&self, kind: AssetKind, name: &str, version: &str) -> String {
        ArmId::new(&self.scope, kind, name)
            .with_version(version)
            .to_string()
    }

    pub(crate) fn versions_path(&self, kind: AssetKind, name: &str) -> String {
        format!("{}/versions", ArmId::new(&self.scope, kind, name).container_path())
    }

    /// GET a single resource, mapping a 404 to [`Error::NotFound`].
    pub(crate) fn get(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
        kind: &str,
        name: &str,
    ) -> Result<ArmResource<Value>, Error> {
        let value = self
            .transport
            .get(path, api_version, query)
            .map_err(|e| Error::from_lookup(e, kind, name))?;
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) fn list(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<ArmResource<Value>>, Error> {
        self.transport
            .list(path, api_version, query)?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Error::from))
            .collect()
    }

    pub(crate) fn put<P: Serialize>(
        &self,
        path: &str,
        api_version: &str,
        resource: &ArmResource<P>,
    ) -> Result<ArmResource<Value>, Error> {
        let body = resource.to_value()?;
        let value = self.transport.put(path, api_version, &body)?;
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) fn post(&self, path: &str, api_version: &str) -> Result<Value, Error> {
        Ok(self.transport.post(path, api_version, None)?)
    }

    pub(crate) fn delete(&self, path: &str, api_version: &str) -> Result<(), Error> {
        Ok(self.transport.delete(path, api_version)?)
    }

    /// Most recent version under `versions_path`.
    pub(crate) fn latest(
        &self,
        versions_path: &str,
        api_version: &str,
        kind: &str,
        name: &str,
    ) -> Result<ArmResource<Value>, Error> {
        self.list(versions_path, api_version, &LATEST_VERSION_QUERY)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(kind, name))
    }
}

/// Entry point of the SDK.
///
/// ```no_run
/// use mlctl_core::{MlClient, MlClientConfig, WorkspaceScope};
///
/// let scope = WorkspaceScope::from_env()?;
/// let client = MlClient::from_config(MlClientConfig::builder(scope).build()?);
/// for job in client.jobs().list()? {
///     println!("{:?} {:?}", job.name(), job.status());
/// }
/// # Ok::<(), mlctl_core::Error>(())
/// ```
#[derive(Clone)]
pub struct MlClient {
    context: ServiceContext,
}

impl MlClient {
    /// Builds the client over the HTTP transport and blob uploader.
    pub fn from_config(config: MlClientConfig) -> Self {
        let transport = Client::new(config.endpoint, config.credentials.clone());
        let uploader = BlobStorageClient::new(Some(config.credentials));
        let mut context = ServiceContext::new(config.scope, Arc::new(transport), Arc::new(uploader));
        context.options = config.options;
        context.location = config.location;
        context.poller = Poller::new(config.poll_interval, CancellationToken::new());
        Self { context }
    }

    /// Builds the client over caller-supplied collaborators.
    pub fn with_collaborators(
        scope: WorkspaceScope,
        transport: Arc<dyn Transport>,
        uploader: Arc<dyn ArtifactUploader>,
    ) -> Self {
        Self {
            context: ServiceContext::new(scope, transport, uploader),
        }
    }

    pub fn with_options(mut self, options: SchemaOptions) -> Self {
        self.context.options = options;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.context.location = Some(location.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        let token = self.cancellation_token();
        self.context.poller = Poller::new(interval, token);
        self
    }

    /// Token checked by every wait; cancelling it interrupts the wait.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.context.poller = Poller::new(self.context.poller.interval(), token);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.poller.cancellation().clone()
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    pub fn load_context(&self, base_path: impl Into<PathBuf>) -> LoadContext {
        self.context.load_context(base_path)
    }

    pub fn codes(&self) -> CodeOperations<'_> {
        CodeOperations::new(&self.context)
    }

    pub fn environments(&self) -> EnvironmentOperations<'_> {
        EnvironmentOperations::new(&self.context)
    }

    pub fn models(&self) -> ModelOperations<'_> {
        ModelOperations::new(&self.context)
    }

    pub fn data(&self) -> DataOperations<'_> {
        DataOperations::new(&self.context)
    }

    pub fn datastores(&self) -> DatastoreOperations<'_> {
        DatastoreOperations::new(&self.context)
    }

    pub fn jobs(&self) -> JobOperations<'_> {
        JobOperations::new(&self.context)
    }

    pub fn online_endpoints(&self) -> EndpointOperations<'_> {
        EndpointOperations::new(&self.context)
    }

    pub fn batch_endpoints(&self) -> BatchEndpointOperations<'_> {
        BatchEndpointOperations::new(&self.context)
    }

    pub fn computes(&self) -> ComputeOperations<'_> {
        ComputeOperations::new(&self.context)
    }

    pub fn workspaces(&self) -> WorkspaceOperations<'_> {
        WorkspaceOperations::new(&self.context)
    }
}
