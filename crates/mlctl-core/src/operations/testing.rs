//! In-memory collaborators for façade tests.
//!
//! [`RecordingTransport`] keeps every PUT body keyed by its path and answers
//! later GET and list calls from that store, so a test reads like a short
//! conversation with the service. Scripted responses take precedence when a
//! test needs a specific answer (a provisioning state, an error).

use mlctl_client::storage::digest::{collect_files, content_hash, content_id};
use mlctl_client::storage::{ArtifactUploader, AssetLocator, StorageTarget, UploadError};
use mlctl_client::{ClientError, Transport};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ServiceContext;
use super::lro::{CancellationToken, Poller};
use crate::config::WorkspaceScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    List,
    Put,
    Post,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub api_version: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    store: Vec<(String, Value)>,
    scripted: Vec<(Method, String, VecDeque<Result<Value, ClientError>>)>,
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<State>>,
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `resource` at `path` as if it had been created earlier.
    pub fn seed(&self, path: &str, mut resource: Value) {
        resource["id"] = json!(path);
        if resource.get("name").is_none() {
            resource["name"] = json!(last_segment(path));
        }
        let mut state = self.state.lock().unwrap();
        state.store.retain(|(stored, _)| stored != path);
        state.store.push((path.to_string(), resource));
    }

    /// Queues answers for `method` on `path`, used before the store.
    pub fn script(&self, method: Method, path: &str, responses: Vec<Result<Value, ClientError>>) {
        self.state.lock().unwrap().scripted.push((
            method,
            path.to_string(),
            responses.into_iter().collect(),
        ));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    pub fn stored(&self, path: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .store
            .iter()
            .find(|(stored, _)| stored == path)
            .map(|(_, value)| value.clone())
    }

    fn record(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Option<Result<Value, ClientError>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            method,
            path: path.to_string(),
            api_version: api_version.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.cloned(),
        });
        state
            .scripted
            .iter_mut()
            .find(|(m, p, queue)| *m == method && p == path && !queue.is_empty())
            .and_then(|(_, _, queue)| queue.pop_front())
    }
}

impl Transport for RecordingTransport {
    fn get(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ClientError> {
        if let Some(response) = self.record(Method::Get, path, api_version, query, None) {
            return response;
        }
        self.stored(path).ok_or(ClientError::NotFound)
    }

    fn list(
        &self,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<Value>, ClientError> {
        if let Some(response) = self.record(Method::List, path, api_version, query, None) {
            return response.map(|value| match value {
                Value::Array(items) => items,
                other => vec![other],
            });
        }

        let state = self.state.lock().unwrap();
        let mut items: Vec<Value> = state
            .store
            .iter()
            .filter(|(stored, _)| parent(stored) == path)
            .map(|(_, value)| value.clone())
            .collect();
        for (key, value) in query {
            match *key {
                "isDefault" => items.retain(|item| {
                    item["properties"]["isDefault"].as_bool().unwrap_or(false) == (*value == "true")
                }),
                "$orderBy" => items.reverse(),
                "$top" => items.truncate(value.parse().unwrap_or(usize::MAX)),
                _ => {}
            }
        }
        Ok(items)
    }

    fn put(&self, path: &str, api_version: &str, body: &Value) -> Result<Value, ClientError> {
        if let Some(response) = self.record(Method::Put, path, api_version, &[], Some(body)) {
            return response;
        }
        self.seed(path, body.clone());
        self.stored(path).ok_or(ClientError::NotFound)
    }

    fn post(
        &self,
        path: &str,
        api_version: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        self.record(Method::Post, path, api_version, &[], body)
            .unwrap_or(Ok(Value::Null))
    }

    fn delete(&self, path: &str, api_version: &str) -> Result<(), ClientError> {
        if let Some(response) = self.record(Method::Delete, path, api_version, &[], None) {
            return response.map(|_| ());
        }
        self.state
            .lock()
            .unwrap()
            .store
            .retain(|(stored, _)| !stored.starts_with(path));
        Ok(())
    }
}

/// Computes the real content-addressed locator without any network.
#[derive(Clone, Default)]
pub struct RecordingUploader {
    uploads: Arc<Mutex<Vec<(StorageTarget, PathBuf)>>>,
}

impl RecordingUploader {
    pub fn uploads(&self) -> Vec<(StorageTarget, PathBuf)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl ArtifactUploader for RecordingUploader {
    fn upload(&self, target: &StorageTarget, source: &Path) -> Result<AssetLocator, UploadError> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::InvalidSource(source.display().to_string()))?;
        let id = content_id(&content_hash(&collect_files(source)?)?);
        self.uploads
            .lock()
            .unwrap()
            .push((target.clone(), source.to_path_buf()));
        Ok(AssetLocator::for_content(&id, &name, source.is_dir()))
    }
}

pub fn scope() -> WorkspaceScope {
    WorkspaceScope::new("sub".into(), "rg".into(), "ws".into())
}

pub fn service_context(transport: RecordingTransport) -> (ServiceContext, RecordingUploader) {
    let uploader = RecordingUploader::default();
    let mut ctx = ServiceContext::new(scope(), Arc::new(transport), Arc::new(uploader.clone()));
    ctx.poller = Poller::new(Duration::ZERO, CancellationToken::new());
    (ctx, uploader)
}

pub fn datastore_resource(name: &str, is_default: bool) -> Value {
    json!({
        "name": name,
        "properties": {
            "contents": {
                "type": "AzureBlob",
                "azureStorage": {
                    "accountName": "mlstorage",
                    "containerName": "azureml-blobstore",
                    "credentials": {"sas": {"sasToken": "sv=2020&sig=abc"}}
                }
            },
            "isDefault": is_default
        }
    })
}

/// Seeds the workspace default datastore.
pub fn with_default_datastore(transport: &RecordingTransport) {
    transport.seed(
        &format!("{}/datastores/workspaceblobstore", scope().workspace_path()),
        datastore_resource("workspaceblobstore", true),
    );
}
