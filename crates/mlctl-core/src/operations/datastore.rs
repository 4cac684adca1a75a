use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;
use mlctl_client::schemas::{ArmResource, AssetPath, DatastoreProperties};
use mlctl_client::storage::{StorageCredential, StorageTarget, UploadError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use super::ServiceContext;
use crate::arm_id::{AssetKind, datastore_id};
use crate::error::Error;

const INCLUDE_SECRET: [(&str, &str); 1] = [("includeSecret", "true")];
const DEFAULT_ONLY: [(&str, &str); 1] = [("isDefault", "true")];

/// A storage container registered with the workspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datastore {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub storage_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Only filled when secrets were requested.
    #[serde(skip)]
    pub credential: StorageCredential,
}

impl Datastore {
    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<DatastoreProperties>()?;
        let properties = resource.properties;
        let storage = properties.contents.azure_storage;

        let credential = storage
            .as_ref()
            .and_then(|s| s.credentials.as_ref())
            .and_then(|c| {
                let key = c.account_key.as_ref().and_then(|k| k.key.clone());
                let sas = c.sas.as_ref().and_then(|s| s.sas_token.clone());
                key.map(StorageCredential::AccountKey)
                    .or(sas.map(StorageCredential::Sas))
            })
            .unwrap_or(StorageCredential::None);

        Ok(Self {
            name: resource.name.unwrap_or_default(),
            id: resource.id,
            storage_type: properties.contents.contents_type,
            account_name: storage.as_ref().map(|s| s.account_name.clone()),
            container_name: storage.as_ref().map(|s| s.container_name.clone()),
            endpoint: storage.as_ref().and_then(|s| s.endpoint.clone()),
            protocol: storage.as_ref().and_then(|s| s.protocol.clone()),
            is_default: properties.is_default,
            description: properties.description,
            tags: properties.tags,
            credential,
        })
    }

    /// Where uploads to this datastore land.
    pub fn storage_target(&self) -> Result<StorageTarget, UploadError> {
        let (Some(account), Some(container)) = (&self.account_name, &self.container_name) else {
            return Err(UploadError::UnsupportedStorage(self.storage_type.clone()));
        };
        StorageTarget::new(
            &self.storage_type,
            account,
            container,
            self.credential.clone(),
        )
    }
}

pub struct DatastoreOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> DatastoreOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, name: &str, include_secrets: bool) -> Result<Datastore, Error> {
        let query: &[(&str, &str)] = if include_secrets { &INCLUDE_SECRET } else { &[] };
        let resource = self.ctx.get(
            &self.ctx.resource_path(AssetKind::Datastore, name),
            API_VERSION_2020_09_01_PREVIEW,
            query,
            AssetKind::Datastore.label(),
            name,
        )?;
        Datastore::from_rest(resource)
    }

    pub fn list(&self) -> Result<Vec<Datastore>, Error> {
        self.ctx
            .list(
                &self.ctx.collection(AssetKind::Datastore),
                API_VERSION_2020_09_01_PREVIEW,
                &[],
            )?
            .into_iter()
            .map(Datastore::from_rest)
            .collect()
    }

    pub fn get_default(&self) -> Result<Datastore, Error> {
        self.ctx
            .list(
                &self.ctx.collection(AssetKind::Datastore),
                API_VERSION_2020_09_01_PREVIEW,
                &DEFAULT_ONLY,
            )?
            .into_iter()
            .next()
            .map(Datastore::from_rest)
            .unwrap_or_else(|| {
                Err(Error::not_found(
                    "default datastore",
                    &self.ctx.scope().workspace_name,
                ))
            })
    }

    /// Uploads local content into `datastore`, or the workspace default.
    ///
    /// Returns the asset path inside the datastore and the datastore id.
    pub(crate) fn upload(
        &self,
        source: &Path,
        datastore: Option<&str>,
    ) -> Result<(AssetPath, String), Error> {
        if !source.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot find local content at {}", source.display()),
            )));
        }
        let name = match datastore {
            Some(name) => name.to_string(),
            None => self.get_default()?.name,
        };
        let target = self.get(&name, true)?.storage_target()?;

        let locator = self.ctx.uploader().upload(&target, source)?;
        if locator.reused {
            log::info!("Content of {} already uploaded to {}", source.display(), locator.path);
        } else {
            log::info!("Uploaded {} to {}", source.display(), locator.path);
        }

        Ok((
            AssetPath {
                path: locator.path,
                is_directory: locator.is_directory,
            },
            datastore_id(self.ctx.scope(), &name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::{RecordingTransport, datastore_resource, service_context};
    use serde_json::json;

    #[test]
    fn account_key_wins_over_sas() {
        let mut resource = datastore_resource("workspaceblobstore", true);
        resource["properties"]["contents"]["azureStorage"]["credentials"] = json!({
            "accountKey": {"key": "k"},
            "sas": {"sasToken": "s"}
        });
        let datastore = Datastore::from_rest(serde_json::from_value(resource).unwrap()).unwrap();
        assert_eq!(datastore.credential, StorageCredential::AccountKey("k".into()));

        let target = datastore.storage_target().unwrap();
        assert_eq!(target.container_name, "azureml-blobstore");
    }

    #[test]
    fn unsupported_storage_is_rejected_for_uploads() {
        let mut resource = datastore_resource("files", false);
        resource["properties"]["contents"]["type"] = json!("AzureFile");
        let datastore = Datastore::from_rest(serde_json::from_value(resource).unwrap()).unwrap();
        assert!(matches!(
            datastore.storage_target(),
            Err(UploadError::UnsupportedStorage(kind)) if kind == "AzureFile"
        ));
    }

    #[test]
    fn default_datastore_is_queried_by_flag() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        transport.seed(
            &format!("{}/other", ctx.collection(AssetKind::Datastore)),
            datastore_resource("other", false),
        );
        transport.seed(
            &format!("{}/workspaceblobstore", ctx.collection(AssetKind::Datastore)),
            datastore_resource("workspaceblobstore", true),
        );

        let default = DatastoreOperations::new(&ctx).get_default().unwrap();
        assert_eq!(default.name, "workspaceblobstore");
        assert_eq!(transport.calls()[0].query, vec![("isDefault".into(), "true".into())]);
    }

    #[test]
    fn missing_default_datastore_is_not_found() {
        let (ctx, _) = service_context(RecordingTransport::new());
        let err = DatastoreOperations::new(&ctx).get_default().unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
