use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;
use mlctl_client::storage::ARTIFACT_ROOT;

use super::datastore::DatastoreOperations;
use super::{DEFAULT_VERSION, ServiceContext, same_path};
use crate::arm_id::AssetKind;
use crate::entities::CodeAsset;
use crate::error::Error;

const KIND: AssetKind = AssetKind::Code;

pub struct CodeOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> CodeOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, name: &str, version: &str) -> Result<CodeAsset, Error> {
        let resource = self.ctx.get(
            &self.ctx.version_path(KIND, name, version),
            API_VERSION_2020_09_01_PREVIEW,
            &[],
            KIND.label(),
            &format!("{name}:{version}"),
        )?;
        CodeAsset::from_rest(resource)
    }

    pub fn list(&self, name: &str) -> Result<Vec<CodeAsset>, Error> {
        self.ctx
            .list(
                &self.ctx.versions_path(KIND, name),
                API_VERSION_2020_09_01_PREVIEW,
                &[],
            )?
            .into_iter()
            .map(CodeAsset::from_rest)
            .collect()
    }

    /// Uploads the local content and registers it as a code version.
    ///
    /// Registration is idempotent: when the version already exists with the
    /// same content the existing asset is returned, and when it points at
    /// other content the call fails with [`Error::AssetChanged`]. An asset
    /// without a name is named after its content, so the same directory maps
    /// to the same asset on every submission.
    pub fn create_or_update(&self, asset: &mut CodeAsset) -> Result<CodeAsset, Error> {
        if asset.asset_path.is_none() {
            let local = asset.local_path().ok_or(Error::MissingRequiredField {
                entity: "code",
                field: "directory",
            })?;
            let (asset_path, datastore_id) = DatastoreOperations::new(self.ctx)
                .upload(&local, asset.datastore.as_deref())?;
            asset.asset_path = Some(asset_path);
            asset.datastore_id = Some(datastore_id);
        }
        if asset.name.is_none() {
            asset.name = asset.asset_path.as_ref().map(|p| content_name(&p.path));
        }
        let version = asset
            .version
            .get_or_insert_with(|| DEFAULT_VERSION.to_string())
            .clone();
        let name = asset.name.clone().ok_or(Error::MissingRequiredField {
            entity: "code",
            field: "name",
        })?;

        match self.get(&name, &version) {
            Ok(existing) if same_path(&existing.asset_path, &asset.asset_path) => {
                log::info!("Code {name}:{version} is already registered with this content");
                return Ok(existing);
            }
            Ok(_) => {
                return Err(Error::AssetChanged {
                    kind: "code",
                    name,
                    version,
                });
            }
            Err(Error::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        self.ctx.put(
            &self.ctx.resource_path(KIND, &name),
            API_VERSION_2020_09_01_PREVIEW,
            &asset.translate_container(),
        )?;
        let created = self.ctx.put(
            &self.ctx.version_path(KIND, &name, &version),
            API_VERSION_2020_09_01_PREVIEW,
            &asset.translate_to_rest_object()?,
        )?;
        log::info!("Registered code {name}:{version}");
        CodeAsset::from_rest(created)
    }
}

/// Content id segment of `az-ml-artifacts/{content-id}/{name}`, or a fresh
/// GUID when the path does not have that shape.
fn content_name(asset_path: &str) -> String {
    asset_path
        .strip_prefix(ARTIFACT_ROOT)
        .and_then(|rest| rest.trim_start_matches('/').split('/').next())
        .and_then(|segment| uuid::Uuid::parse_str(segment).ok())
        .unwrap_or_else(uuid::Uuid::new_v4)
        .to_string()
}
