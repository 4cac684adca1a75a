use mlctl_client::schemas::{ArmResource, AssetPath, CodeContainer, CodeVersion};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::rest_identity;
use crate::arm_id::{ARM_ID_PREFIX, AssetKind};
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::reference::Reference;
use crate::schema::{Dialect, LoadContext, RefOrInline, Schema, deserialize_version};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeAssetSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Source code uploaded alongside a job or deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAsset {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub datastore: Option<String>,
    pub file: Option<PathBuf>,
    pub directory: Option<PathBuf>,
    /// Directory `file` and `directory` are relative to.
    pub base_path: PathBuf,
    /// Where the content lives once uploaded.
    pub asset_path: Option<AssetPath>,
    pub datastore_id: Option<String>,
    pub id: Option<String>,
}

impl CodeAsset {
    /// Inline asset for a bare local path; the kind is decided by what is on disk.
    pub fn from_local_path(path: impl Into<PathBuf>, base_path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base_path = base_path.into();
        let is_file = base_path.join(&path).is_file();
        Self {
            name: None,
            version: None,
            description: None,
            tags: BTreeMap::new(),
            datastore: None,
            file: is_file.then(|| path.clone()),
            directory: (!is_file).then_some(path),
            base_path,
            asset_path: None,
            datastore_id: None,
            id: None,
        }
    }

    /// Absolute location of the local content, if any.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.file
            .as_ref()
            .or(self.directory.as_ref())
            .map(|p| self.base_path.join(p))
    }

    pub fn translate_container(&self) -> ArmResource<CodeContainer> {
        ArmResource::new(CodeContainer {
            description: self.description.clone(),
            tags: self.tags.clone(),
        })
    }

    pub fn translate_to_rest_object(&self) -> Result<ArmResource<CodeVersion>, Error> {
        let asset_path = self.asset_path.clone().ok_or(Error::MissingRequiredField {
            entity: "code",
            field: "asset_path",
        })?;
        Ok(ArmResource::new(CodeVersion {
            asset_path,
            datastore_id: self.datastore_id.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
        }))
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<CodeVersion>()?;
        let (name, version) = rest_identity(&resource);
        let properties = resource.properties;
        let remote = PathBuf::from(&properties.asset_path.path);

        Ok(Self {
            name,
            version,
            description: properties.description,
            tags: properties.tags,
            datastore: None,
            file: (!properties.asset_path.is_directory).then(|| remote.clone()),
            directory: properties.asset_path.is_directory.then_some(remote),
            base_path: PathBuf::new(),
            asset_path: Some(properties.asset_path),
            datastore_id: properties.datastore_id,
            id: resource.id,
        })
    }
}

/// `code:` field of jobs and deployments: a reference, an inline asset or a
/// bare local path.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeField {
    Asset(RefOrInline<CodeAssetSchema>),
    LocalPath(String),
}

impl CodeField {
    pub fn decode(
        self,
        ctx: &LoadContext,
        field: &str,
    ) -> Result<Reference<CodeAsset>, ValidationErrors> {
        match self {
            CodeField::LocalPath(path) => Ok(Reference::Inline(CodeAsset::from_local_path(
                path,
                ctx.base_path.clone(),
            ))),
            CodeField::Asset(asset) => asset.decode(ctx, field, AssetKind::Code, true),
        }
    }

    pub fn from_reference(reference: &Reference<CodeAsset>) -> Result<Self, ValidationErrors> {
        if let Reference::Inline(asset) = reference {
            let local = asset.file.as_ref().or(asset.directory.as_ref());
            if let (None, None, Some(path)) = (&asset.name, &asset.description, local) {
                return Ok(CodeField::LocalPath(path.display().to_string()));
            }
        }
        RefOrInline::from_reference(reference, Schema::to_document).map(CodeField::Asset)
    }
}

impl<'de> Deserialize<'de> for CodeField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        if let serde_yaml::Value::String(text) = &value {
            if !text.starts_with(ARM_ID_PREFIX) && !text.starts_with("file:") {
                return Ok(CodeField::LocalPath(text.clone()));
            }
        }
        RefOrInline::deserialize(value)
            .map(CodeField::Asset)
            .map_err(D::Error::custom)
    }
}

impl Serialize for CodeField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CodeField::LocalPath(path) => serializer.serialize_str(path),
            CodeField::Asset(asset) => asset.serialize(serializer),
        }
    }
}

fn exclusivity_errors(file: Option<&Path>, directory: Option<&Path>) -> Vec<ValidationError> {
    match (file, directory) {
        (Some(_), Some(_)) => vec![ValidationError::new(
            "file",
            "file and directory are mutually exclusive",
        )],
        (None, None) => vec![ValidationError::new(
            "directory",
            "one of file or directory is required",
        )],
        _ => Vec::new(),
    }
}

impl Schema for CodeAsset {
    type Document = CodeAssetSchema;

    fn from_document(doc: CodeAssetSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        if let (Dialect::V2, Some(name)) = (ctx.options.dialect, doc.name.as_deref()) {
            if uuid::Uuid::parse_str(name).is_err() {
                return Err(ValidationErrors::single(
                    "name",
                    format!("code asset names must be GUIDs, got {name}"),
                ));
            }
        }

        Ok(Self {
            name: doc.name,
            version: doc.version,
            description: doc.description,
            tags: doc.tags,
            datastore: doc.datastore,
            file: doc.file.map(PathBuf::from),
            directory: doc.directory.map(PathBuf::from),
            base_path: ctx.base_path.clone(),
            asset_path: None,
            datastore_id: None,
            id: None,
        })
    }

    fn to_document(&self) -> Result<CodeAssetSchema, ValidationErrors> {
        ValidationErrors::from(exclusivity_errors(
            self.file.as_deref(),
            self.directory.as_deref(),
        ))
        .into_result()?;

        Ok(CodeAssetSchema {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            datastore: self.datastore.clone(),
            file: self.file.as_ref().map(|p| p.display().to_string()),
            directory: self.directory.as_ref().map(|p| p.display().to_string()),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        exclusivity_errors(self.file.as_deref(), self.directory.as_deref())
    }
}
