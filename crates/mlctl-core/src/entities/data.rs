use mlctl_client::schemas::{ArmResource, AssetPath, DataVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::rest_identity;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::schema::{LoadContext, Schema, deserialize_version};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSchema {
    pub name: String,
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
    /// Path already present in the datastore; nothing is uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Where the data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    File(PathBuf),
    Directory(PathBuf),
    Uploaded(AssetPath),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub datastore: Option<String>,
    pub source: DataSource,
    pub base_path: PathBuf,
    pub datastore_id: Option<String>,
    pub id: Option<String>,
}

impl Data {
    /// Local content still to be uploaded.
    pub fn local_path(&self) -> Option<PathBuf> {
        match &self.source {
            DataSource::File(path) | DataSource::Directory(path) => {
                Some(self.base_path.join(path))
            }
            DataSource::Uploaded(_) => None,
        }
    }

    pub fn translate_to_rest_object(&self) -> Result<ArmResource<DataVersion>, Error> {
        let DataSource::Uploaded(asset_path) = &self.source else {
            return Err(Error::MissingRequiredField {
                entity: "data",
                field: "path",
            });
        };

        Ok(ArmResource::new(DataVersion {
            dataset_type: DataVersion::SIMPLE.to_string(),
            asset_path: asset_path.clone(),
            datastore_id: self.datastore_id.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
        }))
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<DataVersion>()?;
        let (name, version) = rest_identity(&resource);
        let properties = resource.properties;

        Ok(Self {
            name: name.unwrap_or_default(),
            version,
            description: properties.description,
            tags: properties.tags,
            datastore: None,
            source: DataSource::Uploaded(properties.asset_path),
            base_path: PathBuf::new(),
            datastore_id: properties.datastore_id,
            id: resource.id,
        })
    }
}

impl Schema for Data {
    type Document = DataSchema;

    fn from_document(doc: DataSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        let source = match (doc.file, doc.directory, doc.path) {
            (Some(file), None, None) => DataSource::File(PathBuf::from(file)),
            (None, Some(directory), None) => DataSource::Directory(PathBuf::from(directory)),
            (None, None, Some(path)) => DataSource::Uploaded(AssetPath {
                is_directory: path.ends_with('/'),
                path,
            }),
            (None, None, None) => {
                return Err(ValidationErrors::single(
                    "file",
                    "one of file, directory or path is required",
                ));
            }
            _ => {
                return Err(ValidationErrors::single(
                    "file",
                    "file, directory and path are mutually exclusive",
                ));
            }
        };

        Ok(Self {
            name: doc.name,
            version: doc.version,
            description: doc.description,
            tags: doc.tags,
            datastore: doc.datastore,
            source,
            base_path: ctx.base_path.clone(),
            datastore_id: None,
            id: None,
        })
    }

    fn to_document(&self) -> Result<DataSchema, ValidationErrors> {
        let (file, directory, path) = match &self.source {
            DataSource::File(p) => (Some(p.display().to_string()), None, None),
            DataSource::Directory(p) => (None, Some(p.display().to_string()), None),
            DataSource::Uploaded(asset) => (None, None, Some(asset.path.clone())),
        };
        Ok(DataSchema {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            datastore: self.datastore.clone(),
            file,
            directory,
            path,
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        if self.name.trim().is_empty() {
            vec![ValidationError::new("name", "must not be empty")]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::load_str;

    fn ctx() -> LoadContext {
        LoadContext::new("/data")
    }

    #[test]
    fn sources_are_exclusive() {
        let err = load_str::<Data>("name: d\nfile: a.csv\npath: x/\n", &ctx()).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
        assert!(load_str::<Data>("name: d\n", &ctx()).is_err());
    }

    #[test]
    fn uploaded_path_translates_to_simple_dataset() {
        let data = load_str::<Data>("name: d\nversion: 1\npath: raw/iris/\n", &ctx()).unwrap();
        assert_eq!(data.local_path(), None);

        let rest = data.translate_to_rest_object().unwrap();
        assert_eq!(rest.properties.dataset_type, "simple");
        assert_eq!(rest.properties.asset_path.path, "raw/iris/");
        assert!(rest.properties.asset_path.is_directory);
    }

    #[test]
    fn local_data_must_be_uploaded_first() {
        let data = load_str::<Data>("name: d\ndirectory: iris\n", &ctx()).unwrap();
        assert_eq!(data.local_path(), Some(PathBuf::from("/data/iris")));
        assert!(matches!(
            data.translate_to_rest_object(),
            Err(Error::MissingRequiredField { entity: "data", .. })
        ));
    }
}
