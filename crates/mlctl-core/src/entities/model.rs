use chrono::{DateTime, Utc};
use mlctl_client::schemas::{ArmResource, AssetPath, ModelContainer, ModelVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::environment::{Environment, EnvironmentSchema};
use super::{rest_identity, resolved_id};
use crate::arm_id::AssetKind;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::reference::Reference;
use crate::schema::{LoadContext, RefOrInline, Schema, deserialize_version};

/// Framework name to its property bag.
pub type Flavors = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSchema {
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
    /// Local file or directory, or a path already in the datastore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<RefOrInline<EnvironmentSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavors: Option<Flavors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub path: Option<PathBuf>,
    pub datastore: Option<String>,
    pub environment: Option<Reference<Environment>>,
    pub flavors: Option<Flavors>,
    pub input_example: Option<Value>,
    pub creation_time: Option<DateTime<Utc>>,
    pub base_path: PathBuf,
    pub asset_path: Option<AssetPath>,
    pub datastore_id: Option<String>,
    pub id: Option<String>,
}

/// Flattens flavors into `{"flavors": [names], "flavors.<name>": bag}`.
///
/// There is no inverse: the service hands the flat map back and the nested
/// structure is not rebuilt.
pub fn flatten_flavors(flavors: &Flavors) -> BTreeMap<String, Value> {
    let mut flat = BTreeMap::new();
    if flavors.is_empty() {
        return flat;
    }
    flat.insert(
        "flavors".to_string(),
        Value::Array(flavors.keys().cloned().map(Value::String).collect()),
    );
    for (name, bag) in flavors {
        let bag = bag
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<serde_json::Map<_, _>>();
        flat.insert(format!("flavors.{name}"), Value::Object(bag));
    }
    flat
}

impl Model {
    pub fn local_path(&self) -> Option<PathBuf> {
        self.path.as_ref().map(|p| self.base_path.join(p))
    }

    pub fn translate_container(&self) -> ArmResource<ModelContainer> {
        ArmResource::new(ModelContainer {
            description: self.description.clone(),
            tags: self.tags.clone(),
            latest_version: Vec::new(),
            properties: self.flavors.as_ref().map(flatten_flavors).unwrap_or_default(),
        })
    }

    pub fn translate_to_rest_object(&self) -> Result<ArmResource<ModelVersion>, Error> {
        let missing = |field| Error::MissingRequiredField {
            entity: "model",
            field,
        };
        self.name.as_ref().ok_or_else(|| missing("name"))?;
        self.version.as_ref().ok_or_else(|| missing("version"))?;
        let asset_path = self.asset_path.clone().ok_or_else(|| missing("asset_path"))?;
        let environment_id = self
            .environment
            .as_ref()
            .map(|env| resolved_id(env, "environment"))
            .transpose()?;

        Ok(ArmResource::new(ModelVersion {
            asset_path,
            datastore_id: self.datastore_id.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            environment_id,
            created_time: None,
            input_example: self.input_example.clone(),
        }))
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<ModelVersion>()?;
        let (name, version) = rest_identity(&resource);
        let properties = resource.properties;

        Ok(Self {
            name,
            version,
            description: properties.description,
            tags: properties.tags,
            path: Some(PathBuf::from(&properties.asset_path.path)),
            datastore: None,
            environment: properties.environment_id.map(Reference::Canonical),
            flavors: None,
            input_example: properties.input_example,
            creation_time: properties.created_time,
            base_path: PathBuf::new(),
            asset_path: Some(properties.asset_path),
            datastore_id: properties.datastore_id,
            id: resource.id,
        })
    }

    /// Container entry from an unfiltered listing; carries no version.
    pub fn from_container(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<ModelContainer>()?;
        let properties = resource.properties;

        Ok(Self {
            name: resource.name,
            version: properties.latest_version.last().cloned(),
            description: properties.description,
            tags: properties.tags,
            path: None,
            datastore: None,
            environment: None,
            flavors: None,
            input_example: None,
            creation_time: None,
            base_path: PathBuf::new(),
            asset_path: None,
            datastore_id: None,
            id: resource.id,
        })
    }
}

impl Schema for Model {
    type Document = ModelSchema;

    fn from_document(doc: ModelSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        let environment = doc
            .environment
            .map(|env| env.decode(ctx, "environment", AssetKind::Environment, false))
            .transpose()?;

        Ok(Self {
            name: doc.name,
            version: doc.version,
            description: doc.description,
            tags: doc.tags,
            path: doc.path.map(PathBuf::from),
            datastore: doc.datastore,
            environment,
            flavors: doc.flavors,
            input_example: doc.input_example,
            creation_time: doc.creation_time,
            base_path: ctx.base_path.clone(),
            asset_path: None,
            datastore_id: None,
            id: None,
        })
    }

    fn to_document(&self) -> Result<ModelSchema, ValidationErrors> {
        let environment = self
            .environment
            .as_ref()
            .map(|env| RefOrInline::from_reference(env, Schema::to_document))
            .transpose()?;

        Ok(ModelSchema {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            path: self.path.as_ref().map(|p| p.display().to_string()),
            datastore: self.datastore.clone(),
            environment,
            flavors: self.flavors.clone(),
            input_example: self.input_example.clone(),
            creation_time: self.creation_time,
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.path.is_none() {
            errors.push(ValidationError::new("path", "is required"));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{dump, load_str};
    use serde_json::json;

    fn load(yaml: &str) -> Model {
        load_str(yaml, &LoadContext::new("/work")).unwrap()
    }

    #[test]
    fn flavors_flatten_into_container_properties() {
        let model = load(
            "name: iris\nversion: 1\npath: model.pkl\nflavors:\n  sklearn:\n    sklearn_version: 0.23.2\n  python_function:\n    loader_module: mlflow.sklearn\n",
        );
        let container = model.translate_container();

        assert_eq!(
            container.properties.properties["flavors"],
            json!(["python_function", "sklearn"])
        );
        assert_eq!(
            container.properties.properties["flavors.sklearn"],
            json!({"sklearn_version": "0.23.2"})
        );
        assert_eq!(
            container.properties.properties["flavors.python_function"],
            json!({"loader_module": "mlflow.sklearn"})
        );
    }

    #[test]
    fn no_flavors_means_no_properties() {
        let model = load("name: iris\nversion: 1\npath: model.pkl\n");
        assert!(model.translate_container().properties.properties.is_empty());
    }

    #[test]
    fn required_fields_are_checked_at_translation() {
        let mut model = load("path: model.pkl\n");
        assert!(matches!(
            model.translate_to_rest_object(),
            Err(Error::MissingRequiredField { field: "name", .. })
        ));

        model.name = Some("iris".into());
        model.version = Some("1".into());
        assert!(matches!(
            model.translate_to_rest_object(),
            Err(Error::MissingRequiredField {
                field: "asset_path",
                ..
            })
        ));
    }

    #[test]
    fn from_rest_does_not_rebuild_flavors() {
        let resource: ArmResource<Value> = serde_json::from_value(json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/models/iris/versions/4",
            "properties": {
                "assetPath": {"path": "az-ml-artifacts/abc/model.pkl", "isDirectory": false},
                "createdTime": "2021-03-01T10:00:00Z"
            }
        }))
        .unwrap();

        let model = Model::from_rest(resource).unwrap();
        assert_eq!(model.name.as_deref(), Some("iris"));
        assert_eq!(model.version.as_deref(), Some("4"));
        assert_eq!(model.flavors, None);
        assert!(model.creation_time.is_some());
        assert!(!dump(&model).unwrap().contains("flavors"));
    }

    #[test]
    fn environment_reference_is_kept_as_alias_without_workspace() {
        let model = load("name: iris\npath: m.pkl\nenvironment: azureml:sklearn-env:1\n");
        assert_eq!(
            model.environment,
            Some(Reference::Alias {
                name: "sklearn-env".into(),
                version: Some("1".into())
            })
        );
    }
}
