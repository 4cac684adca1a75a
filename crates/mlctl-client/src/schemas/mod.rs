//! Versioned REST resource shapes exchanged with the management service.

mod assets;
mod compute;
mod datastore;
mod endpoint;
mod job;
mod workspace;

pub use assets::*;
pub use compute::*;
pub use datastore::*;
pub use endpoint::*;
pub use job::*;
pub use workspace::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Envelope shared by every resource: `{id, name, type, tags, location, properties}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmResource<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ResourceIdentity>,
    pub properties: P,
}

impl<P> ArmResource<P> {
    pub fn new(properties: P) -> Self {
        Self {
            id: None,
            name: None,
            resource_type: None,
            tags: BTreeMap::new(),
            location: None,
            kind: None,
            identity: None,
            properties,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn with_identity(mut self, identity: ResourceIdentity) -> Self {
        self.identity = Some(identity);
        self
    }
}

impl ArmResource<Value> {
    /// Re-wraps the generic `properties` payload into its typed shape.
    ///
    /// Responses are first read with untyped properties because several kinds
    /// are polymorphic (jobs) and some service versions hand the nested object
    /// back as a JSON-encoded string instead of a mapping.
    pub fn typed<P: DeserializeOwned>(self) -> Result<ArmResource<P>, serde_json::Error> {
        let properties = match self.properties {
            Value::String(encoded) => serde_json::from_str(&encoded)?,
            Value::Null => serde_json::from_value(Value::Object(Default::default()))?,
            other => serde_json::from_value(other)?,
        };
        Ok(ArmResource {
            id: self.id,
            name: self.name,
            resource_type: self.resource_type,
            tags: self.tags,
            location: self.location,
            kind: self.kind,
            identity: self.identity,
            properties,
        })
    }
}

impl<P: Serialize> ArmResource<P> {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentity {
    #[serde(rename = "type")]
    pub identity_type: String,
}

/// A single page of a collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPath {
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
}

/// Code plus entrypoint shared by jobs and deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_artifact_id: Option<String>,
    pub command: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_rewraps_generic_mapping() {
        let raw: ArmResource<Value> = serde_json::from_value(json!({
            "id": "/subscriptions/s/x",
            "name": "x",
            "properties": {"path": "az-ml-artifacts/abc/src", "isDirectory": true}
        }))
        .unwrap();

        let typed = raw.typed::<AssetPath>().unwrap();
        assert_eq!(typed.properties.path, "az-ml-artifacts/abc/src");
        assert!(typed.properties.is_directory);
        assert_eq!(typed.name.as_deref(), Some("x"));
    }

    #[test]
    fn typed_accepts_json_encoded_properties() {
        let raw: ArmResource<Value> = serde_json::from_value(json!({
            "properties": "{\"path\": \"a/b\", \"isDirectory\": false}"
        }))
        .unwrap();

        let typed = raw.typed::<AssetPath>().unwrap();
        assert_eq!(typed.properties.path, "a/b");
    }

    #[test]
    fn envelope_omits_unset_fields() {
        let resource = ArmResource::new(json!({})).with_name("blue");
        let value = resource.to_value().unwrap();
        assert_eq!(value, json!({"name": "blue", "properties": {}}));
    }
}
