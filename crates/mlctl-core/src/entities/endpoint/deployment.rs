use mlctl_client::schemas::{ArmResource, ModelReference, OnlineDeploymentProperties};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::code_configuration::{CodeConfigurationSchema, DeploymentCode};
use super::settings::{
    LivenessProbeSchema, RequestSettingsSchema, ResourceRequirementsSchema, ScaleSettingsSchema,
};
use crate::arm_id::AssetKind;
use crate::entities::environment::{Environment, EnvironmentSchema};
use crate::entities::model::{Model, ModelSchema};
use crate::entities::resolved_id;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::reference::Reference;
use crate::schema::{LoadContext, RefOrInline, Schema, collect};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnlineDeploymentSchema {
    /// Only read from standalone files; inside an endpoint the map key wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    pub model: RefOrInline<ModelSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_configuration: Option<CodeConfigurationSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<RefOrInline<EnvironmentSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_settings: Option<ScaleSettingsSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_settings: Option<RequestSettingsSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<ResourceRequirementsSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<LivenessProbeSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// A model served behind an online endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineDeployment {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
    pub model: Reference<Model>,
    pub code_configuration: Option<DeploymentCode>,
    pub environment: Option<Reference<Environment>>,
    pub sku: Option<String>,
    pub instance_type: Option<String>,
    pub scale_settings: Option<ScaleSettingsSchema>,
    pub request_settings: Option<RequestSettingsSchema>,
    pub resource_requirements: Option<ResourceRequirementsSchema>,
    pub liveness_probe: Option<LivenessProbeSchema>,
    pub provisioning_state: Option<String>,
    pub id: Option<String>,
}

impl OnlineDeployment {
    pub fn translate_to_rest_object(
        &self,
        location: Option<String>,
    ) -> Result<ArmResource<OnlineDeploymentProperties>, Error> {
        let model_id = resolved_id(&self.model, "model")?;
        let environment_id = self
            .environment
            .as_ref()
            .map(|env| resolved_id(env, "environment"))
            .transpose()?;
        let code_configuration = self
            .code_configuration
            .as_ref()
            .map(DeploymentCode::to_rest)
            .transpose()?;

        let properties = OnlineDeploymentProperties {
            description: self.description.clone(),
            properties: self.properties.clone(),
            code_configuration,
            environment_id,
            model_reference: Some(ModelReference::by_id(model_id)),
            sku: self.sku.clone(),
            instance_type: self.instance_type.clone(),
            scale_settings: self.scale_settings.as_ref().map(Into::into),
            request_settings: self.request_settings.as_ref().map(Into::into),
            resource_requirements: self.resource_requirements.as_ref().map(Into::into),
            liveness_probe: self.liveness_probe.as_ref().map(Into::into),
            provisioning_state: None,
        };

        let mut resource = ArmResource::new(properties)
            .with_tags(self.tags.clone())
            .with_location(location);
        resource.name = self.name.clone();
        Ok(resource)
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<OnlineDeploymentProperties>()?;
        let properties = resource.properties;
        let model = properties
            .model_reference
            .map(|reference| Reference::Canonical(reference.asset_id))
            .ok_or(Error::MissingRequiredField {
                entity: "deployment",
                field: "model",
            })?;

        Ok(Self {
            name: resource.name,
            description: properties.description,
            tags: resource.tags,
            properties: properties.properties,
            model,
            code_configuration: properties
                .code_configuration
                .and_then(DeploymentCode::from_rest),
            environment: properties.environment_id.map(Reference::Canonical),
            sku: properties.sku,
            instance_type: properties.instance_type,
            scale_settings: properties.scale_settings.map(Into::into),
            request_settings: properties.request_settings.map(Into::into),
            resource_requirements: properties.resource_requirements.map(Into::into),
            liveness_probe: properties.liveness_probe.map(Into::into),
            provisioning_state: properties.provisioning_state,
            id: resource.id,
        })
    }
}

impl Schema for OnlineDeployment {
    type Document = OnlineDeploymentSchema;

    fn from_document(
        doc: OnlineDeploymentSchema,
        ctx: &LoadContext,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = Vec::new();
        let model = collect(
            Some(doc.model.decode(ctx, "model", AssetKind::Model, true)),
            &mut errors,
        );
        let code_configuration = collect(
            doc.code_configuration
                .map(|c| DeploymentCode::from_document(c, ctx)),
            &mut errors,
        );
        let environment = collect(
            doc.environment
                .map(|e| e.decode(ctx, "environment", AssetKind::Environment, true)),
            &mut errors,
        );
        ValidationErrors::from(errors).into_result()?;

        let Some(model) = model else {
            return Err(ValidationErrors::single("model", "is required"));
        };

        Ok(Self {
            name: doc.name,
            description: doc.description,
            tags: doc.tags,
            properties: doc.properties,
            model,
            code_configuration,
            environment,
            sku: doc.sku,
            instance_type: doc.instance_type,
            scale_settings: doc.scale_settings,
            request_settings: doc.request_settings,
            resource_requirements: doc.resource_requirements,
            liveness_probe: doc.liveness_probe,
            provisioning_state: doc.provisioning_state,
            id: None,
        })
    }

    fn to_document(&self) -> Result<OnlineDeploymentSchema, ValidationErrors> {
        Ok(OnlineDeploymentSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            properties: self.properties.clone(),
            model: RefOrInline::from_reference(&self.model, Schema::to_document)?,
            code_configuration: self
                .code_configuration
                .as_ref()
                .map(DeploymentCode::to_document)
                .transpose()?,
            environment: self
                .environment
                .as_ref()
                .map(|env| RefOrInline::from_reference(env, Schema::to_document))
                .transpose()?,
            sku: self.sku.clone(),
            instance_type: self.instance_type.clone(),
            scale_settings: self.scale_settings.clone(),
            request_settings: self.request_settings.clone(),
            resource_requirements: self.resource_requirements.clone(),
            liveness_probe: self.liveness_probe.clone(),
            provisioning_state: self.provisioning_state.clone(),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        self.scale_settings
            .as_ref()
            .map(|settings| {
                settings
                    .validate()
                    .into_iter()
                    .map(|e| ValidationError::new(format!("scale_settings.{}", e.field), e.message))
                    .collect()
            })
            .unwrap_or_default()
    }
}
