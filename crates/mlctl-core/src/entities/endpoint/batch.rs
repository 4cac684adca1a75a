use mlctl_client::schemas::{
    ArmResource, BatchDeploymentProperties, BatchDeploymentSettings, BatchEndpointProperties,
    BatchOutputConfiguration, BatchPartitioningScheme, BatchRetrySettings, BatchScaleSettings,
    ComputeBinding as RestComputeBinding, ModelReference,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumString};

use super::code_configuration::{CodeConfigurationSchema, DeploymentCode};
use super::online::AuthMode;
use super::{EndpointType, validate_traffic};
use crate::arm_id::AssetKind;
use crate::entities::environment::{Environment, EnvironmentSchema};
use crate::entities::job::{ComputeBinding, ComputeBindingSchema};
use crate::entities::model::{Model, ModelSchema};
use crate::entities::resolved_id;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::reference::Reference;
use crate::schema::{LoadContext, Nested, RefOrInline, Schema, collect};

/// What a batch run writes once every mini batch is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum OutputAction {
    #[strum(to_string = "AppendRow", serialize = "append_row")]
    AppendRow,
    #[strum(to_string = "SummaryOnly", serialize = "summary_only")]
    SummaryOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitioningSchemeSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mini_batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitioning_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfigurationSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_action: Option<OutputAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_row_file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettingsSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in_seconds: Option<u32>,
}

/// Batch run tuning. The compute comes from the deployment's `compute` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchSettingsSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitioning_scheme: Option<PartitioningSchemeSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_configuration: Option<OutputConfigurationSchema>,
    /// `-1` ignores every failed mini batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_settings: Option<RetrySettingsSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging_level: Option<String>,
}

impl BatchSettingsSchema {
    fn to_rest(&self, compute_id: Option<String>) -> BatchDeploymentSettings {
        BatchDeploymentSettings {
            compute_id,
            partitioning_scheme: self.partitioning_scheme.as_ref().map(|p| {
                BatchPartitioningScheme {
                    mini_batch_size: p.mini_batch_size,
                    partitioning_keys: p.partitioning_keys.clone(),
                }
            }),
            output_configuration: self.output_configuration.as_ref().map(|o| {
                BatchOutputConfiguration {
                    output_action: o.output_action.map(|a| a.to_string()),
                    append_row_file_name: o.append_row_file_name.clone(),
                }
            }),
            error_threshold: self.error_threshold,
            retry_settings: self.retry_settings.as_ref().map(|r| BatchRetrySettings {
                maximum_retries: r.maximum_retries,
                timeout_in_seconds: r.timeout_in_seconds,
            }),
            logging_level: self.logging_level.clone(),
        }
    }

    fn from_rest(settings: BatchDeploymentSettings) -> Self {
        Self {
            partitioning_scheme: settings.partitioning_scheme.map(|p| PartitioningSchemeSchema {
                mini_batch_size: p.mini_batch_size,
                partitioning_keys: p.partitioning_keys,
            }),
            output_configuration: settings.output_configuration.map(|o| {
                OutputConfigurationSchema {
                    output_action: o
                        .output_action
                        .and_then(|a| OutputAction::from_str(&a).ok()),
                    append_row_file_name: o.append_row_file_name,
                }
            }),
            error_threshold: settings.error_threshold,
            retry_settings: settings.retry_settings.map(|r| RetrySettingsSchema {
                maximum_retries: r.maximum_retries,
                timeout_in_seconds: r.timeout_in_seconds,
            }),
            logging_level: settings.logging_level,
        }
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.error_threshold.is_some_and(|t| t < -1) {
            errors.push(ValidationError::new(
                "batch_settings.error_threshold",
                "must be -1 or greater",
            ));
        }
        if let Some(PartitioningSchemeSchema {
            mini_batch_size: Some(0),
            ..
        }) = self.partitioning_scheme
        {
            errors.push(ValidationError::new(
                "batch_settings.partitioning_scheme.mini_batch_size",
                "must be greater than 0",
            ));
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchDeploymentSchema {
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
    pub compute: ComputeBindingSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_settings: Option<BatchSettingsSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// A model scoring files in bulk on a workspace compute.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDeployment {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
    pub model: Reference<Model>,
    pub code_configuration: Option<DeploymentCode>,
    pub environment: Option<Reference<Environment>>,
    /// Node count travels as the deployment's scale settings.
    pub compute: ComputeBinding,
    pub batch_settings: BatchSettingsSchema,
    pub provisioning_state: Option<String>,
    pub id: Option<String>,
}

impl BatchDeployment {
    pub fn translate_to_rest_object(
        &self,
        location: Option<String>,
    ) -> Result<ArmResource<BatchDeploymentProperties>, Error> {
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
        let compute = self.compute.to_rest()?;

        let properties = BatchDeploymentProperties {
            description: self.description.clone(),
            properties: self.properties.clone(),
            code_configuration,
            environment_id,
            model_reference: Some(ModelReference::by_id(model_id)),
            batch_settings: Some(self.batch_settings.to_rest(compute.compute_id)),
            scale_settings: compute.node_count.map(|node_count| BatchScaleSettings {
                node_count: Some(node_count),
            }),
            provisioning_state: None,
        };

        let mut resource = ArmResource::new(properties)
            .with_tags(self.tags.clone())
            .with_location(location);
        resource.name = self.name.clone();
        Ok(resource)
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<BatchDeploymentProperties>()?;
        let properties = resource.properties;
        let model = properties
            .model_reference
            .map(|reference| Reference::Canonical(reference.asset_id))
            .ok_or(Error::MissingRequiredField {
                entity: "batch deployment",
                field: "model",
            })?;
        let settings = properties.batch_settings.unwrap_or_default();
        let compute = ComputeBinding::from_rest(&RestComputeBinding {
            compute_id: settings.compute_id.clone(),
            node_count: properties.scale_settings.and_then(|s| s.node_count),
        })
        .ok_or(Error::MissingRequiredField {
            entity: "batch deployment",
            field: "compute",
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
            compute,
            batch_settings: BatchSettingsSchema::from_rest(settings),
            provisioning_state: properties.provisioning_state,
            id: resource.id,
        })
    }
}

impl Schema for BatchDeployment {
    type Document = BatchDeploymentSchema;

    fn from_document(
        doc: BatchDeploymentSchema,
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
        let compute = collect(
            Some(ComputeBinding::from_document(doc.compute, ctx)),
            &mut errors,
        );
        ValidationErrors::from(errors).into_result()?;

        let Some(model) = model else {
            return Err(ValidationErrors::single("model", "is required"));
        };
        let Some(compute) = compute else {
            return Err(ValidationErrors::single("compute", "is required"));
        };

        Ok(Self {
            name: doc.name,
            description: doc.description,
            tags: doc.tags,
            properties: doc.properties,
            model,
            code_configuration,
            environment,
            compute,
            batch_settings: doc.batch_settings.unwrap_or_default(),
            provisioning_state: doc.provisioning_state,
            id: None,
        })
    }

    fn to_document(&self) -> Result<BatchDeploymentSchema, ValidationErrors> {
        let batch_settings =
            (self.batch_settings != BatchSettingsSchema::default()).then(|| self.batch_settings.clone());
        Ok(BatchDeploymentSchema {
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
            compute: self.compute.to_document(),
            batch_settings,
            provisioning_state: self.provisioning_state.clone(),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        self.batch_settings.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchEndpointSchema {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<EndpointType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub traffic: BTreeMap<String, u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deployments: BTreeMap<String, Nested<BatchDeploymentSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEndpoint {
    pub name: String,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
    pub traffic: BTreeMap<String, u8>,
    pub auth_mode: AuthMode,
    pub location: Option<String>,
    pub deployments: BTreeMap<String, BatchDeployment>,
    pub scoring_uri: Option<String>,
    pub provisioning_state: Option<String>,
    pub id: Option<String>,
}

impl BatchEndpoint {
    /// Same two-phase shape as online endpoints: the shell goes out first with
    /// an empty traffic map.
    pub fn translate_to_rest_object(
        &self,
        location: Option<String>,
        with_traffic: bool,
    ) -> ArmResource<BatchEndpointProperties> {
        let traffic_rules = if with_traffic {
            self.traffic.clone()
        } else {
            BTreeMap::new()
        };
        let properties = BatchEndpointProperties {
            description: self.description.clone(),
            auth_mode: Some(self.auth_mode.to_string()),
            properties: self.properties.clone(),
            traffic_rules: Some(traffic_rules),
            endpoint: None,
            provisioning_state: None,
        };
        ArmResource::new(properties)
            .with_name(self.name.clone())
            .with_tags(self.tags.clone())
            .with_location(location)
    }

    pub fn from_rest(
        resource: ArmResource<Value>,
        deployments: Vec<ArmResource<Value>>,
    ) -> Result<Self, Error> {
        let resource = resource.typed::<BatchEndpointProperties>()?;
        let properties = resource.properties;

        let mut by_name = BTreeMap::new();
        for deployment in deployments {
            let deployment = BatchDeployment::from_rest(deployment)?;
            if let Some(name) = deployment.name.clone() {
                by_name.insert(name, deployment);
            }
        }

        Ok(Self {
            name: resource.name.unwrap_or_default(),
            description: properties.description,
            tags: resource.tags,
            properties: properties.properties,
            traffic: properties.traffic_rules.unwrap_or_default(),
            auth_mode: properties
                .auth_mode
                .and_then(|mode| AuthMode::from_str(&mode).ok())
                .unwrap_or(AuthMode::AadToken),
            location: resource.location,
            deployments: by_name,
            scoring_uri: properties.endpoint,
            provisioning_state: properties.provisioning_state,
            id: resource.id,
        })
    }
}

impl Schema for BatchEndpoint {
    type Document = BatchEndpointSchema;

    fn from_document(doc: BatchEndpointSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        EndpointType::Batch.check(doc.endpoint_type)?;

        let mut errors = Vec::new();
        let mut deployments = BTreeMap::new();
        for (name, nested) in doc.deployments {
            match nested.load::<BatchDeployment>(ctx) {
                Ok(mut deployment) => {
                    deployment.name = Some(name.clone());
                    deployments.insert(name, deployment);
                }
                Err(e) => errors.extend(e.within(&format!("deployments.{name}")).0),
            }
        }
        ValidationErrors::from(errors).into_result()?;

        Ok(Self {
            name: doc.name,
            description: doc.description,
            tags: doc.tags,
            properties: doc.properties,
            traffic: doc.traffic,
            auth_mode: doc.auth_mode.unwrap_or(AuthMode::AadToken),
            location: doc.location,
            deployments,
            scoring_uri: doc.scoring_uri,
            provisioning_state: doc.provisioning_state,
            id: None,
        })
    }

    fn to_document(&self) -> Result<BatchEndpointSchema, ValidationErrors> {
        let mut deployments = BTreeMap::new();
        for (name, deployment) in &self.deployments {
            let mut doc = deployment
                .to_document()
                .map_err(|e| e.within(&format!("deployments.{name}")))?;
            doc.name = None;
            deployments.insert(name.clone(), Nested::Inline(doc));
        }

        Ok(BatchEndpointSchema {
            name: self.name.clone(),
            endpoint_type: Some(EndpointType::Batch),
            description: self.description.clone(),
            tags: self.tags.clone(),
            properties: self.properties.clone(),
            traffic: self.traffic.clone(),
            auth_mode: Some(self.auth_mode),
            location: self.location.clone(),
            deployments,
            scoring_uri: self.scoring_uri.clone(),
            provisioning_state: self.provisioning_state.clone(),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        validate_traffic(&self.traffic).into_iter().collect()
    }
}
