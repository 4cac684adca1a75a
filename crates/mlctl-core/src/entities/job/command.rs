use mlctl_client::schemas::{
    ArmResource, CodeConfiguration, CommandJobProperties, InteractionEndpoints, JobProperties,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::compute::{ComputeBinding, ComputeBindingSchema};
use super::distribution::Distribution;
use super::inputs::{
    BoundCommand, InputEntry, InputEntrySchema, InputPort, bind_inputs, unbind_inputs,
};
use crate::arm_id::AssetKind;
use crate::entities::code_asset::{CodeAsset, CodeField};
use crate::entities::environment::{Environment, EnvironmentSchema};
use crate::entities::resolved_id;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::reference::Reference;
use crate::schema::{LoadContext, RefOrInline, Schema, collect};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandJobSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComputeBindingSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<RefOrInline<EnvironmentSchema>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputEntrySchema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_ports: BTreeMap<String, InputPort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_run_duration_seconds: Option<u64>,
    /// Reported by the service; ignored on submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_endpoints: Option<InteractionEndpoints>,
}

/// A single command run on a compute target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandJob {
    pub name: Option<String>,
    pub experiment_name: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub properties: BTreeMap<String, String>,
    pub compute: Option<ComputeBinding>,
    pub code: Option<Reference<CodeAsset>>,
    pub command: Option<String>,
    pub environment: Option<Reference<Environment>>,
    pub inputs: BTreeMap<String, InputEntry>,
    pub input_ports: BTreeMap<String, InputPort>,
    pub distribution: Option<Distribution>,
    pub max_run_duration_seconds: Option<u64>,
    pub status: Option<String>,
    pub interaction_endpoints: Option<InteractionEndpoints>,
    pub id: Option<String>,
}

/// The run part shared by command jobs and sweep trials.
pub(crate) struct RunConfiguration {
    pub code_configuration: CodeConfiguration,
    pub environment_id: Option<String>,
    pub bound: BoundCommand,
}

impl CommandJob {
    pub fn bind_inputs(&self) -> Result<BoundCommand, Error> {
        let command = self.command.as_deref().ok_or(Error::MissingRequiredField {
            entity: "job",
            field: "command",
        })?;
        bind_inputs(command, &self.inputs, &self.input_ports)
    }

    /// Checks the fields a submission cannot do without.
    pub(crate) fn check_required(
        &self,
        entity: &'static str,
        with_name: bool,
    ) -> Result<(), Error> {
        let missing = |field| Error::MissingRequiredField { entity, field };
        if with_name && self.name.is_none() {
            return Err(missing("name"));
        }
        if self.compute.is_none() {
            return Err(missing("compute"));
        }
        if self.command.is_none() {
            return Err(missing("command"));
        }
        if self.environment.is_none() {
            return Err(missing("environment"));
        }
        Ok(())
    }

    pub(crate) fn run_configuration(&self) -> Result<RunConfiguration, Error> {
        let bound = self.bind_inputs()?;
        let code_artifact_id = self
            .code
            .as_ref()
            .map(|code| resolved_id(code, "code"))
            .transpose()?;
        let environment_id = self
            .environment
            .as_ref()
            .map(|env| resolved_id(env, "environment"))
            .transpose()?;

        Ok(RunConfiguration {
            code_configuration: CodeConfiguration {
                code_artifact_id,
                command: bound.command.clone(),
            },
            environment_id,
            bound,
        })
    }

    pub fn translate_to_rest_object(&self) -> Result<ArmResource<JobProperties>, Error> {
        self.check_required("job", true)?;
        let run = self.run_configuration()?;
        let compute_binding = self
            .compute
            .as_ref()
            .map(ComputeBinding::to_rest)
            .transpose()?
            .unwrap_or_default();

        let properties = CommandJobProperties {
            experiment_name: self.experiment_name.clone(),
            description: self.description.clone(),
            properties: self.properties.clone(),
            tags: self.tags.clone(),
            compute_binding,
            code_configuration: run.code_configuration,
            environment_id: run.environment_id,
            data_bindings: run.bound.data_bindings,
            distribution_configuration: self.distribution.as_ref().map(Into::into),
            max_run_duration_seconds: self.max_run_duration_seconds,
            status: None,
            interaction_endpoints: None,
        };

        let mut resource = ArmResource::new(JobProperties::Command(properties));
        resource.name = self.name.clone();
        Ok(resource)
    }

    pub(crate) fn from_rest_properties(
        name: Option<String>,
        id: Option<String>,
        properties: CommandJobProperties,
    ) -> Self {
        let (command, inputs) = unbind_inputs(
            &properties.code_configuration.command,
            &properties.data_bindings,
        );

        Self {
            name,
            experiment_name: properties.experiment_name,
            description: properties.description,
            tags: properties.tags,
            properties: properties.properties,
            compute: ComputeBinding::from_rest(&properties.compute_binding),
            code: properties
                .code_configuration
                .code_artifact_id
                .map(Reference::Canonical),
            command: Some(command),
            environment: properties.environment_id.map(Reference::Canonical),
            inputs,
            input_ports: BTreeMap::new(),
            distribution: properties.distribution_configuration.map(Into::into),
            max_run_duration_seconds: properties.max_run_duration_seconds,
            status: properties.status,
            interaction_endpoints: properties.interaction_endpoints,
            id,
        }
    }
}

impl Schema for CommandJob {
    type Document = CommandJobSchema;

    fn from_document(doc: CommandJobSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        let mut errors = Vec::new();

        let compute = collect(
            doc.compute.map(|c| ComputeBinding::from_document(c, ctx)),
            &mut errors,
        );
        let code = collect(doc.code.map(|c| c.decode(ctx, "code")), &mut errors);
        let environment = collect(
            doc.environment
                .map(|e| e.decode(ctx, "environment", AssetKind::Environment, false)),
            &mut errors,
        );

        let mut inputs = BTreeMap::new();
        for (key, entry) in doc.inputs {
            match InputEntry::from_document(&key, entry, ctx) {
                Ok(entry) => {
                    inputs.insert(key, entry);
                }
                Err(e) => errors.extend(e.0),
            }
        }
        ValidationErrors::from(errors).into_result()?;

        Ok(Self {
            name: doc.name,
            experiment_name: doc.experiment_name,
            description: doc.description,
            tags: doc.tags,
            properties: doc.properties,
            compute,
            code,
            command: doc.command,
            environment,
            inputs,
            input_ports: doc.input_ports,
            distribution: doc.distribution,
            max_run_duration_seconds: doc.max_run_duration_seconds,
            status: doc.status,
            interaction_endpoints: doc.interaction_endpoints,
            id: None,
        })
    }

    fn to_document(&self) -> Result<CommandJobSchema, ValidationErrors> {
        let code = self
            .code
            .as_ref()
            .map(CodeField::from_reference)
            .transpose()?;
        let environment = self
            .environment
            .as_ref()
            .map(|env| RefOrInline::from_reference(env, Schema::to_document))
            .transpose()?;

        Ok(CommandJobSchema {
            name: self.name.clone(),
            experiment_name: self.experiment_name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            properties: self.properties.clone(),
            compute: self.compute.as_ref().map(ComputeBinding::to_document),
            code,
            command: self.command.clone(),
            environment,
            inputs: self
                .inputs
                .iter()
                .map(|(key, entry)| (key.clone(), entry.to_document()))
                .collect(),
            input_ports: self.input_ports.clone(),
            distribution: self.distribution.clone(),
            max_run_duration_seconds: self.max_run_duration_seconds,
            status: self.status.clone(),
            interaction_endpoints: self.interaction_endpoints.clone(),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.max_run_duration_seconds == Some(0) {
            errors.push(ValidationError::new(
                "max_run_duration_seconds",
                "must be greater than zero",
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceScope;
    use crate::schema::{dump, load_str};
    use mlctl_client::schemas::DataBindingMode;

    const JOB: &str = r#"
name: train-1
experiment_name: iris
compute:
  target: azureml:cpu-cluster
code: azureml:train-src:1
command: python train.py --data {inputs.train} --lr {inputs.lr}
environment: azureml:sklearn-env:2
inputs:
  train:
    data: azureml:iris:1
    mode: download
  lr: 0.01
distribution:
  type: mpi
  process_count_per_instance: 2
"#;

    fn scoped() -> LoadContext {
        LoadContext::new("/work").with_workspace(WorkspaceScope::new(
            "sub".into(),
            "rg".into(),
            "ws".into(),
        ))
    }

    #[test]
    fn translates_with_workspace_scope() {
        let job = load_str::<CommandJob>(JOB, &scoped()).unwrap();
        let rest = job.translate_to_rest_object().unwrap();
        assert_eq!(rest.name.as_deref(), Some("train-1"));

        let JobProperties::Command(properties) = rest.properties else {
            panic!("expected a command job");
        };
        assert_eq!(
            properties.code_configuration.command,
            "python train.py --data AZURE_ML_INPUT0 --lr 0.01"
        );
        assert!(
            properties
                .code_configuration
                .code_artifact_id
                .unwrap()
                .ends_with("/codes/train-src/versions/1")
        );
        assert!(properties.environment_id.unwrap().ends_with("/environments/sklearn-env/versions/2"));
        assert!(properties.compute_binding.compute_id.unwrap().ends_with("/computes/cpu-cluster"));

        let binding = &properties.data_bindings["train"];
        assert_eq!(binding.mode, Some(DataBindingMode::Download));
        assert!(binding.source_data_reference.ends_with("/data/iris/versions/1"));
        assert!(properties.distribution_configuration.is_some());
    }

    #[test]
    fn required_fields_fail_translation() {
        let job = load_str::<CommandJob>("name: j\ncommand: echo hi\n", &scoped()).unwrap();
        assert!(matches!(
            job.translate_to_rest_object(),
            Err(Error::MissingRequiredField { field: "compute", .. })
        ));
    }

    #[test]
    fn unresolved_references_fail_translation() {
        let job = load_str::<CommandJob>(JOB, &LoadContext::new("/work")).unwrap();
        assert!(matches!(
            job.translate_to_rest_object(),
            Err(Error::Reference(_))
        ));
    }

    #[test]
    fn errors_from_several_fields_are_collected() {
        let err = load_str::<CommandJob>(
            "name: j\ncompute:\n  target: cpu\ncode: azureml:src\n",
            &scoped(),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("compute.target"));
        assert!(message.contains("version is not provided"));
    }

    #[test]
    fn from_rest_restores_placeholders() {
        let job = load_str::<CommandJob>(JOB, &scoped()).unwrap();
        let JobProperties::Command(properties) = job.translate_to_rest_object().unwrap().properties
        else {
            panic!("expected a command job");
        };

        let restored = CommandJob::from_rest_properties(Some("train-1".into()), None, properties);
        assert_eq!(
            restored.command.as_deref(),
            Some("python train.py --data {inputs.train} --lr 0.01")
        );
        assert_eq!(restored.inputs["train"].mode, Some(DataBindingMode::Download));
        assert!(dump(&restored).unwrap().contains("{inputs.train}"));
    }
}
