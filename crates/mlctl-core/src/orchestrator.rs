//! Turns the references a document carries into canonical resource ids.
//!
//! Every `resolve_*` call leaves the reference as [`Reference::Canonical`],
//! so resolving the same entity twice only talks to the service once.

use crate::arm_id::{AssetKind, to_canonical};
use crate::entities::endpoint::{BatchDeployment, DeploymentCode};
use crate::entities::job::InputValue;
use crate::entities::{CodeAsset, Data, Environment, Job, Model, OnlineDeployment};
use crate::error::{Error, ReferenceError};
use crate::operations::{
    CodeOperations, DataOperations, EnvironmentOperations, ModelOperations, ServiceContext,
};
use crate::reference::Reference;

pub struct OperationOrchestrator<'a> {
    ctx: &'a ServiceContext,
}

/// Shared walk over the three reference shapes.
fn resolve_with<T>(
    reference: &mut Reference<T>,
    entity: &'static str,
    lookup: impl FnOnce(&str, Option<&str>) -> Result<Option<String>, Error>,
    create: impl FnOnce(&mut T) -> Result<Option<String>, Error>,
) -> Result<String, Error> {
    let id = match reference {
        Reference::Canonical(id) => return Ok(id.clone()),
        Reference::Alias { name, version } => lookup(name.as_str(), version.as_deref())?,
        Reference::Inline(inner) => create(inner)?,
    };
    let id = id.ok_or(Error::MissingRequiredField { entity, field: "id" })?;
    *reference = Reference::Canonical(id.clone());
    Ok(id)
}

impl<'a> OperationOrchestrator<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn resolve_code(&self, reference: &mut Reference<CodeAsset>) -> Result<String, Error> {
        let codes = CodeOperations::new(self.ctx);
        resolve_with(
            reference,
            "code",
            |name, version| {
                let version = version.ok_or_else(|| ReferenceError::VersionNotProvided {
                    field: "code".to_string(),
                    value: name.to_string(),
                })?;
                Ok(codes.get(name, version)?.id)
            },
            |asset| Ok(codes.create_or_update(asset)?.id),
        )
    }

    pub fn resolve_environment(
        &self,
        reference: &mut Reference<Environment>,
    ) -> Result<String, Error> {
        let environments = EnvironmentOperations::new(self.ctx);
        resolve_with(
            reference,
            "environment",
            |name, version| match version {
                Some(version) => Ok(environments.get(name, version)?.id),
                None => Ok(environments.get_latest(name)?.id),
            },
            |environment| Ok(environments.create_or_update(environment)?.id),
        )
    }

    pub fn resolve_model(&self, reference: &mut Reference<Model>) -> Result<String, Error> {
        let models = ModelOperations::new(self.ctx);
        resolve_with(
            reference,
            "model",
            |name, version| match version {
                Some(version) => Ok(models.get(name, version)?.id),
                None => Ok(models.get_latest(name)?.id),
            },
            |model| Ok(models.create_or_update(model)?.id),
        )
    }

    pub fn resolve_data(&self, reference: &mut Reference<Data>) -> Result<String, Error> {
        let data = DataOperations::new(self.ctx);
        resolve_with(
            reference,
            "data",
            |name, version| match version {
                Some(version) => Ok(data.get(name, version)?.id),
                None => Ok(data.get_latest(name)?.id),
            },
            |inline| Ok(data.create_or_update(inline)?.id),
        )
    }

    /// Qualifies a bare compute name with the workspace.
    pub fn resolve_compute(&self, target: &mut String) -> Result<String, Error> {
        let id = to_canonical(Some(self.ctx.scope()), AssetKind::Compute, target, None)?;
        *target = id.clone();
        Ok(id)
    }

    /// Resolves compute, code, environment and data inputs of the job, or of
    /// the trial for a sweep.
    pub fn resolve_job(&self, job: &mut Job) -> Result<(), Error> {
        let run = job.run_definition_mut();
        if let Some(compute) = run.compute.as_mut() {
            self.resolve_compute(&mut compute.target)?;
        }
        if let Some(code) = run.code.as_mut() {
            self.resolve_code(code)?;
        }
        if let Some(environment) = run.environment.as_mut() {
            self.resolve_environment(environment)?;
        }
        for entry in run.inputs.values_mut() {
            if let InputValue::Data(reference) = &mut entry.data {
                self.resolve_data(reference)?;
            }
        }
        Ok(())
    }

    pub fn resolve_deployment(&self, deployment: &mut OnlineDeployment) -> Result<(), Error> {
        self.resolve_model(&mut deployment.model)?;
        if let Some(DeploymentCode { code, .. }) = deployment.code_configuration.as_mut() {
            self.resolve_code(code)?;
        }
        if let Some(environment) = deployment.environment.as_mut() {
            self.resolve_environment(environment)?;
        }
        Ok(())
    }

    /// Same as [`Self::resolve_deployment`] plus the compute the batch runs on.
    pub fn resolve_batch_deployment(&self, deployment: &mut BatchDeployment) -> Result<(), Error> {
        self.resolve_model(&mut deployment.model)?;
        if let Some(DeploymentCode { code, .. }) = deployment.code_configuration.as_mut() {
            self.resolve_code(code)?;
        }
        if let Some(environment) = deployment.environment.as_mut() {
            self.resolve_environment(environment)?;
        }
        self.resolve_compute(&mut deployment.compute.target)?;
        Ok(())
    }
}
