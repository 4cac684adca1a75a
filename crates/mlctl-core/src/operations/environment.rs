use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;

use super::{DEFAULT_VERSION, ServiceContext};
use crate::arm_id::AssetKind;
use crate::entities::Environment;
use crate::error::Error;

const KIND: AssetKind = AssetKind::Environment;

pub struct EnvironmentOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> EnvironmentOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, name: &str, version: &str) -> Result<Environment, Error> {
        let resource = self.ctx.get(
            &self.ctx.version_path(KIND, name, version),
            API_VERSION_2020_09_01_PREVIEW,
            &[],
            KIND.label(),
            &format!("{name}:{version}"),
        )?;
        Environment::from_rest(resource)
    }

    pub fn get_latest(&self, name: &str) -> Result<Environment, Error> {
        let resource = self.ctx.latest(
            &self.ctx.versions_path(KIND, name),
            API_VERSION_2020_09_01_PREVIEW,
            KIND.label(),
            name,
        )?;
        Environment::from_rest(resource)
    }

    pub fn list(&self, name: &str) -> Result<Vec<Environment>, Error> {
        self.ctx
            .list(
                &self.ctx.versions_path(KIND, name),
                API_VERSION_2020_09_01_PREVIEW,
                &[],
            )?
            .into_iter()
            .map(Environment::from_rest)
            .collect()
    }

    /// Registers the definition as a version, `1` when none is given.
    pub fn create_or_update(&self, environment: &Environment) -> Result<Environment, Error> {
        let version = environment.version.as_deref().unwrap_or(DEFAULT_VERSION);
        let created = self.ctx.put(
            &self.ctx.version_path(KIND, &environment.name, version),
            API_VERSION_2020_09_01_PREVIEW,
            &environment.translate_to_rest_object()?,
        )?;
        log::info!("Registered environment {}:{version}", environment.name);
        Environment::from_rest(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::{Method, RecordingTransport, service_context};
    use crate::schema::load_str;
    use std::fs;

    #[test]
    fn registers_the_definition_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("conda.yml"), "name: env\ndependencies:\n  - python=3.8\n")
            .unwrap();
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let environment: Environment = load_str(
            "name: sklearn-env\nconda: conda.yml\ndocker:\n  image: mcr.microsoft.com/azureml/base:latest\n",
            &ctx.load_context(dir.path()),
        )
        .unwrap();

        let created = EnvironmentOperations::new(&ctx)
            .create_or_update(&environment)
            .unwrap();

        assert_eq!(created.version.as_deref(), Some("1"));
        let call = &transport.calls()[0];
        assert!(call.path.ends_with("/environments/sklearn-env/versions/1"));
        let properties = &call.body.as_ref().unwrap()["properties"]["properties"];
        assert!(properties["CondaFile"].as_str().unwrap().contains("python=3.8"));
        assert_eq!(
            properties["DockerImageUri"],
            "mcr.microsoft.com/azureml/base:latest"
        );
    }

    #[test]
    fn latest_version_is_the_newest() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let versions = ctx.versions_path(KIND, "sklearn-env");
        for version in ["1", "2"] {
            transport.seed(
                &format!("{versions}/{version}"),
                serde_json::json!({"properties": {"properties": {"DockerImageUri": "img"}}}),
            );
        }

        let latest = EnvironmentOperations::new(&ctx).get_latest("sklearn-env").unwrap();
        assert_eq!(latest.version.as_deref(), Some("2"));
        let call = &transport.calls()[0];
        assert_eq!(call.method, Method::List);
        assert!(call.query.contains(&("$top".to_string(), "1".to_string())));
    }

    #[test]
    fn missing_environment_is_not_found() {
        let (ctx, _) = service_context(RecordingTransport::new());
        let err = EnvironmentOperations::new(&ctx)
            .get_latest("missing")
            .unwrap_err();
        assert_eq!(err.to_string(), "environment missing not found");
    }
}
