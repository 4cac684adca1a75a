use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;

use super::datastore::DatastoreOperations;
use super::{DEFAULT_VERSION, ServiceContext, same_path};
use crate::arm_id::AssetKind;
use crate::entities::Model;
use crate::error::Error;
use crate::orchestrator::OperationOrchestrator;

const KIND: AssetKind = AssetKind::Model;

pub struct ModelOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ModelOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, name: &str, version: &str) -> Result<Model, Error> {
        let resource = self.ctx.get(
            &self.ctx.version_path(KIND, name, version),
            API_VERSION_2020_09_01_PREVIEW,
            &[],
            KIND.label(),
            &format!("{name}:{version}"),
        )?;
        Model::from_rest(resource)
    }

    pub fn get_latest(&self, name: &str) -> Result<Model, Error> {
        let resource = self.ctx.latest(
            &self.ctx.versions_path(KIND, name),
            API_VERSION_2020_09_01_PREVIEW,
            KIND.label(),
            name,
        )?;
        Model::from_rest(resource)
    }

    /// Versions of `name`, or every model container when no name is given.
    pub fn list(&self, name: Option<&str>) -> Result<Vec<Model>, Error> {
        match name {
            Some(name) => self
                .ctx
                .list(
                    &self.ctx.versions_path(KIND, name),
                    API_VERSION_2020_09_01_PREVIEW,
                    &[],
                )?
                .into_iter()
                .map(Model::from_rest)
                .collect(),
            None => self
                .ctx
                .list(
                    &self.ctx.collection(KIND),
                    API_VERSION_2020_09_01_PREVIEW,
                    &[],
                )?
                .into_iter()
                .map(Model::from_container)
                .collect(),
        }
    }

    /// Uploads the local model, resolves its environment and registers the
    /// container and the version.
    ///
    /// An existing version with the same asset path is returned as is; one
    /// pointing elsewhere fails with [`Error::AssetChanged`].
    pub fn create_or_update(&self, model: &mut Model) -> Result<Model, Error> {
        let name = model.name.clone().ok_or(Error::MissingRequiredField {
            entity: "model",
            field: "name",
        })?;
        let version = model
            .version
            .get_or_insert_with(|| DEFAULT_VERSION.to_string())
            .clone();

        if model.asset_path.is_none() {
            let local = model.local_path().ok_or(Error::MissingRequiredField {
                entity: "model",
                field: "path",
            })?;
            let (asset_path, datastore_id) = DatastoreOperations::new(self.ctx)
                .upload(&local, model.datastore.as_deref())?;
            model.asset_path = Some(asset_path);
            model.datastore_id = Some(datastore_id);
        }

        match self.get(&name, &version) {
            Ok(existing) if same_path(&existing.asset_path, &model.asset_path) => {
                log::info!("Model {name}:{version} is already registered with this content");
                return Ok(existing);
            }
            Ok(_) => {
                return Err(Error::AssetChanged {
                    kind: "model",
                    name,
                    version,
                });
            }
            Err(Error::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        if let Some(environment) = model.environment.as_mut() {
            OperationOrchestrator::new(self.ctx).resolve_environment(environment)?;
        }

        self.ctx.put(
            &self.ctx.resource_path(KIND, &name),
            API_VERSION_2020_09_01_PREVIEW,
            &model.translate_container(),
        )?;
        let created = self.ctx.put(
            &self.ctx.version_path(KIND, &name, &version),
            API_VERSION_2020_09_01_PREVIEW,
            &model.translate_to_rest_object()?,
        )?;
        log::info!("Registered model {name}:{version}");
        Model::from_rest(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::testing::{
        Method, RecordingTransport, service_context, with_default_datastore,
    };
    use crate::schema::load_str;
    use std::fs;

    #[test]
    fn uploads_then_registers_container_and_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("model.pkl"), b"weights").unwrap();
        let transport = RecordingTransport::new();
        with_default_datastore(&transport);
        let (ctx, uploader) = service_context(transport.clone());
        let mut model: Model = load_str(
            "name: iris\nversion: 3\npath: model.pkl\nenvironment: azureml:sklearn-env:1\n",
            &ctx.load_context(dir.path()),
        )
        .unwrap();

        let created = ModelOperations::new(&ctx).create_or_update(&mut model).unwrap();

        assert_eq!(uploader.uploads().len(), 1);
        assert_eq!(created.name.as_deref(), Some("iris"));
        assert_eq!(created.version.as_deref(), Some("3"));
        assert!(
            created
                .environment
                .unwrap()
                .canonical_id()
                .unwrap()
                .ends_with("/environments/sklearn-env/versions/1")
        );
        let puts: Vec<String> = transport
            .calls()
            .into_iter()
            .filter(|c| c.method == Method::Put)
            .map(|c| c.path)
            .collect();
        assert!(puts[0].ends_with("/models/iris"));
        assert!(puts[1].ends_with("/models/iris/versions/3"));
    }

    fn register(ctx: &ServiceContext, dir: &std::path::Path) -> Result<Model, Error> {
        let mut model: Model =
            load_str("name: m\nversion: 1\npath: weights\n", &ctx.load_context(dir)).unwrap();
        ModelOperations::new(ctx).create_or_update(&mut model)
    }

    #[test]
    fn same_version_with_other_content_is_rejected() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fs::create_dir_all(a.path().join("weights")).unwrap();
        fs::create_dir_all(b.path().join("weights")).unwrap();
        fs::write(a.path().join("weights/w.bin"), b"first").unwrap();
        fs::write(b.path().join("weights/w.bin"), b"second").unwrap();
        let transport = RecordingTransport::new();
        with_default_datastore(&transport);
        let (ctx, _) = service_context(transport.clone());

        register(&ctx, a.path()).unwrap();
        let err = register(&ctx, b.path()).unwrap_err();

        assert!(matches!(
            err,
            Error::AssetChanged { name, version, .. } if name == "m" && version == "1"
        ));
        assert_eq!(transport.count(Method::Put), 2);
    }

    #[test]
    fn same_version_with_same_content_returns_the_existing_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("weights")).unwrap();
        fs::write(dir.path().join("weights/w.bin"), b"first").unwrap();
        let transport = RecordingTransport::new();
        with_default_datastore(&transport);
        let (ctx, _) = service_context(transport.clone());

        let first = register(&ctx, dir.path()).unwrap();
        let second = register(&ctx, dir.path()).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.asset_path, second.asset_path);
        assert_eq!(transport.count(Method::Put), 2);
    }

    #[test]
    fn model_without_name_is_rejected_before_any_call() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let mut model: Model = load_str("path: model.pkl\n", &ctx.load_context("/work")).unwrap();

        let err = ModelOperations::new(&ctx).create_or_update(&mut model).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { field: "name", .. }));
        assert!(transport.calls().is_empty());
    }
}
