use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;

use super::datastore::DatastoreOperations;
use super::{DEFAULT_VERSION, ServiceContext};
use crate::arm_id::{AssetKind, datastore_id};
use crate::entities::Data;
use crate::entities::data::DataSource;
use crate::error::Error;

const KIND: AssetKind = AssetKind::Data;

pub struct DataOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> DataOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn get(&self, name: &str, version: &str) -> Result<Data, Error> {
        let resource = self.ctx.get(
            &self.ctx.version_path(KIND, name, version),
            API_VERSION_2020_09_01_PREVIEW,
            &[],
            KIND.label(),
            &format!("{name}:{version}"),
        )?;
        Data::from_rest(resource)
    }

    pub fn get_latest(&self, name: &str) -> Result<Data, Error> {
        let resource = self.ctx.latest(
            &self.ctx.versions_path(KIND, name),
            API_VERSION_2020_09_01_PREVIEW,
            KIND.label(),
            name,
        )?;
        Data::from_rest(resource)
    }

    pub fn list(&self, name: &str) -> Result<Vec<Data>, Error> {
        self.ctx
            .list(
                &self.ctx.versions_path(KIND, name),
                API_VERSION_2020_09_01_PREVIEW,
                &[],
            )?
            .into_iter()
            .map(Data::from_rest)
            .collect()
    }

    /// Uploads local content when there is any and registers the version.
    ///
    /// Data has no container call: the version PUT creates it. Re-registering
    /// a version is only accepted when it points at the same asset path.
    pub fn create_or_update(&self, data: &mut Data) -> Result<Data, Error> {
        let version = data
            .version
            .get_or_insert_with(|| DEFAULT_VERSION.to_string())
            .clone();
        let datastores = DatastoreOperations::new(self.ctx);

        if let Some(local) = data.local_path() {
            let (asset_path, datastore_id) =
                datastores.upload(&local, data.datastore.as_deref())?;
            data.source = DataSource::Uploaded(asset_path);
            data.datastore_id = Some(datastore_id);
        } else if data.datastore_id.is_none() {
            let datastore = match &data.datastore {
                Some(name) => name.clone(),
                None => datastores.get_default()?.name,
            };
            data.datastore_id = Some(datastore_id(self.ctx.scope(), &datastore));
        }

        match self.get(&data.name, &version) {
            Ok(existing) if existing.source == data.source => {
                log::info!("Data {}:{version} is already registered with this content", data.name);
                return Ok(existing);
            }
            Ok(_) => {
                return Err(Error::AssetChanged {
                    kind: "data",
                    name: data.name.clone(),
                    version,
                });
            }
            Err(Error::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let created = self.ctx.put(
            &self.ctx.version_path(KIND, &data.name, &version),
            API_VERSION_2020_09_01_PREVIEW,
            &data.translate_to_rest_object()?,
        )?;
        log::info!("Registered data {}:{version}", data.name);
        Data::from_rest(created)
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
    fn local_file_is_uploaded_and_registered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("iris.csv"), "a,b\n1,2\n").unwrap();
        let transport = RecordingTransport::new();
        with_default_datastore(&transport);
        let (ctx, uploader) = service_context(transport.clone());
        let mut data: Data =
            load_str("name: iris\nfile: iris.csv\n", &ctx.load_context(dir.path())).unwrap();

        let created = DataOperations::new(&ctx).create_or_update(&mut data).unwrap();

        assert_eq!(uploader.uploads().len(), 1);
        assert!(matches!(created.source, DataSource::Uploaded(ref p) if p.path.ends_with("/iris.csv")));
        assert!(
            created
                .datastore_id
                .unwrap()
                .ends_with("/datastores/workspaceblobstore")
        );
        let put = transport
            .calls()
            .into_iter()
            .find(|c| c.method == Method::Put)
            .unwrap();
        assert!(put.path.ends_with("/data/iris/versions/1"));
        assert_eq!(put.body.unwrap()["properties"]["datasetType"], "simple");
    }

    #[test]
    fn same_version_pointing_elsewhere_is_rejected() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let operations = DataOperations::new(&ctx);
        let load = |path: &str| -> Data {
            load_str(
                &format!("name: iris\nversion: 1\ndatastore: lake\npath: {path}\n"),
                &ctx.load_context("/work"),
            )
            .unwrap()
        };

        let first = operations.create_or_update(&mut load("datasets/iris/")).unwrap();
        let again = operations.create_or_update(&mut load("datasets/iris/")).unwrap();
        let err = operations
            .create_or_update(&mut load("datasets/other/"))
            .unwrap_err();

        assert_eq!(first.id, again.id);
        assert!(matches!(
            err,
            Error::AssetChanged { name, version, .. } if name == "iris" && version == "1"
        ));
        assert_eq!(transport.count(Method::Put), 1);
    }

    #[test]
    fn remote_path_is_registered_without_upload() {
        let transport = RecordingTransport::new();
        let (ctx, uploader) = service_context(transport.clone());
        let mut data: Data = load_str(
            "name: iris\nversion: 2\ndatastore: lake\npath: datasets/iris/\n",
            &ctx.load_context("/work"),
        )
        .unwrap();

        let created = DataOperations::new(&ctx).create_or_update(&mut data).unwrap();

        assert!(uploader.uploads().is_empty());
        assert_eq!(transport.count(Method::Put), 1);
        assert_eq!(created.version.as_deref(), Some("2"));
        assert!(created.datastore_id.unwrap().ends_with("/datastores/lake"));
    }
}
