//! In-memory resources and their wire translation.
//!
//! Every entity loads from its document through [`crate::schema::Schema`],
//! translates to the REST envelope with `translate_to_rest_object` and is
//! rebuilt from a service response with `from_rest`.

pub mod code_asset;
pub mod data;
pub mod endpoint;
pub mod environment;
pub mod job;
pub mod model;

pub use code_asset::CodeAsset;
pub use data::Data;
pub use endpoint::{BatchDeployment, BatchEndpoint, OnlineDeployment, OnlineEndpoint};
pub use environment::Environment;
pub use job::{CommandJob, Job, SweepJob};
pub use model::Model;

use mlctl_client::schemas::ArmResource;

use crate::arm_id::ArmId;
use crate::error::{Error, ReferenceError};
use crate::reference::Reference;

/// Container name and version of a versioned resource, read from its id.
pub(crate) fn rest_identity<P>(resource: &ArmResource<P>) -> (Option<String>, Option<String>) {
    match resource.id.as_deref().map(str::parse::<ArmId>) {
        Some(Ok(id)) => (Some(id.name), id.version),
        _ => (resource.name.clone(), None),
    }
}

/// Canonical id of a reference that must already be resolved.
pub(crate) fn resolved_id<T>(reference: &Reference<T>, field: &str) -> Result<String, Error> {
    reference.canonical_id().map(str::to_string).ok_or_else(|| {
        Error::Reference(ReferenceError::Unresolved {
            field: field.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceScope;
    use crate::schema::{LoadContext, Schema, load_str};
    use rstest::rstest;

    type Loader = fn(&str, &LoadContext) -> Result<(), Error>;

    fn load_as<S: Schema>(yaml: &str, ctx: &LoadContext) -> Result<(), Error> {
        load_str::<S>(yaml, ctx).map(|_| ())
    }

    const SWEEP: &str = "name: s\nalgorithm: random\nsearch_space:\n  lr:\n    spec: uniform\n    min_value: 0.001\n    max_value: 0.1\nobjective:\n  primary_metric: accuracy\n  goal: maximize\ntrial:\n  command: python train.py --lr {search_space.lr}\n  environment: azureml:sklearn-env:1\n";

    const ENDPOINT: &str = "name: e\ninfrastructure: azureml:aks-cluster\n";

    const DEPLOYMENT: &str = "name: blue\nmodel: azureml:m:1\nenvironment: azureml:env:1\nsku: Standard_F2s_v2\n";

    const BATCH_DEPLOYMENT: &str = "name: blue\nmodel: azureml:m:1\ncompute:\n  target: azureml:cpu-cluster\n";

    #[rstest]
    #[case::model(load_as::<Model>, "name: m\nversion: 1\npath: model.pkl\n")]
    #[case::environment(load_as::<Environment>, "name: env\ndocker:\n  image: python:3.8\n")]
    #[case::data(load_as::<Data>, "name: d\nversion: 1\npath: raw/iris/\n")]
    #[case::code(load_as::<CodeAsset>, "name: c\nversion: 1\ndirectory: src\n")]
    #[case::command_job(load_as::<CommandJob>, "name: j\ncommand: echo hi\n")]
    #[case::sweep_job(load_as::<SweepJob>, SWEEP)]
    #[case::online_endpoint(load_as::<OnlineEndpoint>, ENDPOINT)]
    #[case::online_deployment(load_as::<OnlineDeployment>, DEPLOYMENT)]
    #[case::batch_endpoint(load_as::<BatchEndpoint>, "name: e\ntype: batch\n")]
    #[case::batch_deployment(load_as::<BatchDeployment>, BATCH_DEPLOYMENT)]
    fn unknown_top_level_key_is_rejected(#[case] load: Loader, #[case] document: &str) {
        let ctx = LoadContext::new("/work").with_workspace(WorkspaceScope::new(
            "sub".into(),
            "rg".into(),
            "ws".into(),
        ));
        load(document, &ctx).unwrap();

        let err = load(&format!("{document}colour: red\n"), &ctx).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("colour"));
    }
}
