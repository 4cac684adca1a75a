//! End-to-end flows through the façades against the recording transport.

use regex::Regex;
use rstest::rstest;
use std::fs;

use super::testing::{Method, RecordingTransport, scope, service_context, with_default_datastore};
use super::{EndpointOperations, JobOperations};
use crate::entities::{CodeAsset, Job, OnlineEndpoint};
use crate::orchestrator::OperationOrchestrator;
use crate::reference::Reference;
use crate::schema::load_str;

fn write_training_code(dir: &std::path::Path) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(dir.join("src/train.py"), "import sys\nprint(sys.argv)\n").unwrap();
}

#[test]
fn submitted_job_binds_data_inputs() {
    let dir = tempfile::tempdir().unwrap();
    write_training_code(dir.path());
    let transport = RecordingTransport::new();
    with_default_datastore(&transport);
    let (ctx, _) = service_context(transport.clone());
    let ws = scope().workspace_path();
    let yaml = format!(
        "name: train-1\n\
         compute:\n  target: azureml:cpu-cluster\n\
         code: src\n\
         command: python train.py --data {{inputs.train}} --epochs {{inputs.epochs}}\n\
         environment: azureml:{ws}/environments/sklearn-env/versions/1\n\
         inputs:\n  train:\n    data: azureml:{ws}/data/iris/versions/1\n    mode: mount\n  epochs: 10\n"
    );
    let mut job: Job = load_str(&yaml, &ctx.load_context(dir.path())).unwrap();

    JobOperations::new(&ctx).create_or_update(&mut job).unwrap();

    let put = transport
        .calls()
        .into_iter()
        .filter(|c| c.method == Method::Put)
        .last()
        .unwrap();
    assert!(put.path.ends_with("/jobs/train-1"));
    let properties = &put.body.unwrap()["properties"];
    assert_eq!(
        properties["codeConfiguration"]["command"],
        "python train.py --data AZURE_ML_INPUT0 --epochs 10"
    );
    let binding = &properties["dataBindings"]["train"];
    assert_eq!(binding["localReference"], "AZURE_ML_INPUT0");
    assert_eq!(
        binding["sourceDataReference"],
        format!("{ws}/data/iris/versions/1")
    );
}

#[test]
fn local_code_is_uploaded_and_registered_once() {
    let dir = tempfile::tempdir().unwrap();
    write_training_code(dir.path());
    let transport = RecordingTransport::new();
    with_default_datastore(&transport);
    let (ctx, uploader) = service_context(transport.clone());
    let orchestrator = OperationOrchestrator::new(&ctx);
    let mut reference = Reference::Inline(CodeAsset::from_local_path("src", dir.path()));

    let id = orchestrator.resolve_code(&mut reference).unwrap();
    let calls_after_first = transport.calls().len();
    let again = orchestrator.resolve_code(&mut reference).unwrap();

    let pattern = Regex::new(
        r"/codes/[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}/versions/1$",
    )
    .unwrap();
    assert!(pattern.is_match(&id), "unexpected id {id}");
    assert_eq!(again, id);
    assert_eq!(transport.calls().len(), calls_after_first);
    assert_eq!(uploader.uploads().len(), 1);
    assert_eq!(transport.count(Method::Put), 2);
}

#[rstest]
#[case::with_location("location: eastus\n")]
#[case::without_location("")]
fn endpoint_with_resolved_references_takes_three_calls(#[case] location: &str) {
    let transport = RecordingTransport::new();
    let (ctx, _) = service_context(transport.clone());
    let ws = scope().workspace_path();
    let yaml = format!(
        "name: scoring\n\
         {location}\
         traffic:\n  blue: 100\n\
         deployments:\n  blue:\n\
         \x20   model: azureml:{ws}/models/iris/versions/1\n\
         \x20   environment: azureml:{ws}/environments/sklearn-env/versions/1\n\
         \x20   sku: Standard_F2s_v2\n\
         \x20   scale_settings:\n\
         \x20     scale_type: manual\n\
         \x20     instance_count: 1\n"
    );
    let mut endpoint: OnlineEndpoint = load_str(&yaml, &ctx.load_context("/work")).unwrap();

    let created = EndpointOperations::new(&ctx)
        .create_or_update(&mut endpoint)
        .unwrap();

    let calls = transport.calls();
    let endpoint_path = format!("{ws}/onlineEndpoints/scoring");
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.method == Method::Put));
    assert_eq!(calls[0].path, endpoint_path);
    assert_eq!(calls[1].path, format!("{endpoint_path}/deployments/blue"));
    assert_eq!(calls[2].path, endpoint_path);

    let first = calls[0].body.as_ref().unwrap();
    let last = calls[2].body.as_ref().unwrap();
    assert_eq!(first["properties"]["trafficRules"], serde_json::json!({}));
    assert_eq!(last["properties"]["trafficRules"]["blue"], 100);
    assert_eq!(created.traffic["blue"], 100);
    assert!(created.deployments.contains_key("blue"));
}
