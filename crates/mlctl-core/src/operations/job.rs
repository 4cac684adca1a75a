use mlctl_client::api::API_VERSION_2020_09_01_PREVIEW;

use super::ServiceContext;
use super::lro::PollStatus;
use crate::arm_id::AssetKind;
use crate::entities::Job;
use crate::entities::job::is_terminal;
use crate::error::Error;
use crate::orchestrator::OperationOrchestrator;

const KIND: AssetKind = AssetKind::Job;

pub struct JobOperations<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> JobOperations<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    fn path(&self, name: &str) -> String {
        self.ctx.resource_path(KIND, name)
    }

    pub fn get(&self, name: &str) -> Result<Job, Error> {
        let resource = self.ctx.get(
            &self.path(name),
            API_VERSION_2020_09_01_PREVIEW,
            &[],
            KIND.label(),
            name,
        )?;
        Job::from_rest(resource)
    }

    pub fn list(&self) -> Result<Vec<Job>, Error> {
        self.ctx
            .list(
                &self.ctx.collection(KIND),
                API_VERSION_2020_09_01_PREVIEW,
                &[],
            )?
            .into_iter()
            .map(Job::from_rest)
            .collect()
    }

    /// Resolves every reference the job carries and submits it.
    ///
    /// A job without a name (a sweep may omit it) is given a fresh GUID.
    pub fn create_or_update(&self, job: &mut Job) -> Result<Job, Error> {
        OperationOrchestrator::new(self.ctx).resolve_job(job)?;
        let name = match job.name() {
            Some(name) => name.to_string(),
            None => {
                let name = uuid::Uuid::new_v4().to_string();
                job.set_name(name.clone());
                name
            }
        };

        let submitted = self.ctx.put(
            &self.path(&name),
            API_VERSION_2020_09_01_PREVIEW,
            &job.translate_to_rest_object()?,
        )?;
        log::info!("Submitted job {name}");
        Job::from_rest(submitted)
    }

    /// Asks the service to cancel the run. Returns once the request is accepted.
    pub fn cancel(&self, name: &str) -> Result<(), Error> {
        self.ctx.post(
            &format!("{}/cancel", self.path(name)),
            API_VERSION_2020_09_01_PREVIEW,
        )?;
        log::info!("Requested cancellation of job {name}");
        Ok(())
    }

    /// Polls the job until its status is terminal and returns it.
    ///
    /// A job that ends `Failed` is returned like any other; callers read the
    /// status to decide what to do.
    pub fn wait(&self, name: &str) -> Result<Job, Error> {
        self.ctx.poller().poll(&format!("job {name}"), || {
            let job = self.get(name)?;
            match job.status() {
                Some(status) if is_terminal(status) => Ok(PollStatus::Done(job)),
                status => {
                    log::debug!("Job {name} is {}", status.unwrap_or("pending"));
                    Ok(PollStatus::Pending)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::lro::{CancellationToken, Poller};
    use crate::operations::testing::{Method, RecordingTransport, service_context};
    use crate::schema::{LoadContext, load_str};
    use serde_json::{Value, json};
    use std::time::Duration;

    fn job_body(status: &str) -> Value {
        json!({
            "name": "j1",
            "properties": {
                "jobType": "Command",
                "computeBinding": {"computeId": "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/computes/cpu"},
                "codeConfiguration": {"command": "python train.py"},
                "status": status
            }
        })
    }

    #[test]
    fn submit_resolves_compute_and_environment() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        transport.seed(
            &ctx.version_path(AssetKind::Environment, "sklearn-env", "1"),
            json!({"properties": {"properties": {"DockerImageUri": "img"}}}),
        );
        let mut job: Job = load_str(
            "name: j1\ncompute:\n  target: azureml:cpu\ncommand: python train.py\nenvironment: azureml:sklearn-env:1\n",
            &LoadContext::new("/work"),
        )
        .unwrap();

        let submitted = JobOperations::new(&ctx).create_or_update(&mut job).unwrap();

        assert_eq!(submitted.name(), Some("j1"));
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, Method::Get);
        let put = &calls[1];
        assert_eq!(put.method, Method::Put);
        assert!(put.path.ends_with("/workspaces/ws/jobs/j1"));
        let body = put.body.as_ref().unwrap();
        assert!(
            body["properties"]["computeBinding"]["computeId"]
                .as_str()
                .unwrap()
                .ends_with("/workspaces/ws/computes/cpu")
        );
        assert!(
            body["properties"]["environmentId"]
                .as_str()
                .unwrap()
                .ends_with("/environments/sklearn-env/versions/1")
        );
    }

    #[test]
    fn cancel_posts_to_the_cancel_action() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());

        JobOperations::new(&ctx).cancel("j1").unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.method, Method::Post);
        assert!(call.path.ends_with("/jobs/j1/cancel"));
        assert_eq!(call.api_version, API_VERSION_2020_09_01_PREVIEW);
    }

    #[test]
    fn wait_returns_on_a_terminal_status() {
        let transport = RecordingTransport::new();
        let (ctx, _) = service_context(transport.clone());
        let path = ctx.resource_path(KIND, "j1");
        transport.script(
            Method::Get,
            &path,
            vec![
                Ok(job_body("Running")),
                Ok(job_body("Running")),
                Ok(job_body("Failed")),
            ],
        );

        let job = JobOperations::new(&ctx).wait("j1").unwrap();
        assert_eq!(job.status(), Some("Failed"));
        assert_eq!(transport.count(Method::Get), 3);
    }

    #[test]
    fn cancelled_wait_is_interrupted() {
        let transport = RecordingTransport::new();
        let (mut ctx, _) = service_context(transport.clone());
        let token = CancellationToken::new();
        token.cancel();
        ctx.poller = Poller::new(Duration::ZERO, token);

        let err = JobOperations::new(&ctx).wait("j1").unwrap_err();
        assert!(matches!(err, Error::Interrupted { .. }));
        assert!(transport.calls().is_empty());
    }
}
