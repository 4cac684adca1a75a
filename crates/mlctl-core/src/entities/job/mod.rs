//! Command and sweep jobs.

pub mod command;
pub mod compute;
pub mod distribution;
pub mod inputs;
pub mod sweep;

pub use command::{CommandJob, CommandJobSchema};
pub use compute::{ComputeBinding, ComputeBindingSchema};
pub use distribution::Distribution;
pub use inputs::{
    BoundCommand, InputEntry, InputPort, InputValue, PortType, bind_inputs, unbind_inputs,
};
pub use sweep::{SweepJob, SweepJobSchema};

use mlctl_client::schemas::{ArmResource, JobProperties};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use serde_yaml::Value as YamlValue;

use crate::error::{Error, ValidationError, ValidationErrors};
use crate::schema::{LoadContext, Schema};

const JOB_TYPE_KEY: &str = "job_type";

/// Remote states after which a job no longer changes.
pub const TERMINAL_STATES: [&str; 5] =
    ["Completed", "Failed", "Canceled", "NotResponding", "Paused"];

pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATES.contains(&status)
}

/// Job document, discriminated by `job_type`. A missing key means a command job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSchema {
    Command(CommandJobSchema),
    Sweep(SweepJobSchema),
}

impl<'de> Deserialize<'de> for JobSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = YamlValue::deserialize(deserializer)?;
        let job_type = match value.as_mapping_mut() {
            Some(mapping) => mapping.remove(JOB_TYPE_KEY),
            None => return Err(D::Error::custom("a job document must be a mapping")),
        };

        match job_type.as_ref().and_then(YamlValue::as_str) {
            None => serde_yaml::from_value(value).map(JobSchema::Command),
            Some(kind) if kind.eq_ignore_ascii_case("command") => {
                serde_yaml::from_value(value).map(JobSchema::Command)
            }
            Some(kind) if kind.eq_ignore_ascii_case("sweep") => {
                serde_yaml::from_value(value).map(JobSchema::Sweep)
            }
            Some(kind) => {
                return Err(D::Error::custom(format!(
                    "unknown job_type {kind}, expected Command or Sweep"
                )));
            }
        }
        .map_err(D::Error::custom)
    }
}

impl Serialize for JobSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (job_type, value) = match self {
            JobSchema::Command(doc) => ("Command", serde_yaml::to_value(doc)),
            JobSchema::Sweep(doc) => ("Sweep", serde_yaml::to_value(doc)),
        };
        let mut value = value.map_err(S::Error::custom)?;
        if let Some(mapping) = value.as_mapping_mut() {
            mapping.insert(JOB_TYPE_KEY.into(), job_type.into());
        }
        value.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Command(CommandJob),
    Sweep(SweepJob),
}

impl Job {
    pub fn name(&self) -> Option<&str> {
        match self {
            Job::Command(job) => job.name.as_deref(),
            Job::Sweep(job) => job.name.as_deref(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = Some(name.into());
        match self {
            Job::Command(job) => job.name = name,
            Job::Sweep(job) => job.name = name,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            Job::Command(job) => job.status.as_deref(),
            Job::Sweep(job) => job.status.as_deref(),
        }
    }

    /// The command job that actually runs: the job itself or the sweep trial.
    pub fn run_definition_mut(&mut self) -> &mut CommandJob {
        match self {
            Job::Command(job) => job,
            Job::Sweep(job) => &mut job.trial,
        }
    }

    pub fn translate_to_rest_object(&self) -> Result<ArmResource<JobProperties>, Error> {
        match self {
            Job::Command(job) => job.translate_to_rest_object(),
            Job::Sweep(job) => job.translate_to_rest_object(),
        }
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<JobProperties>()?;
        let name = resource.name.clone();
        let id = resource.id.clone();
        match resource.properties {
            JobProperties::Command(properties) => Ok(Job::Command(
                CommandJob::from_rest_properties(name, id, properties),
            )),
            JobProperties::Sweep(properties) => Ok(Job::Sweep(SweepJob::from_rest_properties(
                name, id, properties,
            )?)),
        }
    }
}

impl Schema for Job {
    type Document = JobSchema;

    fn from_document(doc: JobSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        match doc {
            JobSchema::Command(doc) => {
                let job = CommandJob::from_document(doc, ctx)?;
                ValidationErrors::from(job.validate()).into_result()?;
                Ok(Job::Command(job))
            }
            JobSchema::Sweep(doc) => {
                let job = SweepJob::from_document(doc, ctx)?;
                ValidationErrors::from(job.validate()).into_result()?;
                Ok(Job::Sweep(job))
            }
        }
    }

    fn to_document(&self) -> Result<JobSchema, ValidationErrors> {
        match self {
            Job::Command(job) => job.to_document().map(JobSchema::Command),
            Job::Sweep(job) => job.to_document().map(JobSchema::Sweep),
        }
    }

    // Variant validation already ran in `from_document`.
    fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }
}
