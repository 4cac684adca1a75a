//! Hyperparameter sweeps over a command trial.

use mlctl_client::schemas::{
    ArmResource, CommandJobProperties, EarlyTerminationPolicy, EvaluationConfiguration, JobProperties,
    ParameterSamplingConfiguration, SweepJobProperties, TerminationConfiguration, TrialJob,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumString};

use super::command::{CommandJob, CommandJobSchema};
use super::compute::ComputeBinding;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::schema::{LoadContext, Nested, Schema};

static PYTHON_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*python\s*").expect("python pattern is valid"));

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum SamplingAlgorithm {
    #[default]
    Random,
    Grid,
    Bayesian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Goal {
    Maximize,
    Minimize,
}

/// Distribution a hyperparameter is sampled from, keyed by `spec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "spec", rename_all = "lowercase", deny_unknown_fields)]
pub enum SearchSpace {
    Choice { values: Vec<Value> },
    Uniform { min_value: f64, max_value: f64 },
}

impl SearchSpace {
    /// `["choice", [[values...]]]` or `["uniform", [min, max]]`.
    pub fn to_rest(&self) -> Value {
        match self {
            SearchSpace::Choice { values } => json!(["choice", [values]]),
            SearchSpace::Uniform {
                min_value,
                max_value,
            } => json!(["uniform", [min_value, max_value]]),
        }
    }

    pub fn from_rest(expression: &Value) -> Option<Self> {
        let [kind, arguments] = expression.as_array()?.as_slice() else {
            return None;
        };
        match (kind.as_str()?, arguments.as_array()?.as_slice()) {
            ("choice", [values]) => Some(SearchSpace::Choice {
                values: values.as_array()?.clone(),
            }),
            ("uniform", [min, max]) => Some(SearchSpace::Uniform {
                min_value: min.as_f64()?,
                max_value: max.as_f64()?,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Objective {
    pub primary_metric: String,
    pub goal: Goal,
}

/// Early stopping policy, keyed by `spec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "spec", rename_all = "lowercase", deny_unknown_fields)]
pub enum EarlyTermination {
    Bandit {
        #[serde(default)]
        evaluation_interval: u32,
        #[serde(default)]
        delay_evaluation: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slack_factor: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slack_amount: Option<f64>,
    },
    Median {
        #[serde(default)]
        evaluation_interval: u32,
        #[serde(default)]
        delay_evaluation: u32,
    },
    Truncation {
        #[serde(default)]
        evaluation_interval: u32,
        #[serde(default)]
        delay_evaluation: u32,
        truncation_percentage: u32,
        #[serde(default)]
        exclude_finished_jobs: bool,
    },
}

impl From<&EarlyTermination> for EarlyTerminationPolicy {
    fn from(policy: &EarlyTermination) -> Self {
        match *policy {
            EarlyTermination::Bandit {
                evaluation_interval,
                delay_evaluation,
                slack_factor,
                slack_amount,
            } => EarlyTerminationPolicy::Bandit {
                evaluation_interval,
                delay_evaluation,
                slack_factor,
                slack_amount,
            },
            EarlyTermination::Median {
                evaluation_interval,
                delay_evaluation,
            } => EarlyTerminationPolicy::MedianStopping {
                evaluation_interval,
                delay_evaluation,
            },
            EarlyTermination::Truncation {
                evaluation_interval,
                delay_evaluation,
                truncation_percentage,
                exclude_finished_jobs,
            } => EarlyTerminationPolicy::TruncationSelection {
                evaluation_interval,
                delay_evaluation,
                truncation_percentage,
                exclude_finished_jobs,
            },
        }
    }
}

impl From<EarlyTerminationPolicy> for EarlyTermination {
    fn from(policy: EarlyTerminationPolicy) -> Self {
        match policy {
            EarlyTerminationPolicy::Bandit {
                evaluation_interval,
                delay_evaluation,
                slack_factor,
                slack_amount,
            } => EarlyTermination::Bandit {
                evaluation_interval,
                delay_evaluation,
                slack_factor,
                slack_amount,
            },
            EarlyTerminationPolicy::MedianStopping {
                evaluation_interval,
                delay_evaluation,
            } => EarlyTermination::Median {
                evaluation_interval,
                delay_evaluation,
            },
            EarlyTerminationPolicy::TruncationSelection {
                evaluation_interval,
                delay_evaluation,
                truncation_percentage,
                exclude_finished_jobs,
            } => EarlyTermination::Truncation {
                evaluation_interval,
                delay_evaluation,
                truncation_percentage,
                exclude_finished_jobs,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_runs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_runs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepJobSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub algorithm: SamplingAlgorithm,
    pub search_space: BTreeMap<String, SearchSpace>,
    pub objective: Objective,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_termination: Option<EarlyTermination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<SweepLimits>,
    pub trial: Nested<CommandJobSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepJob {
    pub name: Option<String>,
    pub experiment_name: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub algorithm: SamplingAlgorithm,
    pub search_space: BTreeMap<String, SearchSpace>,
    pub objective: Objective,
    pub early_termination: Option<EarlyTermination>,
    pub limits: SweepLimits,
    pub trial: CommandJob,
    pub status: Option<String>,
    pub id: Option<String>,
}

/// Removes the interpreter and every `--<param> {search_space.<param>}` pair
/// from a trial command; the service appends the sampled values itself.
pub fn strip_sweep_arguments<'a>(
    command: &str,
    parameters: impl IntoIterator<Item = &'a String>,
) -> String {
    let mut stripped = PYTHON_PREFIX.replacen(command, 1, "").into_owned();
    for parameter in parameters {
        let pattern = format!(
            r"\s*--{name} \{{search_space\.{name}\}}\s*",
            name = regex::escape(parameter)
        );
        if let Ok(argument) = Regex::new(&pattern) {
            stripped = argument.replace_all(&stripped, " ").into_owned();
        }
    }
    stripped.trim().to_string()
}

impl SweepJob {
    pub fn translate_to_rest_object(&self) -> Result<ArmResource<JobProperties>, Error> {
        if self.name.is_none() {
            return Err(Error::MissingRequiredField {
                entity: "sweep job",
                field: "name",
            });
        }
        self.trial.check_required("trial", false)?;

        let mut run = self.trial.run_configuration()?;
        run.code_configuration.command =
            strip_sweep_arguments(&run.code_configuration.command, self.search_space.keys());
        let compute_binding = self
            .trial
            .compute
            .as_ref()
            .map(ComputeBinding::to_rest)
            .transpose()?
            .unwrap_or_default();

        let properties = SweepJobProperties {
            experiment_name: self.experiment_name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            compute_binding,
            parameter_sampling_configuration: ParameterSamplingConfiguration {
                parameter_space: self
                    .search_space
                    .iter()
                    .map(|(name, space)| (name.clone(), space.to_rest()))
                    .collect(),
                sampling_type: self.algorithm.to_string(),
            },
            termination_configuration: TerminationConfiguration {
                max_total_runs: self.limits.max_total_runs,
                max_concurrent_runs: self.limits.max_concurrent_runs,
                max_duration_minutes: self.limits.max_duration_minutes,
                early_termination_policy_configuration: self
                    .early_termination
                    .as_ref()
                    .map(Into::into),
            },
            evaluation_configuration: EvaluationConfiguration {
                primary_metric_name: self.objective.primary_metric.clone(),
                primary_metric_goal: self.objective.goal.to_string(),
            },
            trial_job: TrialJob {
                code_configuration: run.code_configuration,
                environment_id: run.environment_id,
                data_bindings: run.bound.data_bindings,
                distribution_configuration: self.trial.distribution.as_ref().map(Into::into),
            },
            status: None,
        };

        let mut resource = ArmResource::new(JobProperties::Sweep(properties));
        resource.name = self.name.clone();
        Ok(resource)
    }

    pub(crate) fn from_rest_properties(
        name: Option<String>,
        id: Option<String>,
        properties: SweepJobProperties,
    ) -> Result<Self, Error> {
        let sampling = properties.parameter_sampling_configuration;
        let mut search_space = BTreeMap::new();
        for (parameter, expression) in &sampling.parameter_space {
            let space = SearchSpace::from_rest(expression).ok_or_else(|| {
                ValidationErrors::single(
                    format!("search_space.{parameter}"),
                    format!("unsupported expression {expression}"),
                )
            })?;
            search_space.insert(parameter.clone(), space);
        }

        let unknown = |field: &str, value: &str| {
            ValidationErrors::single(field, format!("unknown value {value}"))
        };
        let algorithm = SamplingAlgorithm::from_str(&sampling.sampling_type)
            .map_err(|_| unknown("algorithm", &sampling.sampling_type))?;
        let evaluation = properties.evaluation_configuration;
        let goal = Goal::from_str(&evaluation.primary_metric_goal)
            .map_err(|_| unknown("objective.goal", &evaluation.primary_metric_goal))?;

        let trial_job = properties.trial_job;
        let trial_properties = CommandJobProperties {
            experiment_name: None,
            description: None,
            properties: BTreeMap::new(),
            tags: BTreeMap::new(),
            compute_binding: properties.compute_binding,
            code_configuration: trial_job.code_configuration,
            environment_id: trial_job.environment_id,
            data_bindings: trial_job.data_bindings,
            distribution_configuration: trial_job.distribution_configuration,
            max_run_duration_seconds: None,
            status: None,
            interaction_endpoints: None,
        };
        let termination = properties.termination_configuration;
        let mut trial = CommandJob::from_rest_properties(None, None, trial_properties);
        trial.command = trial.command.map(|command| format!("python {command}"));

        Ok(Self {
            name,
            experiment_name: properties.experiment_name,
            description: properties.description,
            tags: properties.tags,
            algorithm,
            search_space,
            objective: Objective {
                primary_metric: evaluation.primary_metric_name,
                goal,
            },
            early_termination: termination
                .early_termination_policy_configuration
                .map(Into::into),
            limits: SweepLimits {
                max_total_runs: termination.max_total_runs,
                max_concurrent_runs: termination.max_concurrent_runs,
                max_duration_minutes: termination.max_duration_minutes,
            },
            trial,
            status: properties.status,
            id,
        })
    }
}

impl Schema for SweepJob {
    type Document = SweepJobSchema;

    fn from_document(doc: SweepJobSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        let trial: CommandJob = doc.trial.load(ctx).map_err(|e| e.within("trial"))?;
        Ok(Self {
            name: doc.name,
            experiment_name: doc.experiment_name,
            description: doc.description,
            tags: doc.tags,
            algorithm: doc.algorithm,
            search_space: doc.search_space,
            objective: doc.objective,
            early_termination: doc.early_termination,
            limits: doc.limits.unwrap_or_default(),
            trial,
            status: doc.status,
            id: None,
        })
    }

    fn to_document(&self) -> Result<SweepJobSchema, ValidationErrors> {
        let limits = (self.limits != SweepLimits::default()).then(|| self.limits.clone());
        Ok(SweepJobSchema {
            name: self.name.clone(),
            experiment_name: self.experiment_name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            algorithm: self.algorithm,
            search_space: self.search_space.clone(),
            objective: self.objective.clone(),
            early_termination: self.early_termination.clone(),
            limits,
            trial: Nested::Inline(self.trial.to_document()?),
            status: self.status.clone(),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        match self.trial.command.as_deref() {
            Some(command) if !command.trim_start().starts_with("python ") => {
                errors.push(ValidationError::new(
                    "trial.command",
                    "Specified command in trial does not start with python",
                ));
            }
            _ => {}
        }
        for (name, space) in &self.search_space {
            match space {
                SearchSpace::Choice { values } if values.is_empty() => errors.push(
                    ValidationError::new(format!("search_space.{name}.values"), "must not be empty"),
                ),
                SearchSpace::Uniform {
                    min_value,
                    max_value,
                } if min_value > max_value => errors.push(ValidationError::new(
                    format!("search_space.{name}"),
                    "min_value must not exceed max_value",
                )),
                _ => {}
            }
        }
        if let Some(EarlyTermination::Truncation {
            truncation_percentage,
            ..
        }) = self.early_termination
        {
            if !(1..=99).contains(&truncation_percentage) {
                errors.push(ValidationError::new(
                    "early_termination.truncation_percentage",
                    "must be between 1 and 99",
                ));
            }
        }
        errors
    }
}
