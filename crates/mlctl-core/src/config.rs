//! Workspace scope and client configuration.

use mlctl_client::AccessToken;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::schema::{Dialect, SchemaOptions};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com/";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const SUBSCRIPTION_ENV: &str = "MLCTL_SUBSCRIPTION_ID";
pub const RESOURCE_GROUP_ENV: &str = "MLCTL_RESOURCE_GROUP";
pub const WORKSPACE_ENV: &str = "MLCTL_WORKSPACE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {0}")]
    EnvNotSet(&'static str),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to parse endpoint URL: {0}")]
    InvalidEndpointUrl(String),
    #[error("No access token configured. Set {} or pass one explicitly", AccessToken::ENV_VAR)]
    MissingCredentials,
}

/// The workspace every resource operation is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct WorkspaceScope {
    pub subscription_id: String,
    #[serde(rename = "resource_group")]
    pub resource_group_name: String,
    pub workspace_name: String,
}

impl WorkspaceScope {
    /// Reads the scope from `MLCTL_SUBSCRIPTION_ID`, `MLCTL_RESOURCE_GROUP`
    /// and `MLCTL_WORKSPACE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let read = |name: &'static str| std::env::var(name).map_err(|_| ConfigError::EnvNotSet(name));
        Ok(Self {
            subscription_id: read(SUBSCRIPTION_ENV)?,
            resource_group_name: read(RESOURCE_GROUP_ENV)?,
            workspace_name: read(WORKSPACE_ENV)?,
        })
    }

    /// Reads a `config.json` holding `subscription_id`, `resource_group`
    /// and `workspace_name`.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn resource_group_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group_name
        )
    }

    pub fn workspace_path(&self) -> String {
        format!(
            "{}/providers/{}/workspaces/{}",
            self.resource_group_path(),
            crate::arm_id::RESOURCE_PROVIDER,
            self.workspace_name
        )
    }
}

/// Everything needed to build an [`crate::MlClient`].
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    pub scope: WorkspaceScope,
    pub endpoint: Url,
    pub credentials: AccessToken,
    pub poll_interval: Duration,
    pub options: SchemaOptions,
    /// Region for new endpoints whose document names none.
    pub location: Option<String>,
}

impl MlClientConfig {
    pub fn builder(scope: WorkspaceScope) -> MlClientConfigBuilder {
        MlClientConfigBuilder::new(scope)
    }
}

pub struct MlClientConfigBuilder {
    scope: WorkspaceScope,
    endpoint: Option<String>,
    credentials: Option<AccessToken>,
    poll_interval: Duration,
    dialect: Dialect,
    location: Option<String>,
}

impl MlClientConfigBuilder {
    pub fn new(scope: WorkspaceScope) -> Self {
        Self {
            scope,
            endpoint: None,
            credentials: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            dialect: Dialect::default(),
            location: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(mut self, credentials: AccessToken) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Falls back to `MLCTL_ACCESS_TOKEN` when no credentials were given.
    pub fn build(self) -> Result<MlClientConfig, ConfigError> {
        let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidEndpointUrl(format!("{endpoint}: {e}")))?;
        let credentials = match self.credentials {
            Some(credentials) => credentials,
            None => AccessToken::from_env().map_err(|_| ConfigError::MissingCredentials)?,
        };

        Ok(MlClientConfig {
            scope: self.scope,
            endpoint,
            credentials,
            poll_interval: self.poll_interval,
            options: SchemaOptions {
                dialect: self.dialect,
            },
            location: self.location,
        })
    }
}
