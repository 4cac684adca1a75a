use anyhow::Context as _;
use clap::Args;
use mlctl_core::config::{RESOURCE_GROUP_ENV, SUBSCRIPTION_ENV, WORKSPACE_ENV};
use mlctl_core::{CancellationToken, MlClient, MlClientConfig, WorkspaceScope};

use crate::app_config::{AppConfig, Defaults};
use crate::config::Config;
use crate::print_warn;
use crate::terminal::Terminal;

/// Workspace selection shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct WorkspaceArgs {
    /// Subscription that owns the workspace.
    #[arg(long, global = true)]
    pub subscription: Option<String>,
    /// Resource group of the workspace.
    #[arg(long, short = 'g', global = true)]
    pub resource_group: Option<String>,
    /// Workspace name.
    #[arg(long, short = 'w', global = true)]
    pub workspace_name: Option<String>,
}

impl From<&WorkspaceArgs> for Defaults {
    fn from(args: &WorkspaceArgs) -> Self {
        Defaults {
            subscription_id: args.subscription.clone(),
            resource_group: args.resource_group.clone(),
            workspace_name: args.workspace_name.clone(),
        }
    }
}

fn env_defaults() -> Defaults {
    Defaults {
        subscription_id: std::env::var(SUBSCRIPTION_ENV).ok(),
        resource_group: std::env::var(RESOURCE_GROUP_ENV).ok(),
        workspace_name: std::env::var(WORKSPACE_ENV).ok(),
    }
}

/// Flags win over the environment, which wins over the stored defaults.
pub fn resolve_scope(
    flags: &WorkspaceArgs,
    env: Defaults,
    stored: Defaults,
) -> anyhow::Result<WorkspaceScope> {
    let merged = stored.merge(env).merge(flags.into());
    let missing = |what: &str, flag: &str, var: &str| {
        anyhow::anyhow!("No {what} configured. Pass --{flag}, set {var} or run `mlctl configure`.")
    };
    Ok(WorkspaceScope::new(
        merged
            .subscription_id
            .ok_or_else(|| missing("subscription", "subscription", SUBSCRIPTION_ENV))?,
        merged
            .resource_group
            .ok_or_else(|| missing("resource group", "resource-group", RESOURCE_GROUP_ENV))?,
        merged
            .workspace_name
            .ok_or_else(|| missing("workspace", "workspace-name", WORKSPACE_ENV))?,
    ))
}

pub struct CliContext {
    terminal: Terminal,
    api_endpoint: String,
    app_config: Option<AppConfig>,
    cancellation: CancellationToken,
}

impl CliContext {
    pub fn new(terminal: Terminal, config: &Config, cancellation: CancellationToken) -> Self {
        let app_config = match AppConfig::new() {
            Ok(app_config) => Some(app_config),
            Err(e) => {
                print_warn!("Stored defaults are unavailable: {e}");
                None
            }
        };
        Self {
            terminal,
            api_endpoint: config.api_endpoint.clone(),
            app_config,
            cancellation,
        }
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    pub fn app_config(&self) -> anyhow::Result<&AppConfig> {
        self.app_config
            .as_ref()
            .context("The configuration directory could not be created")
    }

    pub fn stored_defaults(&self) -> Defaults {
        self.app_config
            .as_ref()
            .and_then(|config| config.load_defaults().ok())
            .unwrap_or_default()
    }

    pub fn scope(&self, args: &WorkspaceArgs) -> anyhow::Result<WorkspaceScope> {
        resolve_scope(args, env_defaults(), self.stored_defaults())
    }

    /// Builds a client whose waits stop on Ctrl-C.
    pub fn create_client(&self, args: &WorkspaceArgs) -> anyhow::Result<MlClient> {
        let scope = self.scope(args)?;
        log::debug!("Using workspace {}", scope.workspace_path());
        let config = MlClientConfig::builder(scope)
            .with_endpoint(self.api_endpoint.clone())
            .build()
            .context("Failed to configure the client")?;
        Ok(MlClient::from_config(config).with_cancellation(self.cancellation.clone()))
    }
}
