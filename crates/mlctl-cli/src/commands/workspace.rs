use clap::{Args, Subcommand};
use mlctl_core::operations::Workspace;

use crate::context::{CliContext, WorkspaceArgs};
use crate::{print_info, print_success};

/// Workspace commands act on the resource group of the selected scope; the
/// workspace named by `--workspace-name` only matters for `show` without a name.
#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Create a workspace and wait for it to provision.
    Create(CreateArgs),
    /// Show a workspace.
    Show(OptionalNameArgs),
    /// List the workspaces of the resource group.
    List,
    /// Delete a workspace and wait for it to disappear.
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long, short = 'n')]
    pub name: String,
    /// Region; the resource group's region is used when omitted.
    #[arg(long, short = 'l')]
    pub location: Option<String>,
}

#[derive(Args, Debug)]
pub struct OptionalNameArgs {
    #[arg(long, short = 'n')]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[arg(long, short = 'n')]
    pub name: String,
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn handle_command(
    command: WorkspaceCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    // The scope needs a workspace name even when the command targets another one.
    let mut scope_args = workspace.clone();
    if scope_args.workspace_name.is_none() {
        if let WorkspaceCommand::Create(CreateArgs { name, .. })
        | WorkspaceCommand::Delete(DeleteArgs { name, .. }) = &command
        {
            scope_args.workspace_name = Some(name.clone());
        }
    }
    let client = context.create_client(&scope_args)?;
    let terminal = context.terminal();
    let workspaces = client.workspaces();

    match command {
        WorkspaceCommand::Create(args) => {
            print_info!("Provisioning workspace {}", args.name);
            let created = workspaces.create_or_update(&Workspace::new(args.name, args.location))?;
            print_success!("Workspace {} is ready", created.name);
            terminal.print_document(&serde_yaml::to_string(&created)?);
        }
        WorkspaceCommand::Show(args) => {
            let name = args
                .name
                .unwrap_or_else(|| client.context().scope().workspace_name.clone());
            terminal.print_document(&serde_yaml::to_string(&workspaces.get(&name)?)?);
        }
        WorkspaceCommand::List => {
            terminal.print_document(&serde_yaml::to_string(&workspaces.list()?)?)
        }
        WorkspaceCommand::Delete(args) => {
            let confirmed = args.yes
                || terminal.read_confirmation(&format!(
                    "Delete workspace {} and everything registered in it?",
                    args.name
                ))?;
            if !confirmed {
                print_info!("Nothing deleted");
                return Ok(());
            }
            workspaces.delete(&args.name)?;
            print_success!("Deleted workspace {}", args.name);
        }
    }
    Ok(())
}
