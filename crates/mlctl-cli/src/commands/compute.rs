use clap::{Args, Subcommand};

use crate::context::{CliContext, WorkspaceArgs};

#[derive(Subcommand, Debug)]
pub enum ComputeCommand {
    /// Show a compute target.
    Show(ShowArgs),
    /// List the compute targets of the workspace.
    List,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long, short = 'n')]
    pub name: String,
}

pub fn handle_command(
    command: ComputeCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();
    let computes = client.computes();

    let document = match command {
        ComputeCommand::Show(args) => serde_yaml::to_string(&computes.get(&args.name)?)?,
        ComputeCommand::List => serde_yaml::to_string(&computes.list()?)?,
    };
    terminal.print_document(&document);
    Ok(())
}
