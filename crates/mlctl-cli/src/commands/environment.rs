use clap::{Args, Subcommand};
use mlctl_core::entities::Environment;

use super::{FileArgs, print_entities, print_entity};
use crate::context::{CliContext, WorkspaceArgs};
use crate::print_success;

#[derive(Subcommand, Debug)]
pub enum EnvironmentCommand {
    /// Register an environment version.
    Create(FileArgs),
    /// Show an environment version, the latest one when no version is given.
    Show(ShowArgs),
    /// List the versions of an environment.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long, short = 'n')]
    pub name: String,
    #[arg(long, short = 'v')]
    pub version: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, short = 'n')]
    pub name: String,
}

pub fn handle_command(
    command: EnvironmentCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();
    let environments = client.environments();

    match command {
        EnvironmentCommand::Create(file) => {
            let environment: Environment = file.load(&client)?;
            let created = environments.create_or_update(&environment)?;
            print_success!("Registered environment {}", created.name);
            print_entity(terminal, &created)?;
        }
        EnvironmentCommand::Show(args) => {
            let environment = match args.version {
                Some(version) => environments.get(&args.name, &version)?,
                None => environments.get_latest(&args.name)?,
            };
            print_entity(terminal, &environment)?;
        }
        EnvironmentCommand::List(args) => {
            print_entities(terminal, &environments.list(&args.name)?)?
        }
    }
    Ok(())
}
