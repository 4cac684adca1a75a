use clap::{Args, Subcommand};
use mlctl_core::entities::Model;

use super::{FileArgs, print_entities, print_entity};
use crate::context::{CliContext, WorkspaceArgs};
use crate::print_success;

#[derive(Subcommand, Debug)]
pub enum ModelCommand {
    /// Register a model version.
    Create(FileArgs),
    /// Show a model version, the latest one when no version is given.
    Show(ShowArgs),
    /// List models, or the versions of one model.
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
    pub name: Option<String>,
}

pub fn handle_command(
    command: ModelCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();
    let models = client.models();

    match command {
        ModelCommand::Create(file) => {
            let mut model: Model = file.load(&client)?;
            let created = models.create_or_update(&mut model)?;
            print_success!(
                "Registered model {} version {}",
                created.name.as_deref().unwrap_or_default(),
                created.version.as_deref().unwrap_or_default()
            );
            print_entity(terminal, &created)?;
        }
        ModelCommand::Show(args) => {
            let model = match args.version {
                Some(version) => models.get(&args.name, &version)?,
                None => models.get_latest(&args.name)?,
            };
            print_entity(terminal, &model)?;
        }
        ModelCommand::List(args) => {
            print_entities(terminal, &models.list(args.name.as_deref())?)?
        }
    }
    Ok(())
}
