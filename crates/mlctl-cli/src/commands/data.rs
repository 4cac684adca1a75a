use clap::{Args, Subcommand};
use mlctl_core::entities::Data;

use super::{FileArgs, print_entities, print_entity};
use crate::context::{CliContext, WorkspaceArgs};
use crate::print_success;

#[derive(Subcommand, Debug)]
pub enum DataCommand {
    /// Register a data version, uploading local files first.
    Create(FileArgs),
    /// Show a data version, the latest one when no version is given.
    Show(ShowArgs),
    /// List the versions of a data asset.
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
    command: DataCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();
    let data = client.data();

    match command {
        DataCommand::Create(file) => {
            let mut asset: Data = file.load(&client)?;
            let created = data.create_or_update(&mut asset)?;
            print_success!("Registered data {}", created.name);
            print_entity(terminal, &created)?;
        }
        DataCommand::Show(args) => {
            let asset = match args.version {
                Some(version) => data.get(&args.name, &version)?,
                None => data.get_latest(&args.name)?,
            };
            print_entity(terminal, &asset)?;
        }
        DataCommand::List(args) => print_entities(terminal, &data.list(&args.name)?)?,
    }
    Ok(())
}
