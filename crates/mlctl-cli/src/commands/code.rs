use clap::{Args, Subcommand};
use mlctl_core::entities::CodeAsset;

use super::{FileArgs, print_entities, print_entity};
use crate::context::{CliContext, WorkspaceArgs};
use crate::print_success;

#[derive(Subcommand, Debug)]
pub enum CodeCommand {
    /// Upload and register a code snapshot.
    Create(FileArgs),
    /// Show a code version.
    Show(ShowArgs),
    /// List the versions of a code asset.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long, short = 'n')]
    pub name: String,
    #[arg(long, short = 'v')]
    pub version: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, short = 'n')]
    pub name: String,
}

pub fn handle_command(
    command: CodeCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();
    let codes = client.codes();

    match command {
        CodeCommand::Create(file) => {
            let mut asset: CodeAsset = file.load(&client)?;
            let created = codes.create_or_update(&mut asset)?;
            print_success!(
                "Registered code {}",
                created.name.as_deref().unwrap_or_default()
            );
            print_entity(terminal, &created)?;
        }
        CodeCommand::Show(args) => print_entity(terminal, &codes.get(&args.name, &args.version)?)?,
        CodeCommand::List(args) => print_entities(terminal, &codes.list(&args.name)?)?,
    }
    Ok(())
}
