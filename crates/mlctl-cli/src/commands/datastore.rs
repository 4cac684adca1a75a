use clap::{Args, Subcommand};
use mlctl_client::storage::StorageCredential;
use mlctl_core::operations::Datastore;

use crate::context::{CliContext, WorkspaceArgs};
use crate::terminal::Terminal;

#[derive(Subcommand, Debug)]
pub enum DatastoreCommand {
    /// Show a datastore.
    Show(ShowArgs),
    /// List the datastores of the workspace.
    List,
    /// Show the workspace default datastore.
    ShowDefault,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(long, short = 'n')]
    pub name: String,
    /// Also print the storage credential.
    #[arg(long)]
    pub include_secrets: bool,
}

pub fn handle_command(
    command: DatastoreCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();
    let datastores = client.datastores();

    match command {
        DatastoreCommand::Show(args) => {
            let datastore = datastores.get(&args.name, args.include_secrets)?;
            print_datastore(terminal, &datastore)?;
            if args.include_secrets {
                print_credential(terminal, &datastore.credential);
            }
        }
        DatastoreCommand::List => {
            terminal.print_document(&serde_yaml::to_string(&datastores.list()?)?)
        }
        DatastoreCommand::ShowDefault => print_datastore(terminal, &datastores.get_default()?)?,
    }
    Ok(())
}

fn print_datastore(terminal: &Terminal, datastore: &Datastore) -> anyhow::Result<()> {
    terminal.print_document(&serde_yaml::to_string(datastore)?);
    Ok(())
}

fn print_credential(terminal: &Terminal, credential: &StorageCredential) {
    match credential {
        StorageCredential::AccountKey(key) => terminal.print(&format!("accountKey: {key}")),
        StorageCredential::Sas(token) => terminal.print(&format!("sasToken: {token}")),
        StorageCredential::None => terminal.print("credential: none"),
    }
}
