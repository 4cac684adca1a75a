use clap::{Args, Subcommand};
use mlctl_core::{MlClient, ValidationErrors};
use mlctl_core::entities::endpoint::EndpointType;
use mlctl_core::entities::{BatchEndpoint, OnlineEndpoint};
use mlctl_core::schema::Schema;

use super::{FileArgs, print_entities, print_entity};
use crate::context::{CliContext, WorkspaceArgs};
use crate::terminal::Terminal;
use crate::{print_err, print_info, print_success, print_warn};

#[derive(Subcommand, Debug)]
pub enum EndpointCommand {
    /// Create an endpoint and its deployments.
    Create(CreateArgs),
    /// Show an endpoint with its deployments.
    Show(NameArgs),
    /// List the endpoints of the workspace.
    List(TypeArgs),
    /// Delete an endpoint and its deployments.
    Delete(DeleteArgs),
    /// Print the authentication keys of an endpoint.
    ListKeys(NameArgs),
}

#[derive(Args, Debug)]
pub struct TypeArgs {
    /// online or batch.
    #[arg(long = "type", short = 't', default_value_t = EndpointType::Online)]
    pub endpoint_type: EndpointType,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub file: FileArgs,
    /// online or batch. Defaults to the document's `type`, else online.
    #[arg(long = "type", short = 't')]
    pub endpoint_type: Option<EndpointType>,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    #[arg(long, short = 'n')]
    pub name: String,
    #[command(flatten)]
    pub kind: TypeArgs,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[arg(long, short = 'n')]
    pub name: String,
    #[command(flatten)]
    pub kind: TypeArgs,
    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl CreateArgs {
    /// `--type` wins over the document's own `type` key.
    fn endpoint_type(&self) -> anyhow::Result<EndpointType> {
        if let Some(endpoint_type) = self.endpoint_type {
            return Ok(endpoint_type);
        }
        let document: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&self.file.file)?)?;
        let declared = EndpointType::declared_by(&document).map_err(ValidationErrors::from)?;
        Ok(declared.unwrap_or_default())
    }
}

pub fn handle_command(
    command: EndpointCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();

    match command {
        EndpointCommand::Create(args) => match args.endpoint_type()? {
            EndpointType::Online => create_online(&client, terminal, &args.file)?,
            EndpointType::Batch => create_batch(&client, terminal, &args.file)?,
        },
        EndpointCommand::Show(args) => match args.kind.endpoint_type {
            EndpointType::Online => {
                print_entity(terminal, &client.online_endpoints().get(&args.name)?)?
            }
            EndpointType::Batch => {
                print_entity(terminal, &client.batch_endpoints().get(&args.name)?)?
            }
        },
        EndpointCommand::List(args) => match args.endpoint_type {
            EndpointType::Online => print_entities(terminal, &client.online_endpoints().list()?)?,
            EndpointType::Batch => print_entities(terminal, &client.batch_endpoints().list()?)?,
        },
        EndpointCommand::Delete(args) => {
            let kind = args.kind.endpoint_type;
            let confirmed = args.yes
                || terminal.read_confirmation(&format!(
                    "Delete {kind} endpoint {} and all of its deployments?",
                    args.name
                ))?;
            if !confirmed {
                print_info!("Nothing deleted");
                return Ok(());
            }
            delete(&client, kind, &args.name)?;
            print_success!("Deleted {kind} endpoint {}", args.name);
        }
        EndpointCommand::ListKeys(args) => {
            let keys = match args.kind.endpoint_type {
                EndpointType::Online => client.online_endpoints().get_keys(&args.name)?,
                EndpointType::Batch => client.batch_endpoints().get_keys(&args.name)?,
            };
            terminal.print(&format!(
                "primaryKey: {}",
                keys.primary_key.unwrap_or_default()
            ));
            terminal.print(&format!(
                "secondaryKey: {}",
                keys.secondary_key.unwrap_or_default()
            ));
        }
    }
    Ok(())
}

fn create_online(client: &MlClient, terminal: &Terminal, file: &FileArgs) -> anyhow::Result<()> {
    let mut endpoint: OnlineEndpoint = file.load(client)?;
    let created = client.online_endpoints().create_or_update(&mut endpoint);
    report_created(client, terminal, EndpointType::Online, &endpoint.name, created)
}

fn create_batch(client: &MlClient, terminal: &Terminal, file: &FileArgs) -> anyhow::Result<()> {
    let mut endpoint: BatchEndpoint = file.load(client)?;
    let created = client.batch_endpoints().create_or_update(&mut endpoint);
    report_created(client, terminal, EndpointType::Batch, &endpoint.name, created)
}

fn report_created<S: Schema>(
    client: &MlClient,
    terminal: &Terminal,
    kind: EndpointType,
    name: &str,
    created: mlctl_core::Result<S>,
) -> anyhow::Result<()> {
    match created {
        Ok(created) => {
            print_success!("Created {kind} endpoint {name}");
            print_entity(terminal, &created)
        }
        Err(e) => {
            // The service keeps whatever was created before the failure.
            print_err!("Creating endpoint {name} failed, removing it");
            if let Err(cleanup) = delete(client, kind, name) {
                print_warn!("Failed to remove endpoint {name}: {cleanup}");
            }
            Err(e.into())
        }
    }
}

fn delete(client: &MlClient, kind: EndpointType, name: &str) -> mlctl_core::Result<()> {
    match kind {
        EndpointType::Online => client.online_endpoints().delete(name),
        EndpointType::Batch => client.batch_endpoints().delete(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;
    use std::io::Write;
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(subcommand)]
        command: EndpointCommand,
    }

    fn create_args(path: PathBuf, endpoint_type: Option<EndpointType>) -> CreateArgs {
        CreateArgs {
            file: FileArgs {
                file: path,
                name: None,
                version: None,
                overrides: Vec::new(),
            },
            endpoint_type,
        }
    }

    #[rstest]
    #[case("name: e\n", None, EndpointType::Online)]
    #[case("name: e\ntype: batch\n", None, EndpointType::Batch)]
    #[case("name: e\ntype: batch\n", Some(EndpointType::Online), EndpointType::Online)]
    fn create_picks_the_endpoint_type(
        #[case] document: &str,
        #[case] flag: Option<EndpointType>,
        #[case] expected: EndpointType,
    ) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(document.as_bytes()).unwrap();

        let args = create_args(file.path().to_path_buf(), flag);
        assert_eq!(args.endpoint_type().unwrap(), expected);
    }

    #[test]
    fn list_defaults_to_online_endpoints() {
        let parsed = Harness::try_parse_from(["endpoint", "list"]).unwrap();
        assert!(matches!(
            parsed.command,
            EndpointCommand::List(TypeArgs {
                endpoint_type: EndpointType::Online
            })
        ));

        let parsed = Harness::try_parse_from(["endpoint", "show", "-n", "e", "--type", "batch"])
            .unwrap();
        assert!(matches!(
            parsed.command,
            EndpointCommand::Show(NameArgs {
                kind: TypeArgs {
                    endpoint_type: EndpointType::Batch
                },
                ..
            })
        ));
    }
}
