use clap::{Parser, Subcommand};
use mlctl_core::CancellationToken;

use crate::commands;
use crate::config::Config;
use crate::context::{CliContext, WorkspaceArgs};
use crate::logging::init_logger;
use crate::terminal::Terminal;
use crate::{print_err, print_warn};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Show progress of the underlying requests.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit and manage training jobs.
    #[command(subcommand)]
    Job(commands::job::JobCommand),
    /// Register and inspect models.
    #[command(subcommand)]
    Model(commands::model::ModelCommand),
    /// Upload and inspect code snapshots.
    #[command(subcommand)]
    Code(commands::code::CodeCommand),
    /// Register and inspect data assets.
    #[command(subcommand)]
    Data(commands::data::DataCommand),
    /// Register and inspect environments.
    #[command(subcommand)]
    Environment(commands::environment::EnvironmentCommand),
    /// Manage online and batch endpoints.
    #[command(subcommand)]
    Endpoint(commands::endpoint::EndpointCommand),
    /// Inspect the compute targets of the workspace.
    #[command(subcommand)]
    Compute(commands::compute::ComputeCommand),
    /// Inspect the datastores of the workspace.
    #[command(subcommand)]
    Datastore(commands::datastore::DatastoreCommand),
    /// Manage workspaces.
    #[command(subcommand)]
    Workspace(commands::workspace::WorkspaceCommand),
    /// Store the global workspace flags as defaults.
    Configure(commands::configure::ConfigureArgs),
}

/// Parses the arguments, runs the command and returns the process exit code.
pub fn cli_main(config: Config) -> i32 {
    let args = CliArgs::parse();
    init_logger(args.verbose);

    let cancellation = CancellationToken::new();
    let handler_token = cancellation.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        print_warn!("Ctrl-C will not interrupt waits: {e}");
    }

    let context = CliContext::new(Terminal::new(), &config, cancellation);
    match handle_command(args.command, &args.workspace, &context) {
        Ok(()) => 0,
        Err(e) => {
            print_err!("{e:#}");
            1
        }
    }
}

fn handle_command(
    command: Commands,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    match command {
        Commands::Job(cmd) => commands::job::handle_command(cmd, workspace, context),
        Commands::Model(cmd) => commands::model::handle_command(cmd, workspace, context),
        Commands::Code(cmd) => commands::code::handle_command(cmd, workspace, context),
        Commands::Data(cmd) => commands::data::handle_command(cmd, workspace, context),
        Commands::Environment(cmd) => {
            commands::environment::handle_command(cmd, workspace, context)
        }
        Commands::Endpoint(cmd) => commands::endpoint::handle_command(cmd, workspace, context),
        Commands::Compute(cmd) => commands::compute::handle_command(cmd, workspace, context),
        Commands::Datastore(cmd) => commands::datastore::handle_command(cmd, workspace, context),
        Commands::Workspace(cmd) => commands::workspace::handle_command(cmd, workspace, context),
        Commands::Configure(args) => commands::configure::handle_command(args, workspace, context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use commands::job::JobCommand;
    use rstest::rstest;

    #[test]
    fn command_tree_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let args = CliArgs::try_parse_from([
            "mlctl",
            "job",
            "create",
            "-f",
            "job.yml",
            "--set",
            "compute.target=gpu",
            "-w",
            "ws",
            "--verbose",
        ])
        .unwrap();

        assert!(args.verbose);
        assert_eq!(args.workspace.workspace_name.as_deref(), Some("ws"));
        match args.command {
            Commands::Job(JobCommand::Create(create)) => {
                assert_eq!(
                    create.file.overrides,
                    vec![("compute.target".to_string(), "gpu".to_string())]
                );
                assert!(!create.stream);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn batch_endpoints_and_computes_are_reachable() {
        let args =
            CliArgs::try_parse_from(["mlctl", "endpoint", "create", "-f", "e.yml", "--type", "batch"])
                .unwrap();
        assert!(matches!(args.command, Commands::Endpoint(_)));

        let args = CliArgs::try_parse_from(["mlctl", "compute", "show", "-n", "cpu-cluster"]).unwrap();
        assert!(matches!(args.command, Commands::Compute(_)));
    }

    #[rstest]
    #[case(&["mlctl", "endpoint", "list", "--type", "streaming"])]
    #[case(&["mlctl", "job", "create", "-f", "job.yml", "--set", "no-equals"])]
    #[case(&["mlctl", "model", "show"])]
    #[case(&["mlctl", "endpoint", "delete"])]
    fn invalid_invocations_are_rejected(#[case] argv: &[&str]) {
        assert!(CliArgs::try_parse_from(argv).is_err());
    }
}
