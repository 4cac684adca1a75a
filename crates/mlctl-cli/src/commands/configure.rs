use clap::Args;

use crate::app_config::Defaults;
use crate::context::{CliContext, WorkspaceArgs};
use crate::print_success;

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    /// Print the stored defaults instead of changing them.
    #[arg(long)]
    pub list: bool,
}

/// Stores the global workspace flags as defaults, keeping fields not passed.
pub fn handle_command(
    args: ConfigureArgs,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let app_config = context.app_config()?;
    let stored = app_config.load_defaults()?;

    if args.list {
        context
            .terminal()
            .print_document(&serde_json::to_string_pretty(&stored)?);
        return Ok(());
    }

    let path = app_config.save_defaults(&stored.merge(Defaults::from(workspace)))?;
    print_success!("Saved defaults to {}", path.display());
    Ok(())
}
