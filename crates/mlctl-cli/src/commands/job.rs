use anyhow::Context as _;
use clap::{Args, Subcommand};
use mlctl_core::entities::Job;
use mlctl_core::schema;
use std::path::PathBuf;

use super::{FileArgs, print_entities, print_entity};
use crate::context::{CliContext, WorkspaceArgs};
use crate::{print_info, print_success, print_warn};

#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Submit a command or sweep job.
    Create(CreateArgs),
    /// Show a job.
    Show(NameArgs),
    /// List the jobs of the workspace.
    List,
    /// Cancel a running job.
    Cancel(NameArgs),
    /// Wait until a job reaches a terminal status.
    Wait(NameArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub file: FileArgs,
    /// Write the submitted job document to this path.
    #[arg(long)]
    pub save_as: Option<PathBuf>,
    /// Block until the job finishes.
    #[arg(long)]
    pub stream: bool,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    /// Job name.
    #[arg(long, short = 'n')]
    pub name: String,
}

pub fn handle_command(
    command: JobCommand,
    workspace: &WorkspaceArgs,
    context: &CliContext,
) -> anyhow::Result<()> {
    let client = context.create_client(workspace)?;
    let terminal = context.terminal();
    let jobs = client.jobs();

    match command {
        JobCommand::Create(args) => {
            let mut job: Job = args.file.load(&client)?;
            let submitted = jobs.create_or_update(&mut job)?;
            let name = submitted.name().unwrap_or_default().to_string();
            print_success!("Submitted job {name}");

            if let Some(path) = args.save_as {
                std::fs::write(&path, schema::dump(&submitted)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                print_info!("Saved the submitted job to {}", path.display());
            }

            if args.stream {
                let finished = jobs.wait(&name)?;
                report_terminal(&name, finished.status());
                print_entity(terminal, &finished)?;
            } else {
                print_entity(terminal, &submitted)?;
            }
        }
        JobCommand::Show(args) => print_entity(terminal, &jobs.get(&args.name)?)?,
        JobCommand::List => print_entities(terminal, &jobs.list()?)?,
        JobCommand::Cancel(args) => {
            jobs.cancel(&args.name)?;
            print_success!("Cancellation requested for job {}", args.name);
        }
        JobCommand::Wait(args) => {
            let finished = jobs.wait(&args.name)?;
            report_terminal(&args.name, finished.status());
        }
    }
    Ok(())
}

fn report_terminal(name: &str, status: Option<&str>) {
    match status {
        Some("Completed") => {
            print_success!("Job {name} completed");
        }
        Some(status) => {
            print_warn!("Job {name} ended with status {status}");
        }
        None => {
            print_warn!("Job {name} has no status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::completed(Some("Completed"))]
    #[case::failed(Some("Failed"))]
    #[case::unknown(None)]
    fn every_terminal_status_is_reported(#[case] status: Option<&str>) {
        report_terminal("train-42", status);
    }
}
