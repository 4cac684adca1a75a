use clap::Args;
use mlctl_core::MlClient;
use mlctl_core::schema::{self, Schema, parse_override};
use std::path::PathBuf;

use crate::terminal::Terminal;

pub mod code;
pub mod compute;
pub mod configure;
pub mod data;
pub mod datastore;
pub mod endpoint;
pub mod environment;
pub mod job;
pub mod model;
pub mod workspace;

/// A resource document plus command-line edits applied before it is loaded.
#[derive(Args, Debug, Clone)]
pub struct FileArgs {
    /// Path to the YAML document.
    #[arg(long, short = 'f')]
    pub file: PathBuf,
    /// Replaces the document's name.
    #[arg(long, short = 'n')]
    pub name: Option<String>,
    /// Replaces the document's version.
    #[arg(long, short = 'v')]
    pub version: Option<String>,
    /// Sets a field by dotted path, e.g. `--set resources.instance_count=2`.
    #[arg(long = "set", value_parser = parse_override)]
    pub overrides: Vec<(String, String)>,
}

impl FileArgs {
    /// `--set` edits followed by `--name` and `--version`, which win.
    pub fn overrides(&self) -> Vec<(String, String)> {
        let mut overrides = self.overrides.clone();
        if let Some(name) = &self.name {
            overrides.push(("name".to_string(), name.clone()));
        }
        if let Some(version) = &self.version {
            overrides.push(("version".to_string(), version.clone()));
        }
        overrides
    }

    /// Loads the document, resolving its relative paths from the working directory.
    pub fn load<S: Schema>(&self, client: &MlClient) -> anyhow::Result<S> {
        let ctx = client.load_context(std::env::current_dir()?);
        Ok(schema::load_file_with_overrides(
            &self.file,
            &ctx,
            &self.overrides(),
        )?)
    }
}

pub fn print_entity<S: Schema>(terminal: &Terminal, entity: &S) -> anyhow::Result<()> {
    terminal.print_document(&schema::dump(entity)?);
    Ok(())
}

pub fn print_entities<S: Schema>(terminal: &Terminal, entities: &[S]) -> anyhow::Result<()> {
    let documents = entities
        .iter()
        .map(schema::dump_value)
        .collect::<Result<Vec<_>, _>>()?;
    terminal.print_document(&serde_yaml::to_string(&documents)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_version_are_applied_last() {
        let args = FileArgs {
            file: PathBuf::from("model.yml"),
            name: Some("mnist".into()),
            version: Some("3".into()),
            overrides: vec![("name".into(), "other".into())],
        };

        let overrides = args.overrides();
        assert_eq!(overrides.len(), 3);
        assert_eq!(overrides[1], ("name".to_string(), "mnist".to_string()));
        assert_eq!(overrides[2], ("version".to_string(), "3".to_string()));
    }
}
