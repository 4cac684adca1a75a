use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("Missing configuration directory")]
    MissingDirectory,
}

/// Workspace used when neither a flag nor the environment names one.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Defaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
}

impl Defaults {
    /// Fields of `other` that are set replace ours.
    pub fn merge(self, other: Defaults) -> Defaults {
        Defaults {
            subscription_id: other.subscription_id.or(self.subscription_id),
            resource_group: other.resource_group.or(self.resource_group),
            workspace_name: other.workspace_name.or(self.workspace_name),
        }
    }
}

pub struct AppConfig {
    base_dir: PathBuf,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let proj_dirs =
            ProjectDirs::from("com", "mlctl", "mlctl").ok_or(ConfigError::MissingDirectory)?;
        Self::with_base_dir(proj_dirs.config_dir())
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn defaults_path(&self) -> PathBuf {
        self.base_dir.join("defaults.json")
    }

    pub fn save_defaults(&self, defaults: &Defaults) -> Result<PathBuf, ConfigError> {
        let json = serde_json::to_string_pretty(defaults)?;
        let path = self.defaults_path();
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load_defaults(&self) -> Result<Defaults, ConfigError> {
        let path = self.defaults_path();
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Defaults::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::with_base_dir(dir.path().join("mlctl")).unwrap();
        assert_eq!(config.load_defaults().unwrap(), Defaults::default());

        let defaults = Defaults {
            subscription_id: Some("sub".into()),
            resource_group: Some("rg".into()),
            workspace_name: None,
        };
        let path = config.save_defaults(&defaults).unwrap();

        assert!(path.ends_with("defaults.json"));
        assert_eq!(config.load_defaults().unwrap(), defaults);
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let stored = Defaults {
            subscription_id: Some("sub".into()),
            resource_group: Some("rg".into()),
            workspace_name: Some("ws".into()),
        };
        let update = Defaults {
            workspace_name: Some("other".into()),
            ..Default::default()
        };

        let merged = stored.merge(update);
        assert_eq!(merged.subscription_id.as_deref(), Some("sub"));
        assert_eq!(merged.workspace_name.as_deref(), Some("other"));
    }
}
