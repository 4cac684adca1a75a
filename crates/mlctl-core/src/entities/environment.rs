use mlctl_client::schemas::{ArmResource, EnvironmentSpecificationVersion as Spec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::rest_identity;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::schema::{LoadContext, Schema, deserialize_version};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PythonSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_specification_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentSchema {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "deserialize_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Directory the definition files are relative to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerSection>,
    /// Conda specification file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conda: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonSection>,
    /// `runtime.txt` file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub path: Option<PathBuf>,
    pub docker: Option<DockerSection>,
    pub conda_file: Option<PathBuf>,
    pub requirements_file: Option<PathBuf>,
    pub runtime_file: Option<PathBuf>,
    pub base_path: PathBuf,
    pub id: Option<String>,
    /// Definition blobs as returned by the service.
    pub remote_properties: BTreeMap<String, String>,
}

impl Environment {
    fn root(&self) -> PathBuf {
        match &self.path {
            Some(path) => self.base_path.join(path),
            None => self.base_path.clone(),
        }
    }

    fn read(&self, file: &PathBuf) -> Result<String, Error> {
        let path = self.root().join(file);
        std::fs::read_to_string(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", path.display()),
            ))
        })
    }

    /// Reads every referenced definition file into the wire property map.
    pub fn translate_to_rest_object(&self) -> Result<ArmResource<Spec>, Error> {
        let mut properties = BTreeMap::new();

        if let Some(conda_file) = &self.conda_file {
            // Normalise through a parse so malformed specs fail locally.
            let conda: serde_yaml::Value = serde_yaml::from_str(&self.read(conda_file)?)?;
            properties.insert(Spec::CONDA_FILE.to_string(), serde_yaml::to_string(&conda)?);
        }
        if let Some(requirements) = &self.requirements_file {
            properties.insert(Spec::REQUIREMENTS_TXT.to_string(), self.read(requirements)?);
        }
        if let Some(runtime) = &self.runtime_file {
            properties.insert(Spec::RUNTIME_TXT.to_string(), self.read(runtime)?);
        }
        if let Some(docker) = &self.docker {
            if let Some(image) = &docker.image {
                properties.insert(Spec::DOCKER_IMAGE_URI.to_string(), image.clone());
            }
            if let Some(dockerfile) = &docker.dockerfile_path {
                properties.insert(
                    Spec::DOCKERFILE.to_string(),
                    self.read(&PathBuf::from(dockerfile))?,
                );
            }
        }

        Ok(ArmResource::new(Spec {
            properties,
            is_curated: false,
            description: self.description.clone(),
            tags: self.tags.clone(),
        })
        .with_name(self.name.clone()))
    }

    pub fn from_rest(resource: ArmResource<Value>) -> Result<Self, Error> {
        let resource = resource.typed::<Spec>()?;
        let (name, version) = rest_identity(&resource);
        let properties = resource.properties;
        let docker = properties
            .properties
            .get(Spec::DOCKER_IMAGE_URI)
            .map(|image| DockerSection {
                image: Some(image.clone()),
                dockerfile_path: None,
            });

        Ok(Self {
            name: name.unwrap_or_default(),
            version,
            description: properties.description,
            tags: properties.tags,
            path: None,
            docker,
            conda_file: None,
            requirements_file: None,
            runtime_file: None,
            base_path: PathBuf::new(),
            id: resource.id,
            remote_properties: properties.properties,
        })
    }
}

impl Schema for Environment {
    type Document = EnvironmentSchema;

    fn from_document(doc: EnvironmentSchema, ctx: &LoadContext) -> Result<Self, ValidationErrors> {
        Ok(Self {
            name: doc.name,
            version: doc.version,
            description: doc.description,
            tags: doc.tags,
            path: doc.path.map(PathBuf::from),
            docker: doc.docker,
            conda_file: doc.conda.map(PathBuf::from),
            requirements_file: doc
                .python
                .and_then(|p| p.requirements_specification_file)
                .map(PathBuf::from),
            runtime_file: doc.runtime.map(PathBuf::from),
            base_path: ctx.base_path.clone(),
            id: None,
            remote_properties: BTreeMap::new(),
        })
    }

    fn to_document(&self) -> Result<EnvironmentSchema, ValidationErrors> {
        let display = |p: &PathBuf| p.display().to_string();
        Ok(EnvironmentSchema {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            path: self.path.as_ref().map(display),
            docker: self.docker.clone(),
            conda: self.conda_file.as_ref().map(display),
            python: self
                .requirements_file
                .as_ref()
                .map(|file| PythonSection {
                    requirements_specification_file: Some(display(file)),
                }),
            runtime: self.runtime_file.as_ref().map(display),
        })
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "must not be empty"));
        }
        if let Some(docker) = &self.docker {
            if docker.image.is_none() && docker.dockerfile_path.is_none() {
                errors.push(ValidationError::new(
                    "docker",
                    "one of image or dockerfile_path is required",
                ));
            }
        }
        let defined = self.docker.is_some()
            || self.conda_file.is_some()
            || self.requirements_file.is_some()
            || self.runtime_file.is_some();
        if !defined {
            errors.push(ValidationError::new(
                "",
                "an environment needs at least one of docker, conda, python or runtime",
            ));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{dump, load_file, load_str};
    use std::fs;

    #[test]
    fn definition_files_become_wire_properties() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("env")).unwrap();
        fs::write(
            dir.path().join("env/conda.yml"),
            "name: train\ndependencies:\n  - python=3.8\n",
        )
        .unwrap();
        fs::write(dir.path().join("env/requirements.txt"), "numpy\n").unwrap();
        fs::write(dir.path().join("env/Dockerfile"), "FROM ubuntu:20.04\n").unwrap();
        fs::write(
            dir.path().join("environment.yml"),
            "name: train-env\nversion: 2\npath: env\nconda: conda.yml\n\
             python:\n  requirements_specification_file: requirements.txt\n\
             docker:\n  image: mcr.microsoft.com/base:latest\n  dockerfile_path: Dockerfile\n",
        )
        .unwrap();

        let env: Environment =
            load_file("environment.yml", &LoadContext::new(dir.path())).unwrap();
        let rest = env.translate_to_rest_object().unwrap();
        let properties = &rest.properties.properties;

        assert!(properties[Spec::CONDA_FILE].contains("python=3.8"));
        assert_eq!(properties[Spec::REQUIREMENTS_TXT], "numpy\n");
        assert_eq!(properties[Spec::DOCKERFILE], "FROM ubuntu:20.04\n");
        assert_eq!(
            properties[Spec::DOCKER_IMAGE_URI],
            "mcr.microsoft.com/base:latest"
        );
        assert!(!rest.properties.is_curated);
    }

    #[test]
    fn an_empty_definition_is_rejected() {
        let err = load_str::<Environment>("name: bare\n", &LoadContext::new(".")).unwrap_err();
        assert!(err.to_string().contains("at least one of docker"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let env = load_str::<Environment>(
            "name: env\nconda: missing.yml\n",
            &LoadContext::new("/nowhere"),
        )
        .unwrap();
        let err = env.translate_to_rest_object().unwrap_err();
        assert!(err.to_string().contains("/nowhere/missing.yml"));
    }

    #[test]
    fn dump_omits_unset_sections() {
        let env = load_str::<Environment>(
            "name: env\ndocker:\n  image: python:3.8\n",
            &LoadContext::new("."),
        )
        .unwrap();
        let dumped = dump(&env).unwrap();
        assert!(dumped.contains("image: python:3.8"));
        assert!(!dumped.contains("conda"));
        assert!(!dumped.contains("version"));
    }
}
