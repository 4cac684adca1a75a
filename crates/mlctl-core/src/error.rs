use mlctl_client::ClientError;
use mlctl_client::storage::UploadError;
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::config::ConfigError;

/// A single field-level problem found while loading or dumping a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Every problem found in one document, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![ValidationError::new(field, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// Prefixes each field path, used when a nested document fails.
    pub fn within(self, parent: &str) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|e| {
                    let field = if e.field.is_empty() {
                        parent.to_string()
                    } else {
                        format!("{parent}.{}", e.field)
                    };
                    ValidationError::new(field, e.message)
                })
                .collect(),
        )
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Cannot build a resource id for {name}: no workspace is configured")]
    IncompleteScope { name: String },
    #[error("Field {field}: version is not provided for {value}")]
    VersionNotProvided { field: String, value: String },
    #[error("Field {field}: {value} cannot carry a version")]
    UnexpectedVersion { field: String, value: String },
    #[error("Field {field}: not supporting non-prefixed id {value}")]
    NotPrefixed { field: String, value: String },
    #[error("Invalid resource id: {0}")]
    InvalidArmId(String),
    #[error("Field {field}: reference must be resolved before it is sent")]
    Unresolved { field: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("{entity}: {field} is required")]
    MissingRequiredField {
        entity: &'static str,
        field: &'static str,
    },
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },
    #[error(
        "The {kind} asset {name}:{version} is already linked to an asset in your datastore that does not match the content from your `path` param and cannot be overwritten. Please provide a unique name or version to successfully create a new {kind} asset."
    )]
    AssetChanged {
        kind: &'static str,
        name: String,
        version: String,
    },
    #[error(transparent)]
    Client(#[from] mlctl_client::ClientError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("Remote operation failed with status {status}: {message}")]
    RemoteOperation { status: String, message: String },
    #[error(
        "Interrupted while waiting for {operation}. The operation keeps running on the service; check its status later"
    )]
    Interrupted { operation: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Maps a transport 404 to [`Error::NotFound`] and passes anything else through.
    pub fn from_lookup(err: ClientError, kind: &str, name: &str) -> Self {
        if err.is_not_found() {
            Error::not_found(kind, name)
        } else {
            Error::Client(err)
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_carry_the_parent_path() {
        let errors = ValidationErrors::single("instance_count", "is required")
            .within("scale_settings")
            .within("deployments.blue");
        assert_eq!(
            errors.to_string(),
            "deployments.blue.scale_settings.instance_count: is required"
        );
    }

    #[test]
    fn lookup_maps_not_found() {
        let err = Error::from_lookup(ClientError::NotFound, "model", "iris");
        assert_eq!(err.to_string(), "model iris not found");

        let err = Error::from_lookup(ClientError::Forbidden, "model", "iris");
        assert!(matches!(err, Error::Client(ClientError::Forbidden)));
    }
}
