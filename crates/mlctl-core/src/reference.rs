use crate::arm_id::{ARM_ID_PREFIX, split_name_version};

/// A cross-resource reference held by a parent entity.
///
/// Resolution always ends in [`Reference::Canonical`], so resolving the same
/// value twice only does work the first time.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<T> {
    /// Definition that still has to be created remotely.
    Inline(T),
    /// `name[:version]` to be looked up in the current workspace.
    Alias {
        name: String,
        version: Option<String>,
    },
    Canonical(String),
}

impl<T> Reference<T> {
    /// Parses `name[:version]`.
    pub fn alias(token: &str) -> Self {
        let (name, version) = split_name_version(token);
        Reference::Alias {
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    pub fn canonical_id(&self) -> Option<&str> {
        match self {
            Reference::Canonical(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Canonical(_))
    }

    pub fn as_inline(&self) -> Option<&T> {
        match self {
            Reference::Inline(inner) => Some(inner),
            _ => None,
        }
    }

    /// `azureml:`-prefixed form used in documents; `None` for inline values.
    pub fn to_document_ref(&self) -> Option<String> {
        match self {
            Reference::Inline(_) => None,
            Reference::Alias {
                name,
                version: Some(version),
            } => Some(format!("{ARM_ID_PREFIX}{name}:{version}")),
            Reference::Alias {
                name,
                version: None,
            } => Some(format!("{ARM_ID_PREFIX}{name}")),
            Reference::Canonical(id) => Some(format!("{ARM_ID_PREFIX}{id}")),
        }
    }

    /// Maps the inline payload, keeping the other shapes as they are.
    pub fn map_inline<U>(self, f: impl FnOnce(T) -> U) -> Reference<U> {
        match self {
            Reference::Inline(inner) => Reference::Inline(f(inner)),
            Reference::Alias { name, version } => Reference::Alias { name, version },
            Reference::Canonical(id) => Reference::Canonical(id),
        }
    }
}
