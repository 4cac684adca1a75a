//! Converters between `azureml:` document references and canonical ids.

use crate::arm_id::{ARM_ID_PREFIX, AssetKind, is_canonical, split_name_version, to_canonical};
use crate::config::WorkspaceScope;
use crate::error::ReferenceError;

fn strip_prefix<'a>(field: &str, value: &'a str) -> Result<&'a str, ReferenceError> {
    value
        .strip_prefix(ARM_ID_PREFIX)
        .ok_or_else(|| ReferenceError::NotPrefixed {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Reference to a resource that is not versioned, such as a compute or a datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new)]
pub struct UnversionedRefCodec {
    pub kind: AssetKind,
}

impl UnversionedRefCodec {
    pub fn encode(&self, id: &str) -> String {
        format!("{ARM_ID_PREFIX}{id}")
    }

    pub fn decode(
        &self,
        scope: Option<&WorkspaceScope>,
        field: &str,
        value: &str,
    ) -> Result<String, ReferenceError> {
        let remainder = strip_prefix(field, value)?;
        if remainder.contains(':') && !is_canonical(remainder) {
            return Err(ReferenceError::UnexpectedVersion {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        to_canonical(scope, self.kind, remainder, None)
    }
}

/// Reference that must pin a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new)]
pub struct VersionedRefCodec {
    pub kind: AssetKind,
}

impl VersionedRefCodec {
    pub fn encode(&self, id: &str) -> String {
        format!("{ARM_ID_PREFIX}{id}")
    }

    pub fn decode(
        &self,
        scope: Option<&WorkspaceScope>,
        field: &str,
        value: &str,
    ) -> Result<String, ReferenceError> {
        let remainder = strip_prefix(field, value)?;
        let id = if is_canonical(remainder) {
            remainder.to_string()
        } else {
            let (name, version) = split_name_version(remainder);
            to_canonical(scope, self.kind, name, version)?
        };
        if !id.contains("/versions/") {
            return Err(ReferenceError::VersionNotProvided {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WS: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws";

    fn scope() -> WorkspaceScope {
        WorkspaceScope::new("sub".into(), "rg".into(), "ws".into())
    }

    #[test]
    fn versioned_reference_is_expanded() {
        let codec = VersionedRefCodec::new(AssetKind::Code);
        assert_eq!(
            codec.decode(Some(&scope()), "code", "azureml:name:1").unwrap(),
            format!("{WS}/codes/name/versions/1")
        );
    }

    #[test]
    fn versioned_reference_requires_version() {
        let codec = VersionedRefCodec::new(AssetKind::Code);
        let err = codec
            .decode(Some(&scope()), "code", "azureml:name")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field code: version is not provided for azureml:name"
        );

        let canonical = format!("azureml:{WS}/codes/name");
        assert!(matches!(
            codec.decode(None, "code", &canonical),
            Err(ReferenceError::VersionNotProvided { .. })
        ));
    }

    #[test]
    fn prefix_is_mandatory() {
        let codec = UnversionedRefCodec::new(AssetKind::Compute);
        let err = codec.decode(Some(&scope()), "compute.target", "cpu").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field compute.target: not supporting non-prefixed id cpu"
        );
    }

    #[test]
    fn unversioned_reference_rejects_a_version() {
        let codec = UnversionedRefCodec::new(AssetKind::Compute);
        let err = codec
            .decode(Some(&scope()), "compute.target", "azureml:cpu:1")
            .unwrap_err();
        assert_eq!(
            err,
            ReferenceError::UnexpectedVersion {
                field: "compute.target".into(),
                value: "azureml:cpu:1".into(),
            }
        );
    }

    #[test]
    fn unversioned_reference_is_expanded() {
        let codec = UnversionedRefCodec::new(AssetKind::Compute);
        assert_eq!(
            codec.decode(Some(&scope()), "compute.target", "azureml:cpu").unwrap(),
            format!("{WS}/computes/cpu")
        );
    }

    #[test]
    fn canonical_remainder_passes_through_without_scope() {
        let codec = UnversionedRefCodec::new(AssetKind::Compute);
        let id = format!("{WS}/computes/cpu");
        assert_eq!(
            codec.decode(None, "compute", &codec.encode(&id)).unwrap(),
            id
        );
    }
}
