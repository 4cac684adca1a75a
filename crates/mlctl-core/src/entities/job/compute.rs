use mlctl_client::schemas::ComputeBinding as RestComputeBinding;
use serde::{Deserialize, Serialize};

use crate::arm_id::{ARM_ID_PREFIX, AssetKind, is_canonical};
use crate::error::{Error, ReferenceError, ValidationErrors};
use crate::fields::UnversionedRefCodec;
use crate::schema::LoadContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeBindingSchema {
    /// `azureml:<compute name>` or `azureml:<canonical id>`.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
}

/// Compute a job runs on.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeBinding {
    /// Canonical id, or the bare name until a workspace is known.
    pub target: String,
    pub node_count: Option<u32>,
}

impl ComputeBinding {
    pub fn from_document(
        doc: ComputeBindingSchema,
        ctx: &LoadContext,
    ) -> Result<Self, ValidationErrors> {
        let field = "compute.target";
        let target = match &ctx.workspace {
            Some(scope) => UnversionedRefCodec::new(AssetKind::Compute).decode(
                Some(scope),
                field,
                &doc.target,
            ),
            None => doc
                .target
                .strip_prefix(ARM_ID_PREFIX)
                .map(str::to_string)
                .ok_or_else(|| ReferenceError::NotPrefixed {
                    field: field.to_string(),
                    value: doc.target.clone(),
                }),
        }
        .map_err(|e| ValidationErrors::single(field, e.to_string()))?;

        Ok(Self {
            target,
            node_count: doc.node_count,
        })
    }

    pub fn to_document(&self) -> ComputeBindingSchema {
        ComputeBindingSchema {
            target: format!("{ARM_ID_PREFIX}{}", self.target),
            node_count: self.node_count,
        }
    }

    pub fn is_resolved(&self) -> bool {
        is_canonical(&self.target)
    }

    pub fn to_rest(&self) -> Result<RestComputeBinding, Error> {
        if !self.is_resolved() {
            return Err(ReferenceError::Unresolved {
                field: "compute.target".to_string(),
            }
            .into());
        }
        Ok(RestComputeBinding {
            compute_id: Some(self.target.clone()),
            node_count: self.node_count,
        })
    }

    pub fn from_rest(binding: &RestComputeBinding) -> Option<Self> {
        binding.compute_id.as_ref().map(|target| Self {
            target: target.clone(),
            node_count: binding.node_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceScope;

    fn doc(target: &str) -> ComputeBindingSchema {
        ComputeBindingSchema {
            target: target.to_string(),
            node_count: Some(2),
        }
    }

    #[test]
    fn bare_names_are_kept_until_a_workspace_is_known() {
        let binding = ComputeBinding::from_document(doc("azureml:cpu-cluster"), &LoadContext::new("."))
            .unwrap();
        assert_eq!(binding.target, "cpu-cluster");
        assert!(!binding.is_resolved());
        assert!(binding.to_rest().is_err());
        assert_eq!(binding.to_document(), doc("azureml:cpu-cluster"));
    }

    #[test]
    fn workspace_makes_the_target_canonical() {
        let ctx = LoadContext::new(".").with_workspace(WorkspaceScope::new(
            "sub".into(),
            "rg".into(),
            "ws".into(),
        ));
        let binding = ComputeBinding::from_document(doc("azureml:cpu-cluster"), &ctx).unwrap();
        let rest = binding.to_rest().unwrap();
        assert_eq!(
            rest.compute_id.as_deref(),
            Some(
                "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/computes/cpu-cluster"
            )
        );
        assert_eq!(rest.node_count, Some(2));
    }

    #[test]
    fn unprefixed_target_is_rejected() {
        let err = ComputeBinding::from_document(doc("cpu-cluster"), &LoadContext::new("."))
            .unwrap_err();
        assert!(err.to_string().contains("not supporting non-prefixed id"));
    }
}
