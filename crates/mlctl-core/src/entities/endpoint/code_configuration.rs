use mlctl_client::schemas::CodeConfiguration;
use serde::{Deserialize, Serialize};

use crate::entities::code_asset::{CodeAsset, CodeField};
use crate::entities::resolved_id;
use crate::error::{Error, ValidationErrors};
use crate::reference::Reference;
use crate::schema::LoadContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeConfigurationSchema {
    /// Local directory, inline asset or `azureml:<name>:<version>`.
    pub code: CodeField,
    pub scoring_script: String,
}

/// Scoring code of a deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentCode {
    pub code: Reference<CodeAsset>,
    pub scoring_script: String,
}

impl DeploymentCode {
    pub fn from_document(
        doc: CodeConfigurationSchema,
        ctx: &LoadContext,
    ) -> Result<Self, ValidationErrors> {
        let code = doc
            .code
            .decode(ctx, "code")
            .map_err(|e| e.within("code_configuration"))?;
        if doc.scoring_script.trim().is_empty() {
            return Err(ValidationErrors::single(
                "code_configuration.scoring_script",
                "must not be empty",
            ));
        }
        Ok(Self {
            code,
            scoring_script: doc.scoring_script,
        })
    }

    pub fn to_document(&self) -> Result<CodeConfigurationSchema, ValidationErrors> {
        Ok(CodeConfigurationSchema {
            code: CodeField::from_reference(&self.code)?,
            scoring_script: self.scoring_script.clone(),
        })
    }

    /// The scoring script travels as the command of the code configuration.
    pub fn to_rest(&self) -> Result<CodeConfiguration, Error> {
        Ok(CodeConfiguration {
            code_artifact_id: Some(resolved_id(&self.code, "code_configuration.code")?),
            command: self.scoring_script.clone(),
        })
    }

    pub fn from_rest(configuration: CodeConfiguration) -> Option<Self> {
        configuration.code_artifact_id.map(|id| Self {
            code: Reference::Canonical(id),
            scoring_script: configuration.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_code_stays_inline_until_resolved() {
        let doc: CodeConfigurationSchema =
            serde_yaml::from_str("code: onlinescoring\nscoring_script: score.py\n").unwrap();
        let code = DeploymentCode::from_document(doc, &LoadContext::new("/work")).unwrap();

        assert!(matches!(code.code, Reference::Inline(_)));
        assert!(matches!(code.to_rest(), Err(Error::Reference(_))));
    }

    #[test]
    fn resolved_code_maps_to_the_command() {
        let code = DeploymentCode {
            code: Reference::Canonical("/subscriptions/s/codes/c/versions/1".into()),
            scoring_script: "score.py".into(),
        };
        let rest = code.to_rest().unwrap();
        assert_eq!(rest.command, "score.py");
        assert_eq!(DeploymentCode::from_rest(rest), Some(code));
    }
}
