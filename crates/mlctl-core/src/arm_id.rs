//! Canonical resource identifiers.
//!
//! A canonical id has the shape
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.MachineLearningServices/workspaces/{ws}/{kind}/{name}[/versions/{version}]`
//! and doubles as the REST path of the resource.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use strum::{Display as StrumDisplay, EnumString};

use crate::config::WorkspaceScope;
use crate::error::ReferenceError;

pub const RESOURCE_PROVIDER: &str = "Microsoft.MachineLearningServices";
pub const ARM_ID_PREFIX: &str = "azureml:";
pub const CANONICAL_PREFIX: &str = "/subscriptions/";

/// Resource kinds, displayed as their path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum AssetKind {
    #[strum(serialize = "codes")]
    Code,
    #[strum(serialize = "computes")]
    Compute,
    #[strum(serialize = "data")]
    Data,
    #[strum(serialize = "datastores")]
    Datastore,
    #[strum(serialize = "environments")]
    Environment,
    #[strum(serialize = "models")]
    Model,
    #[strum(serialize = "jobs")]
    Job,
    #[strum(serialize = "onlineEndpoints")]
    OnlineEndpoint,
    #[strum(serialize = "batchEndpoints")]
    BatchEndpoint,
}

impl AssetKind {
    /// Human readable name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Code => "code",
            AssetKind::Compute => "compute",
            AssetKind::Data => "data",
            AssetKind::Datastore => "datastore",
            AssetKind::Environment => "environment",
            AssetKind::Model => "model",
            AssetKind::Job => "job",
            AssetKind::OnlineEndpoint => "online endpoint",
            AssetKind::BatchEndpoint => "batch endpoint",
        }
    }
}

/// Splits `name:version` on the last `:`. An empty version counts as absent.
pub fn split_name_version(token: &str) -> (&str, Option<&str>) {
    match token.rsplit_once(':') {
        Some((name, version)) if !version.is_empty() => (name, Some(version)),
        Some((name, _)) => (name, None),
        None => (token, None),
    }
}

pub fn is_canonical(token: &str) -> bool {
    token.starts_with(CANONICAL_PREFIX)
}

/// Builds the canonical id for `name`, or returns it unchanged when it
/// already is one.
pub fn to_canonical(
    scope: Option<&WorkspaceScope>,
    kind: AssetKind,
    name: &str,
    version: Option<&str>,
) -> Result<String, ReferenceError> {
    if is_canonical(name) {
        return Ok(name.to_string());
    }
    let scope = scope.ok_or_else(|| ReferenceError::IncompleteScope {
        name: name.to_string(),
    })?;
    Ok(ArmId {
        scope: scope.clone(),
        kind,
        name: name.to_string(),
        version: version.map(str::to_string),
    }
    .to_string())
}

pub fn datastore_id(scope: &WorkspaceScope, name: &str) -> String {
    format!("{}/{}/{name}", scope.workspace_path(), AssetKind::Datastore)
}

/// Path of a collection of `kind` resources in the workspace.
pub fn collection_path(scope: &WorkspaceScope, kind: AssetKind) -> String {
    format!("{}/{kind}", scope.workspace_path())
}

/// A parsed canonical id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmId {
    pub scope: WorkspaceScope,
    pub kind: AssetKind,
    pub name: String,
    pub version: Option<String>,
}

impl ArmId {
    pub fn new(scope: &WorkspaceScope, kind: AssetKind, name: impl Into<String>) -> Self {
        Self {
            scope: scope.clone(),
            kind,
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Path of the container holding every version of this resource.
    pub fn container_path(&self) -> String {
        format!("{}/{}/{}", self.scope.workspace_path(), self.kind, self.name)
    }
}

impl Display for ArmId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.container_path())?;
        if let Some(version) = &self.version {
            write!(f, "/versions/{version}")?;
        }
        Ok(())
    }
}

impl FromStr for ArmId {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReferenceError::InvalidArmId(s.to_string());
        if !is_canonical(s) {
            return Err(invalid());
        }
        let segments: Vec<&str> = s.trim_matches('/').split('/').collect();
        let [
            subscriptions,
            subscription_id,
            resource_groups,
            resource_group_name,
            providers,
            provider,
            workspaces,
            workspace_name,
            kind,
            name,
            rest @ ..,
        ] = segments.as_slice()
        else {
            return Err(invalid());
        };

        let keys_match = subscriptions.eq_ignore_ascii_case("subscriptions")
            && resource_groups.eq_ignore_ascii_case("resourceGroups")
            && providers.eq_ignore_ascii_case("providers")
            && provider.eq_ignore_ascii_case(RESOURCE_PROVIDER)
            && workspaces.eq_ignore_ascii_case("workspaces");
        if !keys_match || name.is_empty() {
            return Err(invalid());
        }
        let kind = AssetKind::from_str(kind).map_err(|_| invalid())?;
        let version = match rest {
            [] => None,
            [versions, version] if versions.eq_ignore_ascii_case("versions") => {
                Some(version.to_string())
            }
            _ => return Err(invalid()),
        };

        Ok(ArmId {
            scope: WorkspaceScope::new(
                subscription_id.to_string(),
                resource_group_name.to_string(),
                workspace_name.to_string(),
            ),
            kind,
            name: name.to_string(),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn scope() -> WorkspaceScope {
        WorkspaceScope::new("sub".into(), "rg".into(), "ws".into())
    }

    const WS: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws";

    #[rstest]
    #[case("iris:3", ("iris", Some("3")))]
    #[case("iris", ("iris", None))]
    #[case("iris:", ("iris", None))]
    #[case("ns:iris:3", ("ns:iris", Some("3")))]
    fn splits_on_last_separator(#[case] token: &str, #[case] expected: (&str, Option<&str>)) {
        assert_eq!(split_name_version(token), expected);
    }

    #[test]
    fn canonical_ids_are_idempotent() {
        let id = to_canonical(Some(&scope()), AssetKind::Model, "iris", Some("3")).unwrap();
        assert_eq!(id, format!("{WS}/models/iris/versions/3"));
        assert!(is_canonical(&id));
        assert_eq!(
            to_canonical(Some(&scope()), AssetKind::Model, &id, None).unwrap(),
            id
        );
        assert_eq!(to_canonical(None, AssetKind::Model, &id, None).unwrap(), id);
    }

    #[test]
    fn missing_scope_is_an_error() {
        let err = to_canonical(None, AssetKind::Environment, "sklearn", None).unwrap_err();
        assert!(matches!(err, ReferenceError::IncompleteScope { name } if name == "sklearn"));
    }

    #[test]
    fn parses_canonical_ids() {
        let id: ArmId = format!("{WS}/codes/abc/versions/1").parse().unwrap();
        assert_eq!(id.scope, scope());
        assert_eq!(id.kind, AssetKind::Code);
        assert_eq!(id.name, "abc");
        assert_eq!(id.version.as_deref(), Some("1"));

        let compute: ArmId = format!("{WS}/computes/aks-inference").parse().unwrap();
        assert_eq!(compute.kind, AssetKind::Compute);
        assert_eq!(compute.version, None);
        assert_eq!(compute.to_string(), format!("{WS}/computes/aks-inference"));
    }

    #[rstest]
    #[case("azureml:iris:1")]
    #[case("/subscriptions/sub/resourceGroups/rg")]
    #[case("/subscriptions/sub/resourceGroups/rg/providers/Other.Provider/workspaces/ws/models/iris")]
    #[case("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/widgets/iris")]
    #[case("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws/models/iris/labels/1")]
    fn rejects_malformed_ids(#[case] token: &str) {
        assert!(token.parse::<ArmId>().is_err());
    }

    #[test]
    fn datastore_ids_have_no_version() {
        assert_eq!(
            datastore_id(&scope(), "workspaceblobstore"),
            format!("{WS}/datastores/workspaceblobstore")
        );
    }
}
