//! Loading and dumping of YAML resource documents.
//!
//! Each resource kind pairs a strict serde document struct with an entity
//! type through the [`Schema`] trait. Loading runs in a fixed order: apply
//! `--set` overrides, unescape `$$`, deserialize the document (unknown keys
//! are rejected), convert it into the entity and finally run
//! [`Schema::validate`] once.

mod nested;
mod overrides;

pub use nested::{Nested, RefOrInline};
pub use overrides::{apply_overrides, parse_override};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

use crate::config::WorkspaceScope;
use crate::error::{Error, ValidationError, ValidationErrors};

/// Naming rules the documents are checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Dialect {
    /// Free-form asset names.
    #[default]
    V1,
    /// Code asset names must be GUIDs.
    V2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    pub dialect: Dialect,
}

/// Read-only state threaded through a load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadContext {
    /// Directory relative paths in the document are resolved against.
    pub base_path: PathBuf,
    pub workspace: Option<WorkspaceScope>,
    pub options: SchemaOptions,
}

impl LoadContext {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            workspace: None,
            options: SchemaOptions::default(),
        }
    }

    pub fn with_workspace(mut self, workspace: WorkspaceScope) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn with_options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.base_path.join(path)
    }

    /// Context for a document stored in `file`, relative to this one.
    pub fn nested(&self, file: impl AsRef<Path>) -> LoadContext {
        let resolved = self.resolve(file);
        let base_path = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_path.clone());
        LoadContext {
            base_path,
            workspace: self.workspace.clone(),
            options: self.options,
        }
    }
}

/// Two-way mapping between a YAML document and an entity.
pub trait Schema: Sized {
    type Document: Serialize + DeserializeOwned;

    fn from_document(doc: Self::Document, ctx: &LoadContext) -> Result<Self, ValidationErrors>;

    /// Builds the document to dump. Invariants that must also hold on output
    /// are checked here.
    fn to_document(&self) -> Result<Self::Document, ValidationErrors>;

    fn validate(&self) -> Vec<ValidationError> {
        Vec::new()
    }
}

/// Deserializes and validates an already parsed document.
pub fn load_value<S: Schema>(value: Value, ctx: &LoadContext) -> Result<S, ValidationErrors> {
    let doc: S::Document = serde_yaml::from_value(unescape(value))
        .map_err(|e| ValidationErrors::single("", e.to_string()))?;
    let entity = S::from_document(doc, ctx)?;
    ValidationErrors::from(entity.validate()).into_result()?;
    Ok(entity)
}

pub fn load_str<S: Schema>(text: &str, ctx: &LoadContext) -> Result<S, Error> {
    load_str_with_overrides(text, ctx, &[])
}

pub fn load_str_with_overrides<S: Schema>(
    text: &str,
    ctx: &LoadContext,
    overrides: &[(String, String)],
) -> Result<S, Error> {
    let mut value: Value = serde_yaml::from_str(text)?;
    apply_overrides(&mut value, overrides)?;
    Ok(load_value(value, ctx)?)
}

/// Loads `path`, resolved against `ctx.base_path`. Relative paths inside the
/// document are then resolved against the file's own directory.
pub fn load_file<S: Schema>(path: impl AsRef<Path>, ctx: &LoadContext) -> Result<S, Error> {
    load_file_with_overrides(path, ctx, &[])
}

pub fn load_file_with_overrides<S: Schema>(
    path: impl AsRef<Path>,
    ctx: &LoadContext,
    overrides: &[(String, String)],
) -> Result<S, Error> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(ctx.resolve(path))?;
    load_str_with_overrides(&text, &ctx.nested(path), overrides)
}

/// Serializes an entity to its escaped document form.
pub fn dump_value<S: Schema>(entity: &S) -> Result<Value, Error> {
    let doc = entity.to_document()?;
    Ok(escape(serde_yaml::to_value(doc)?))
}

pub fn dump<S: Schema>(entity: &S) -> Result<String, Error> {
    Ok(serde_yaml::to_string(&dump_value(entity)?)?)
}

fn escape(value: Value) -> Value {
    map_strings(value, &|s| s.replace('$', "$$"))
}

fn unescape(value: Value) -> Value {
    map_strings(value, &|s| s.replace("$$", "$"))
}

fn map_strings(value: Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(|v| map_strings(v, f)).collect())
        }
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(k, v)| (k, map_strings(v, f)))
                .collect(),
        ),
        Value::Tagged(mut tagged) => {
            tagged.value = map_strings(tagged.value, f);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

/// Accepts `version: 3` as well as `version: "3"`. Also used for other
/// scalar fields that may be written as numbers.
pub(crate) fn deserialize_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    use serde::de::Error as _;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(version)) => Ok(Some(version)),
        Some(Value::Number(version)) => Ok(Some(version.to_string())),
        Some(_) => Err(D::Error::custom("expected a string or a number")),
    }
}

/// Collects a required value, recording an error when it is missing.
pub(crate) fn require<T>(
    value: Option<T>,
    field: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<T> {
    if value.is_none() {
        errors.push(ValidationError::new(field, "is required"));
    }
    value
}

/// Unwraps a converted optional field, moving its errors into `errors`.
pub(crate) fn collect<T>(
    value: Option<Result<T, ValidationErrors>>,
    errors: &mut Vec<ValidationError>,
) -> Option<T> {
    match value? {
        Ok(value) => Some(value),
        Err(e) => {
            errors.extend(e.0);
            None
        }
    }
}
