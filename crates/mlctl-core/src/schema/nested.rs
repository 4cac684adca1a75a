use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::path::PathBuf;

use super::{LoadContext, Schema, load_value};
use crate::arm_id::{ARM_ID_PREFIX, AssetKind, is_canonical, split_name_version, to_canonical};
use crate::error::{ReferenceError, ValidationErrors};
use crate::reference::Reference;

const FILE_PREFIX: &str = "file:";

/// A sub-document given inline or as `file:<relative path>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<D> {
    Inline(D),
    File(PathBuf),
}

impl<D> Nested<D> {
    /// Converts into the entity, loading the file variant relative to `ctx`.
    pub fn load<S>(self, ctx: &LoadContext) -> Result<S, ValidationErrors>
    where
        S: Schema<Document = D>,
        D: Serialize + DeserializeOwned,
    {
        match self {
            Nested::Inline(doc) => {
                let entity = S::from_document(doc, ctx)?;
                ValidationErrors::from(entity.validate()).into_result()?;
                Ok(entity)
            }
            Nested::File(path) => {
                let resolved = ctx.resolve(&path);
                let text = std::fs::read_to_string(&resolved).map_err(|e| {
                    ValidationErrors::single(
                        "",
                        format!("cannot read {}: {e}", resolved.display()),
                    )
                })?;
                let value: Value = serde_yaml::from_str(&text)
                    .map_err(|e| ValidationErrors::single("", e.to_string()))?;
                load_value(value, &ctx.nested(&path))
            }
        }
    }
}

impl<'de, D: DeserializeOwned> Deserialize<'de> for Nested<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        let value = Value::deserialize(deserializer)?;
        if let Value::String(text) = &value {
            if let Some(path) = text.strip_prefix(FILE_PREFIX) {
                return Ok(Nested::File(PathBuf::from(path.trim())));
            }
        }
        serde_yaml::from_value(value)
            .map(Nested::Inline)
            .map_err(De::Error::custom)
    }
}

impl<D: Serialize> Serialize for Nested<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Nested::Inline(doc) => doc.serialize(serializer),
            Nested::File(path) => {
                serializer.serialize_str(&format!("{FILE_PREFIX}{}", path.display()))
            }
        }
    }
}

/// Union field: an `azureml:` reference or an inline (possibly `file:`) definition.
#[derive(Debug, Clone, PartialEq)]
pub enum RefOrInline<D> {
    Ref(String),
    Inline(Nested<D>),
}

impl<D> RefOrInline<D> {
    /// Decodes into a [`Reference`].
    ///
    /// A canonical remainder stays canonical. A `name:version` reference is
    /// made canonical when the context carries a workspace and is kept as an
    /// alias otherwise. A reference without a version is kept as an alias to
    /// be resolved against the latest version, unless `versioned` demands one.
    pub fn decode<S>(
        self,
        ctx: &LoadContext,
        field: &str,
        kind: AssetKind,
        versioned: bool,
    ) -> Result<Reference<S>, ValidationErrors>
    where
        S: Schema<Document = D>,
        D: Serialize + DeserializeOwned,
    {
        match self {
            RefOrInline::Ref(value) => decode_ref(ctx, field, &value, kind, versioned)
                .map_err(|e| ValidationErrors::single(field, e.to_string())),
            RefOrInline::Inline(nested) => nested
                .load(ctx)
                .map(Reference::Inline)
                .map_err(|e| e.within(field)),
        }
    }
}

fn decode_ref<S>(
    ctx: &LoadContext,
    field: &str,
    value: &str,
    kind: AssetKind,
    versioned: bool,
) -> Result<Reference<S>, ReferenceError> {
    let remainder =
        value
            .strip_prefix(ARM_ID_PREFIX)
            .ok_or_else(|| ReferenceError::NotPrefixed {
                field: field.to_string(),
                value: value.to_string(),
            })?;
    let version_missing = || ReferenceError::VersionNotProvided {
        field: field.to_string(),
        value: value.to_string(),
    };

    if is_canonical(remainder) {
        if versioned && !remainder.contains("/versions/") {
            return Err(version_missing());
        }
        return Ok(Reference::Canonical(remainder.to_string()));
    }

    match (split_name_version(remainder), ctx.workspace.as_ref()) {
        ((_, None), _) if versioned => Err(version_missing()),
        ((name, Some(version)), Some(scope)) => Ok(Reference::Canonical(to_canonical(
            Some(scope),
            kind,
            name,
            Some(version),
        )?)),
        ((name, version), _) => Ok(Reference::Alias {
            name: name.to_string(),
            version: version.map(str::to_string),
        }),
    }
}

impl<'de, D: DeserializeOwned> Deserialize<'de> for RefOrInline<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        let value = Value::deserialize(deserializer)?;
        if let Value::String(text) = &value {
            if text.starts_with(ARM_ID_PREFIX) {
                return Ok(RefOrInline::Ref(text.clone()));
            }
        }
        Nested::deserialize(value)
            .map(RefOrInline::Inline)
            .map_err(De::Error::custom)
    }
}

impl<D: Serialize> Serialize for RefOrInline<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RefOrInline::Ref(value) => serializer.serialize_str(value),
            RefOrInline::Inline(nested) => nested.serialize(serializer),
        }
    }
}

impl<D> RefOrInline<D> {
    /// Document form of a reference. Inline values are dumped with `dump_inline`.
    pub fn from_reference<S>(
        reference: &Reference<S>,
        dump_inline: impl FnOnce(&S) -> Result<D, ValidationErrors>,
    ) -> Result<Self, ValidationErrors> {
        match reference {
            Reference::Inline(entity) => Ok(RefOrInline::Inline(Nested::Inline(dump_inline(
                entity,
            )?))),
            other => Ok(RefOrInline::Ref(other.to_document_ref().unwrap_or_default())),
        }
    }
}
