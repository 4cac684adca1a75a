//! Binding of `{inputs.<key>}` placeholders in a job command.

use mlctl_client::schemas::{DataBinding, DataBindingMode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::arm_id::{ARM_ID_PREFIX, AssetKind, is_canonical};
use crate::entities::data::{Data, DataSchema};
use crate::entities::resolved_id;
use crate::error::{Error, ValidationError, ValidationErrors};
use crate::reference::Reference;
use crate::schema::{LoadContext, RefOrInline};

/// Prefix of the generated local references.
pub const INPUT_BINDING_PREFIX: &str = "AZURE_ML_INPUT";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{inputs\.([\w.-]+)\}").expect("placeholder pattern is valid"));

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PortType {
    Path,
    Number,
    #[default]
    Null,
}

/// Declared shape of an input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPort {
    #[serde(rename = "type", default)]
    pub port_type: PortType,
    #[serde(
        default,
        deserialize_with = "crate::schema::deserialize_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl InputPort {
    /// Port synthesized for a placeholder nobody declared.
    pub fn implicit() -> Self {
        Self {
            port_type: PortType::Null,
            default: None,
            optional: false,
        }
    }
}

/// Document form of an input: a bare scalar or `{data, mode}`.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEntrySchema {
    Literal(String),
    Binding(InputBindingSchema),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputBindingSchema {
    #[serde(deserialize_with = "scalar_string")]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(D::Error::custom("expected a scalar value")),
    }
}

impl<'de> Deserialize<'de> for InputEntrySchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_mapping() {
            return serde_yaml::from_value(value)
                .map(InputEntrySchema::Binding)
                .map_err(D::Error::custom);
        }
        scalar_string(value)
            .map(InputEntrySchema::Literal)
            .map_err(D::Error::custom)
    }
}

impl Serialize for InputEntrySchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputEntrySchema::Literal(value) => serializer.serialize_str(value),
            InputEntrySchema::Binding(binding) => binding.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(String),
    Data(Reference<Data>),
}

impl InputValue {
    fn resolved(&self, key: &str) -> Result<String, Error> {
        match self {
            InputValue::Literal(value) => Ok(value.clone()),
            InputValue::Data(reference) => resolved_id(reference, &format!("inputs.{key}")),
        }
    }
}

/// A value connected to an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEntry {
    pub data: InputValue,
    pub mode: Option<DataBindingMode>,
}

impl InputEntry {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            data: InputValue::Literal(value.into()),
            mode: None,
        }
    }

    pub fn from_document(
        key: &str,
        doc: InputEntrySchema,
        ctx: &LoadContext,
    ) -> Result<Self, ValidationErrors> {
        let field = format!("inputs.{key}");
        match doc {
            InputEntrySchema::Literal(value) => Ok(Self::literal(value)),
            InputEntrySchema::Binding(binding) => {
                let mode = binding
                    .mode
                    .map(|mode| {
                        DataBindingMode::from_str(&mode).map_err(|_| {
                            ValidationErrors::single(
                                format!("{field}.mode"),
                                format!("unknown mode {mode}, expected mount or download"),
                            )
                        })
                    })
                    .transpose()?;
                let data = if binding.data.starts_with(ARM_ID_PREFIX) {
                    let reference = RefOrInline::<DataSchema>::Ref(binding.data).decode(
                        ctx,
                        &format!("{field}.data"),
                        AssetKind::Data,
                        false,
                    )?;
                    InputValue::Data(reference)
                } else {
                    InputValue::Literal(binding.data)
                };
                Ok(Self { data, mode })
            }
        }
    }

    pub fn to_document(&self) -> InputEntrySchema {
        let data = match &self.data {
            InputValue::Literal(value) => value.clone(),
            InputValue::Data(reference) => reference.to_document_ref().unwrap_or_default(),
        };
        match (&self.data, self.mode) {
            (InputValue::Literal(_), None) => InputEntrySchema::Literal(data),
            (_, mode) => InputEntrySchema::Binding(InputBindingSchema {
                data,
                mode: mode.map(|m| m.to_string()),
            }),
        }
    }
}

/// A command with every placeholder substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCommand {
    pub command: String,
    pub data_bindings: BTreeMap<String, DataBinding>,
}

/// Keys of every `{inputs.<key>}` placeholder in `command`.
pub fn placeholders(command: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(command)
        .map(|c| c[1].to_string())
        .collect()
}

/// Substitutes the inputs into `command`.
///
/// Ports are visited in key order. Number ports, and untyped ports connected
/// without a transfer mode, are substituted literally. Every other input is
/// replaced by the next `AZURE_ML_INPUT{n}` token and recorded as a data
/// binding.
pub fn bind_inputs(
    command: &str,
    inputs: &BTreeMap<String, InputEntry>,
    ports: &BTreeMap<String, InputPort>,
) -> Result<BoundCommand, Error> {
    let mut ports = ports.clone();
    for key in placeholders(command) {
        ports.entry(key).or_insert_with(InputPort::implicit);
    }

    let mut bound = command.to_string();
    let mut data_bindings = BTreeMap::new();
    let mut index = 0;

    for (key, port) in &ports {
        let connected = inputs.get(key);
        let placeholder = format!("{{inputs.{key}}}");
        let value = match connected {
            Some(entry) => Some(entry.data.resolved(key)?),
            None => port.default.clone(),
        };

        let Some(value) = value else {
            if !port.optional {
                return Err(ValidationErrors::from(ValidationError::new(
                    "",
                    format!("Missing required input: {key}"),
                ))
                .into());
            }
            bound = bound.replace(&placeholder, "");
            continue;
        };

        let mode = connected.and_then(|entry| entry.mode);
        let literal = port.port_type == PortType::Number
            || (port.port_type == PortType::Null && mode.is_none());
        if literal {
            bound = bound.replace(&placeholder, &value);
        } else {
            let local_reference = format!("{INPUT_BINDING_PREFIX}{index}");
            index += 1;
            bound = bound.replace(&placeholder, &local_reference);
            data_bindings.insert(
                key.clone(),
                DataBinding::new(value, Some(local_reference), mode),
            );
        }
    }

    Ok(BoundCommand {
        command: bound,
        data_bindings,
    })
}

/// Rewrites local references back to `{inputs.<key>}` and rebuilds the inputs.
///
/// Longer tokens are replaced first so `AZURE_ML_INPUT1` never clobbers
/// `AZURE_ML_INPUT10`. A command that already contained such a token as
/// literal text before binding does not round-trip.
pub fn unbind_inputs(
    command: &str,
    data_bindings: &BTreeMap<String, DataBinding>,
) -> (String, BTreeMap<String, InputEntry>) {
    let mut ordered: Vec<(&String, &DataBinding)> = data_bindings.iter().collect();
    ordered.sort_by(|(_, a), (_, b)| {
        let a = a.local_reference.as_deref().unwrap_or_default();
        let b = b.local_reference.as_deref().unwrap_or_default();
        b.len().cmp(&a.len()).then_with(|| a.cmp(b))
    });

    let mut unbound = command.to_string();
    let mut inputs = BTreeMap::new();
    for (key, binding) in ordered {
        if let Some(local) = binding.local_reference.as_deref().filter(|l| !l.is_empty()) {
            unbound = unbound.replace(local, &format!("{{inputs.{key}}}"));
        }
        let source = &binding.source_data_reference;
        let data = if is_canonical(source) {
            InputValue::Data(Reference::Canonical(source.clone()))
        } else {
            InputValue::Literal(source.clone())
        };
        inputs.insert(
            key.clone(),
            InputEntry {
                data,
                mode: binding.mode,
            },
        );
    }
    (unbound, inputs)
}
