//! Declarative construction of components from `(name, arguments)` data
//!
//! A [`NamedSpec`] is parsed from one of three short forms:
//!
//! ```text
//! "Thinking"                              -> no arguments
//! {"Instructions": "Be terse."}           -> one positional argument
//! {"ModelSettings": {"max_tokens": 512}}  -> keyword arguments
//! ```
//!
//! or from the long form `{"name": ..., "arguments": ...}`. Specs are resolved
//! against a [`SpecRegistry`] built once with [`build_registry`] and turned into
//! values with [`load_from_registry`].

mod agent;
mod registry;
mod schema;

pub use agent::{AgentSpec, capability_registry};
pub use registry::{
    ArgumentError, InstantiateFn, SpecParam, SpecRegistry, SpecType, build_registry,
    load_from_registry,
};
pub use schema::build_schema_types;

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::BoxError;

/// Errors raised while parsing, registering or instantiating specs
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("Expected a single key containing the class name, found keys {}", quoted_list(.keys))]
    InvalidShape { keys: Vec<String> },

    #[error("Invalid spec: {0}")]
    InvalidValue(String),

    #[error("Custom {label} type `{type_name}` has opted out of spec construction (no serialization name)")]
    OptedOut { label: String, type_name: String },

    #[error("Duplicate {label} class name: '{name}'")]
    Duplicate { label: String, name: String },

    #[error("Invalid custom {label} type `{type_name}`: {source}")]
    Invalid {
        label: String,
        type_name: String,
        #[source]
        source: BoxError,
    },

    #[error(
        "{} '{name}' is not in the provided `{custom_types_param}`. Valid choices: {}. \
         If you are trying to use a custom {label}, you must include its type in the `{custom_types_param}` argument.",
        capitalize(.label),
        quoted_list(.valid)
    )]
    UnknownName {
        label: String,
        name: String,
        custom_types_param: String,
        valid: Vec<String>,
    },

    #[error("Failed to instantiate {label} '{name}'{}: {source}", context_suffix(.context))]
    Instantiate {
        label: String,
        name: String,
        context: Option<String>,
        #[source]
        source: BoxError,
    },
}

fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_deref()
        .map(|ctx| format!(" for {ctx}"))
        .unwrap_or_default()
}

/// Arguments carried by a [`NamedSpec`]
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SpecArguments {
    #[default]
    None,
    /// Exactly one positional argument; a list stays a single argument
    Positional(Value),
    Keyword(Map<String, Value>),
}

/// A serializable `(name, arguments)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSpec {
    pub name: String,
    pub arguments: SpecArguments,
}

impl NamedSpec {
    /// Spec without arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: SpecArguments::None,
        }
    }

    pub fn positional(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            arguments: SpecArguments::Positional(value),
        }
    }

    pub fn keyword(name: impl Into<String>, kwargs: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments: SpecArguments::Keyword(kwargs),
        }
    }

    /// Positional arguments; at most one
    pub fn args(&self) -> &[Value] {
        match &self.arguments {
            SpecArguments::Positional(value) => std::slice::from_ref(value),
            _ => &[],
        }
    }

    /// Keyword arguments; empty unless the spec was given a mapping
    pub fn kwargs(&self) -> Cow<'_, Map<String, Value>> {
        match &self.arguments {
            SpecArguments::Keyword(kwargs) => Cow::Borrowed(kwargs),
            _ => Cow::Owned(Map::new()),
        }
    }

    /// Parse any accepted serialized form
    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        match value {
            Value::String(name) => Ok(Self::new(name)),
            Value::Object(map) if is_long_form(&map) => Self::from_long_form(map),
            Value::Object(map) => {
                if map.len() != 1 {
                    return Err(SpecError::InvalidShape {
                        keys: map.keys().cloned().collect(),
                    });
                }
                let Some((name, value)) = map.into_iter().next() else {
                    return Err(SpecError::InvalidShape { keys: Vec::new() });
                };
                Ok(match value {
                    Value::Object(kwargs) => Self::keyword(name, kwargs),
                    other => Self::positional(name, other),
                })
            }
            other => Err(SpecError::InvalidValue(format!(
                "expected a string or a mapping, got {other}"
            ))),
        }
    }

    fn from_long_form(mut map: Map<String, Value>) -> Result<Self, SpecError> {
        let name = match map.remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(SpecError::InvalidValue("`name` must be a string".to_string())),
        };
        let arguments = match map.remove("arguments") {
            None | Some(Value::Null) => SpecArguments::None,
            Some(Value::Object(kwargs)) => SpecArguments::Keyword(kwargs),
            Some(Value::Array(mut items)) if items.len() == 1 => {
                SpecArguments::Positional(items.remove(0))
            }
            Some(other) => {
                return Err(SpecError::InvalidValue(format!(
                    "`arguments` must be null, a one-element list or a mapping, got {other}"
                )));
            }
        };
        Ok(Self { name, arguments })
    }

    /// Short serialized form
    ///
    /// Falls back to the long form when a positional argument is itself a
    /// mapping, since the short form would read back as keyword arguments.
    pub fn to_value(&self) -> Value {
        match &self.arguments {
            SpecArguments::None => Value::String(self.name.clone()),
            SpecArguments::Positional(Value::Object(_)) => self.to_long_form(),
            SpecArguments::Positional(value) => single_entry(&self.name, value.clone()),
            SpecArguments::Keyword(kwargs) => single_entry(&self.name, Value::Object(kwargs.clone())),
        }
    }

    /// `{"name": ..., "arguments": ...}` form
    pub fn to_long_form(&self) -> Value {
        let arguments = match &self.arguments {
            SpecArguments::None => Value::Null,
            SpecArguments::Positional(value) => Value::Array(vec![value.clone()]),
            SpecArguments::Keyword(kwargs) => Value::Object(kwargs.clone()),
        };
        let mut map = Map::new();
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("arguments".to_string(), arguments);
        Value::Object(map)
    }
}

/// `{"name": str, "arguments": ...}` with both keys present and nothing else
fn is_long_form(map: &Map<String, Value>) -> bool {
    map.len() == 2
        && matches!(map.get("name"), Some(Value::String(_)))
        && map.contains_key("arguments")
}

fn single_entry(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

impl From<&str> for NamedSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl Serialize for NamedSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NamedSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        NamedSpec::from_value(value).map_err(serde::de::Error::custom)
    }
}
