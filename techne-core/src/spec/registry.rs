//! Spec-constructible types and the name registry

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{NamedSpec, SpecError};
use crate::error::BoxError;

/// Registry of constructible types keyed by serialization name
pub type SpecRegistry<T> = IndexMap<String, Arc<SpecType<T>>>;

/// Custom construction hook used in place of [`SpecType::instantiate`]
pub type InstantiateFn<T> =
    dyn Fn(&SpecType<T>, &[Value], &Map<String, Value>) -> Result<T, BoxError> + Send + Sync;

type BuildFn<T> = dyn Fn(Map<String, Value>) -> Result<T, BoxError> + Send + Sync;
type FromSpecFn<T> = dyn Fn(&[Value], &Map<String, Value>) -> Result<T, BoxError> + Send + Sync;

/// Raised when spec arguments do not fit a type's parameter list
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ArgumentError(pub String);

/// One construction parameter of a spec type
#[derive(Debug, Clone, PartialEq)]
pub struct SpecParam {
    pub name: String,
    /// JSON schema of the accepted value
    pub schema: Value,
    pub required: bool,
}

impl SpecParam {
    pub fn required(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
        }
    }
}

/// A type that can be built from a [`NamedSpec`]
///
/// `build` receives the arguments bound to parameter names. Types that need to
/// interpret raw arguments themselves supply a `from_spec` hook instead.
pub struct SpecType<T> {
    type_name: String,
    serialization_name: Option<String>,
    parameters: Vec<SpecParam>,
    build: Arc<BuildFn<T>>,
    from_spec: Option<Arc<FromSpecFn<T>>>,
}

impl<T> Clone for SpecType<T> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            serialization_name: self.serialization_name.clone(),
            parameters: self.parameters.clone(),
            build: Arc::clone(&self.build),
            from_spec: self.from_spec.clone(),
        }
    }
}

impl<T> fmt::Debug for SpecType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecType")
            .field("type_name", &self.type_name)
            .field("serialization_name", &self.serialization_name)
            .field("parameters", &self.parameters)
            .field("custom_from_spec", &self.from_spec.is_some())
            .finish()
    }
}

impl<T> SpecType<T> {
    /// New type whose serialization name equals its type name
    pub fn new<F>(type_name: impl Into<String>, parameters: Vec<SpecParam>, build: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        Self {
            serialization_name: Some(type_name.clone()),
            type_name,
            parameters,
            build: Arc::new(build),
            from_spec: None,
        }
    }

    /// New type whose bound arguments deserialize into `A`
    pub fn from_deserialize<A, F>(
        type_name: impl Into<String>,
        parameters: Vec<SpecParam>,
        build: F,
    ) -> Self
    where
        A: DeserializeOwned,
        F: Fn(A) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(type_name, parameters, move |bound| {
            let args: A = serde_json::from_value(Value::Object(bound))?;
            build(args)
        })
    }

    pub fn with_serialization_name(mut self, name: impl Into<String>) -> Self {
        self.serialization_name = Some(name.into());
        self
    }

    /// Opt out of spec construction; registries refuse or skip this type
    pub fn opt_out(mut self) -> Self {
        self.serialization_name = None;
        self
    }

    /// Interpret raw spec arguments instead of binding them to parameters
    pub fn with_from_spec<F>(mut self, from_spec: F) -> Self
    where
        F: Fn(&[Value], &Map<String, Value>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.from_spec = Some(Arc::new(from_spec));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn serialization_name(&self) -> Option<&str> {
        self.serialization_name.as_deref()
    }

    pub fn parameters(&self) -> &[SpecParam] {
        &self.parameters
    }

    /// Bind positional arguments first, then keyword arguments, to parameter names
    pub fn bind_arguments(
        &self,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ArgumentError> {
        if args.len() > self.parameters.len() {
            return Err(ArgumentError(format!(
                "{}() takes {} positional argument(s) but {} were given",
                self.type_name,
                self.parameters.len(),
                args.len()
            )));
        }

        let mut bound = Map::new();
        for (param, value) in self.parameters.iter().zip(args) {
            bound.insert(param.name.clone(), value.clone());
        }

        for (key, value) in kwargs {
            if !self.parameters.iter().any(|param| &param.name == key) {
                return Err(ArgumentError(format!(
                    "{}() got an unexpected keyword argument '{key}'",
                    self.type_name
                )));
            }
            if bound.contains_key(key) {
                return Err(ArgumentError(format!(
                    "{}() got multiple values for argument '{key}'",
                    self.type_name
                )));
            }
            bound.insert(key.clone(), value.clone());
        }

        let missing: Vec<&str> = self
            .parameters
            .iter()
            .filter(|param| param.required && !bound.contains_key(&param.name))
            .map(|param| param.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ArgumentError(format!(
                "{}() missing required argument(s): '{}'",
                self.type_name,
                missing.join("', '")
            )));
        }

        Ok(bound)
    }

    /// Construct a value from spec arguments
    pub fn instantiate(&self, args: &[Value], kwargs: &Map<String, Value>) -> Result<T, BoxError> {
        if let Some(from_spec) = &self.from_spec {
            return from_spec(args, kwargs);
        }
        let bound = self.bind_arguments(args, kwargs)?;
        (self.build)(bound)
    }
}

/// Build a registry from custom types and defaults
///
/// Custom types always win. Two custom types with the same name, or a custom
/// type whose name resolves to nothing, are errors. Defaults only fill names
/// that are still free and are skipped silently when they opt out.
pub fn build_registry<T, N>(
    custom_types: impl IntoIterator<Item = SpecType<T>>,
    defaults: impl IntoIterator<Item = SpecType<T>>,
    get_name: N,
    label: &str,
    validate: Option<&dyn Fn(&SpecType<T>) -> Result<(), BoxError>>,
) -> Result<SpecRegistry<T>, SpecError>
where
    N: Fn(&SpecType<T>) -> Option<String>,
{
    let mut registry = SpecRegistry::new();
    let mut custom_names = HashSet::new();

    for spec_type in custom_types {
        if let Some(validate) = validate {
            validate(&spec_type).map_err(|source| SpecError::Invalid {
                label: label.to_string(),
                type_name: spec_type.type_name().to_string(),
                source,
            })?;
        }
        let name = match get_name(&spec_type) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(SpecError::OptedOut {
                    label: label.to_string(),
                    type_name: spec_type.type_name().to_string(),
                });
            }
        };
        if !custom_names.insert(name.clone()) {
            return Err(SpecError::Duplicate {
                label: label.to_string(),
                name,
            });
        }
        registry.insert(name, Arc::new(spec_type));
    }

    for spec_type in defaults {
        if let Some(name) = get_name(&spec_type).filter(|name| !name.is_empty()) {
            registry.entry(name).or_insert_with(|| Arc::new(spec_type));
        }
    }

    tracing::debug!(
        label,
        custom = custom_names.len(),
        total = registry.len(),
        "built spec registry"
    );
    Ok(registry)
}

/// Resolve a spec against a registry and construct the value
pub fn load_from_registry<T>(
    registry: &SpecRegistry<T>,
    spec: &NamedSpec,
    label: &str,
    custom_types_param: &str,
    context: Option<&str>,
    instantiate: Option<&InstantiateFn<T>>,
) -> Result<T, SpecError> {
    let Some(spec_type) = registry.get(&spec.name) else {
        return Err(SpecError::UnknownName {
            label: label.to_string(),
            name: spec.name.clone(),
            custom_types_param: custom_types_param.to_string(),
            valid: registry.keys().cloned().collect(),
        });
    };

    let args = spec.args();
    let kwargs = spec.kwargs();
    let result = match instantiate {
        Some(instantiate) => instantiate(spec_type, args, &kwargs),
        None => spec_type.instantiate(args, &kwargs),
    };

    result.map_err(|source| {
        tracing::debug!(label, name = %spec.name, error = %source, "spec instantiation failed");
        SpecError::Instantiate {
            label: label.to_string(),
            name: spec.name.clone(),
            context: context.map(str::to_string),
            source,
        }
    })
}
