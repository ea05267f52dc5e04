//! Declarative agent files

use std::path::Path;

use figment::Figment;
use figment::providers::{Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};

use super::{NamedSpec, SpecRegistry, SpecType, build_registry, load_from_registry};
use crate::capabilities::{BoxedCapability, CombinedCapability, capability_types};
use crate::error::{Result, TechneError};

/// An agent described as data: a model name plus capability specs
///
/// ```yaml
/// model: anthropic:claude-sonnet-4-5
/// capabilities:
///   - Thinking
///   - Instructions: You are a careful reviewer.
///   - ModelSettings: { max_tokens: 2048 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub model: String,
    #[serde(default)]
    pub capabilities: Vec<NamedSpec>,
}

impl AgentSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, spec: NamedSpec) -> Self {
        self.capabilities.push(spec);
        self
    }

    /// Load from a YAML, JSON or TOML file, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
            Some("json") => Figment::from(Json::file(path)),
            _ => Figment::from(Toml::file(path)),
        };
        figment.extract().map_err(|e| {
            TechneError::Configuration(format!(
                "Failed to load agent spec from {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Figment::from(Yaml::string(source))
            .extract()
            .map_err(|e| TechneError::Configuration(format!("Failed to parse agent spec: {}", e)))
    }

    /// Construct every capability and fold them into one
    ///
    /// `custom_types` take priority over the built-in capability types. To
    /// build several agents against the same types, create the registry once
    /// with [`capability_registry`] and use [`Self::build_capabilities_from`].
    pub fn build_capabilities(
        &self,
        custom_types: Vec<SpecType<BoxedCapability>>,
    ) -> Result<CombinedCapability> {
        let registry = capability_registry(custom_types)?;
        self.build_capabilities_from(&registry)
    }

    /// Construct every capability from an already built registry
    pub fn build_capabilities_from(
        &self,
        registry: &SpecRegistry<BoxedCapability>,
    ) -> Result<CombinedCapability> {
        let capabilities = self
            .capabilities
            .iter()
            .map(|spec| {
                load_from_registry(
                    registry,
                    spec,
                    "capability",
                    "custom_capability_types",
                    Some("agent spec"),
                    None,
                )
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::info!(
            model = %self.model,
            capabilities = capabilities.len(),
            "built capabilities from agent spec"
        );
        Ok(CombinedCapability::new(capabilities))
    }
}

/// Registry of the built-in capability types, overridden by `custom_types`
pub fn capability_registry(
    custom_types: Vec<SpecType<BoxedCapability>>,
) -> Result<SpecRegistry<BoxedCapability>> {
    Ok(build_registry(
        custom_types,
        capability_types(),
        |spec_type| spec_type.serialization_name().map(str::to_string),
        "capability",
        None,
    )?)
}
