//! Configuration types for Techne

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::compaction::{
    CONVERSATION_PLACEHOLDER, DEFAULT_KEEP_LAST, DEFAULT_PLACEHOLDER, DEFAULT_TRIGGER_RATIO,
    DEFAULT_TRIGGER_THRESHOLD, TokenAccounting,
};
use crate::error::{Result, TechneError};
use crate::spec::AgentSpec;
use crate::tools::{
    BoxedBeforeHook, PermissionRule, ToolPermission, default_permission_key, permission_hook,
};

/// Main configuration for Techne
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechneConfig {
    /// History compaction settings
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Tool permission rules
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Declarative agent definition (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentSpec>,
}

/// Settings shared by the compaction policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Recent messages never compacted
    pub keep_last: usize,

    /// Replacement for masked tool-return content
    pub placeholder: String,

    /// Context utilization above which compaction fires
    pub trigger_ratio: f64,

    /// Message count that triggers summarization when utilization is unknown
    pub trigger_threshold: usize,

    /// Token count compared against the context window
    pub accounting: TokenAccounting,

    /// Summarizer prompt template; must contain `{conversation}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_prompt: Option<String>,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            keep_last: DEFAULT_KEEP_LAST,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            trigger_ratio: DEFAULT_TRIGGER_RATIO,
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            accounting: TokenAccounting::default(),
            summary_prompt: None,
        }
    }
}

/// Ordered permission rules plus the decision when none match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub rules: Vec<PermissionRule>,
    pub default: ToolPermission,
}

impl PermissionsConfig {
    /// Before-call hook keyed on the tool name
    pub fn hook(&self) -> BoxedBeforeHook {
        permission_hook(self.rules.clone(), default_permission_key, self.default)
    }
}

impl TechneConfig {
    /// Load configuration from standard locations
    ///
    /// Loads in this order, later sources overriding earlier ones:
    /// 1. Defaults
    /// 2. `techne.toml` in the working directory
    /// 3. The file named by `TECHNE_CONFIG_PATH`, if set
    /// 4. `TECHNE_` environment variables, nested keys split on `__`
    ///    (`TECHNE_COMPACTION__KEEP_LAST=4`)
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("techne.toml"));

        if let Ok(path) = std::env::var("TECHNE_CONFIG_PATH") {
            figment = figment.merge(file_provider(Path::new(&path)));
        }

        let config: TechneConfig = figment
            .merge(Env::prefixed("TECHNE_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| TechneError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML, YAML or JSON file, chosen by extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: TechneConfig = file_provider(path).extract().map_err(|e| {
            TechneError::Configuration(format!("Failed to load configuration file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        let compaction = &self.compaction;
        if !(compaction.trigger_ratio > 0.0 && compaction.trigger_ratio <= 1.0) {
            return Err(TechneError::Configuration(format!(
                "compaction.trigger_ratio must be in (0, 1], got {}",
                compaction.trigger_ratio
            )));
        }
        if compaction.placeholder.is_empty() {
            return Err(TechneError::Configuration(
                "compaction.placeholder must not be empty".to_string(),
            ));
        }
        if let Some(prompt) = &compaction.summary_prompt
            && !prompt.contains(CONVERSATION_PLACEHOLDER)
        {
            return Err(TechneError::Configuration(format!(
                "compaction.summary_prompt must contain {CONVERSATION_PLACEHOLDER}"
            )));
        }
        Ok(())
    }
}

fn file_provider(path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
        Some("json") => Figment::from(Json::file(path)),
        _ => Figment::from(Toml::file(path)),
    }
}
