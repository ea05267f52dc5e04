//! Model settings and request parameters

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolDefinition;

/// Settings forwarded to the model provider
///
/// Every common field is optional so that a partial settings object can be
/// layered over another with [`merge_model_settings`]. Provider-specific keys
/// (for example `openai_reasoning_effort`) live in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Stored as given; range checks belong to the provider
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.max_tokens.is_none()
            && self.temperature.is_none()
            && self.top_p.is_none()
            && self.timeout.is_none()
            && self.parallel_tool_calls.is_none()
            && self.seed.is_none()
            && self.presence_penalty.is_none()
            && self.frequency_penalty.is_none()
            && self.stop_sequences.is_none()
            && self.extra.is_empty()
    }

    /// Layer `overrides` on top of `self`; set fields win, unset ones fall through
    pub fn merge(&self, overrides: &ModelSettings) -> ModelSettings {
        let mut extra = self.extra.clone();
        extra.extend(overrides.extra.clone());
        ModelSettings {
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            timeout: overrides.timeout.or(self.timeout),
            parallel_tool_calls: overrides.parallel_tool_calls.or(self.parallel_tool_calls),
            seed: overrides.seed.or(self.seed),
            presence_penalty: overrides.presence_penalty.or(self.presence_penalty),
            frequency_penalty: overrides.frequency_penalty.or(self.frequency_penalty),
            stop_sequences: overrides
                .stop_sequences
                .clone()
                .or_else(|| self.stop_sequences.clone()),
            extra,
        }
    }
}

/// Merge two optional settings objects
pub fn merge_model_settings(
    base: Option<&ModelSettings>,
    overrides: Option<&ModelSettings>,
) -> Option<ModelSettings> {
    match (base, overrides) {
        (Some(base), Some(overrides)) => Some(base.merge(overrides)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

/// A tool executed by the model provider itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuiltinTool {
    WebSearch(WebSearchTool),
    CodeExecution,
    WebFetch,
}

impl BuiltinTool {
    /// Identifier used to match function tools that defer to this builtin
    pub fn unique_id(&self) -> &'static str {
        match self {
            BuiltinTool::WebSearch(_) => "web_search",
            BuiltinTool::CodeExecution => "code_execution",
            BuiltinTool::WebFetch => "web_fetch",
        }
    }
}

/// Provider-side web search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSearchTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_context_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_domains: Vec<String>,
}

/// Everything besides messages and settings that shapes a model request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequestParameters {
    #[serde(default)]
    pub function_tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub builtin_tools: Vec<BuiltinTool>,
    #[serde(default = "default_allow_text_output")]
    pub allow_text_output: bool,
}

fn default_allow_text_output() -> bool {
    true
}

impl Default for ModelRequestParameters {
    fn default() -> Self {
        Self {
            function_tools: Vec::new(),
            builtin_tools: Vec::new(),
            allow_text_output: true,
        }
    }
}
