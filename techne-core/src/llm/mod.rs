//! Model-facing collaborators
//!
//! Techne never talks to a provider directly. A [`ModelClient`] sends a
//! prepared request and returns a response carrying token usage; a
//! [`TextAgent`] runs a prompt to completion and is used by summarization.

mod settings;

pub use settings::{
    BuiltinTool, ModelRequestParameters, ModelSettings, WebSearchTool, merge_model_settings,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TechneError};
use crate::messages::{ModelMessage, ModelResponse};

/// Static facts about the model a run talks to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    /// Context window size in tokens, when known
    #[serde(default)]
    pub context_window: Option<u64>,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context_window: None,
        }
    }

    pub fn with_context_window(mut self, tokens: u64) -> Self {
        self.context_window = Some(tokens);
        self
    }
}

/// Sends a single request to a model provider
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn request(
        &self,
        messages: &[ModelMessage],
        settings: &ModelSettings,
        parameters: &ModelRequestParameters,
    ) -> Result<ModelResponse>;

    fn profile(&self) -> ModelProfile;
}

/// Output of a single-shot agent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub output: String,
}

/// Anything that can turn a text prompt into text output
#[async_trait]
pub trait TextAgent: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<AgentOutput>;
}

/// Placeholder client that fails every request
///
/// Useful as a default until a real provider is wired in.
#[derive(Debug, Clone, Default)]
pub struct StubModelClient;

#[async_trait]
impl ModelClient for StubModelClient {
    async fn request(
        &self,
        _messages: &[ModelMessage],
        _settings: &ModelSettings,
        _parameters: &ModelRequestParameters,
    ) -> Result<ModelResponse> {
        Err(TechneError::Configuration(
            "Model client not configured. Implement the ModelClient trait for your provider"
                .to_string(),
        ))
    }

    fn profile(&self) -> ModelProfile {
        ModelProfile::new("stub")
    }
}
