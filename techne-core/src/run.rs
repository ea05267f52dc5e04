//! Per-run state threaded through capabilities, tools and history processors

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capabilities::Capability;
use crate::error::Result;
use crate::llm::{ModelClient, ModelProfile, ModelRequestParameters, ModelSettings};
use crate::messages::{ModelMessage, ModelResponse, RunUsage};

/// Context for the current step of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: String,
    pub model: ModelProfile,
    #[serde(default)]
    pub usage: RunUsage,
    #[serde(default)]
    pub run_step: usize,
}

impl RunContext {
    pub fn new(model: ModelProfile) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            model,
            usage: Default::default(),
            run_step: 0,
        }
    }

    pub fn with_usage(mut self, usage: RunUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Context for the following step, keeping run identity and usage
    pub fn next_step(&self) -> Self {
        Self {
            run_step: self.run_step + 1,
            ..self.clone()
        }
    }
}

/// The request triple rewritten by `before_model_request` hooks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedRequest {
    pub messages: Vec<ModelMessage>,
    pub model_settings: ModelSettings,
    pub parameters: ModelRequestParameters,
}

impl PreparedRequest {
    pub fn new(messages: Vec<ModelMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model_settings(mut self, settings: ModelSettings) -> Self {
        self.model_settings = settings;
        self
    }

    pub fn with_parameters(mut self, parameters: ModelRequestParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Run one model turn: capability before-hook, request, capability after-hook
///
/// Returns the request as it was actually sent together with the response.
pub async fn run_model_turn(
    capability: &dyn Capability,
    client: &dyn ModelClient,
    ctx: &RunContext,
    prepared: PreparedRequest,
) -> Result<(PreparedRequest, ModelResponse)> {
    let prepared = capability.before_model_request(ctx, prepared).await?;
    tracing::debug!(
        run_id = %ctx.run_id,
        run_step = ctx.run_step,
        messages = prepared.messages.len(),
        "sending model request"
    );
    let response = client
        .request(&prepared.messages, &prepared.model_settings, &prepared.parameters)
        .await?;
    let response = capability.after_model_request(ctx, response).await?;
    Ok((prepared, response))
}
