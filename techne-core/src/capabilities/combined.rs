use std::sync::Arc;

use async_trait::async_trait;

use super::{BoxedCapability, Capability, Instructions, normalize_instructions};
use crate::error::Result;
use crate::llm::{BuiltinTool, ModelSettings};
use crate::messages::ModelResponse;
use crate::run::{PreparedRequest, RunContext};
use crate::tools::{BoxedToolset, CombinedToolset};

/// A list of capabilities acting as one
///
/// Contributions are merged in list order: instructions and builtin tools are
/// concatenated, settings are layered with later entries winning, and toolsets
/// are gathered into a [`CombinedToolset`]. An empty merge is reported as
/// `None`, never as an empty value.
#[derive(Clone, Default)]
pub struct CombinedCapability {
    capabilities: Vec<BoxedCapability>,
}

impl CombinedCapability {
    pub fn new(capabilities: Vec<BoxedCapability>) -> Self {
        Self { capabilities }
    }

    pub fn with_capability(mut self, capability: BoxedCapability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn capabilities(&self) -> &[BoxedCapability] {
        &self.capabilities
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[async_trait]
impl Capability for CombinedCapability {
    fn get_instructions(&self) -> Option<Instructions> {
        let instructions: Vec<_> = self
            .capabilities
            .iter()
            .flat_map(|capability| normalize_instructions(capability.get_instructions()))
            .collect();
        (!instructions.is_empty()).then_some(Instructions::Many(instructions))
    }

    fn get_model_settings(&self) -> Option<ModelSettings> {
        let merged = self
            .capabilities
            .iter()
            .filter_map(|capability| capability.get_model_settings())
            .fold(ModelSettings::default(), |merged, settings| merged.merge(&settings));
        (!merged.is_empty()).then_some(merged)
    }

    fn get_toolset(&self) -> Option<BoxedToolset> {
        let toolsets: Vec<BoxedToolset> = self
            .capabilities
            .iter()
            .filter_map(|capability| capability.get_toolset())
            .collect();
        if toolsets.is_empty() {
            return None;
        }
        Some(Arc::new(CombinedToolset::new(toolsets)))
    }

    fn get_builtin_tools(&self) -> Vec<BuiltinTool> {
        self.capabilities
            .iter()
            .flat_map(|capability| capability.get_builtin_tools())
            .collect()
    }

    async fn before_model_request(
        &self,
        ctx: &RunContext,
        mut request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        for capability in &self.capabilities {
            request = capability.before_model_request(ctx, request).await?;
        }
        Ok(request)
    }

    async fn after_model_request(
        &self,
        ctx: &RunContext,
        mut response: ModelResponse,
    ) -> Result<ModelResponse> {
        for capability in self.capabilities.iter().rev() {
            response = capability.after_model_request(ctx, response).await?;
        }
        Ok(response)
    }
}
