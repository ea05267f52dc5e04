use std::sync::Arc;

use async_trait::async_trait;

use super::masking::ObservationMasking;
use super::summarization::Summarization;
use super::trigger::TokenAccounting;
use crate::capabilities::{Capability, HistoryProcessor, validate_history};
use crate::config::CompactionConfig;
use crate::error::Result;
use crate::llm::TextAgent;
use crate::messages::ModelMessage;
use crate::run::{PreparedRequest, RunContext};

/// Masks old tool returns, then summarizes what is old
///
/// Masking first keeps the transcript handed to the summarizer small.
#[derive(Clone)]
pub struct MaskedSummarization {
    masking: ObservationMasking,
    summarization: Summarization,
}

impl MaskedSummarization {
    pub fn new(agent: Arc<dyn TextAgent>) -> Self {
        Self {
            masking: ObservationMasking::new(),
            summarization: Summarization::new(agent),
        }
    }

    pub fn from_config(agent: Arc<dyn TextAgent>, config: &CompactionConfig) -> Result<Self> {
        Ok(Self {
            masking: ObservationMasking::from_config(config),
            summarization: Summarization::from_config(agent, config)?,
        })
    }

    /// Recent messages left alone by both steps
    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.masking = self.masking.with_keep_last(keep_last);
        self.summarization = self.summarization.with_keep_last(keep_last);
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.masking = self.masking.with_placeholder(placeholder);
        self
    }

    pub fn with_trigger_ratio(mut self, ratio: f64) -> Self {
        self.masking = self.masking.with_trigger_ratio(ratio);
        self.summarization = self.summarization.with_trigger_ratio(ratio);
        self
    }

    pub fn with_trigger_threshold(mut self, threshold: usize) -> Self {
        self.summarization = self.summarization.with_trigger_threshold(threshold);
        self
    }

    pub fn with_accounting(mut self, accounting: TokenAccounting) -> Self {
        self.masking = self.masking.with_accounting(accounting);
        self.summarization = self.summarization.with_accounting(accounting);
        self
    }

    pub fn with_summary_prompt(mut self, prompt: impl Into<String>) -> Result<Self> {
        self.summarization = self.summarization.with_summary_prompt(prompt)?;
        Ok(self)
    }

    pub async fn compact_messages(
        &self,
        ctx: &RunContext,
        messages: Vec<ModelMessage>,
    ) -> Result<Vec<ModelMessage>> {
        let masked = self.masking.mask_messages(ctx, &messages);
        self.summarization.summarize_messages(ctx, masked).await
    }
}

#[async_trait]
impl HistoryProcessor for MaskedSummarization {
    async fn process(&self, ctx: &RunContext, messages: Vec<ModelMessage>) -> Result<Vec<ModelMessage>> {
        self.compact_messages(ctx, messages).await
    }
}

#[async_trait]
impl Capability for MaskedSummarization {
    async fn before_model_request(
        &self,
        ctx: &RunContext,
        mut request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        let mut messages = self.compact_messages(ctx, request.messages).await?;
        validate_history(&mut messages)?;
        request.messages = messages;
        Ok(request)
    }
}
