use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use super::format::format_messages;
use super::trigger::{TokenAccounting, Trigger};
use crate::capabilities::{Capability, HistoryProcessor, validate_history};
use crate::config::CompactionConfig;
use crate::error::{Result, TechneError};
use crate::llm::TextAgent;
use crate::messages::{ModelMessage, ModelRequest, RequestPart};
use crate::run::{PreparedRequest, RunContext};

/// Placeholder the summary prompt must contain
pub const CONVERSATION_PLACEHOLDER: &str = "{conversation}";

pub const DEFAULT_SUMMARY_PROMPT: &str = "\
Summarize the following conversation concisely, preserving key facts, decisions, \
and context that would be needed to continue the conversation. \
Focus on what was asked, what was decided, and any important results from tool calls.

Conversation:
{conversation}
";

/// Prefix of the system prompt that replaces summarized messages
pub const SUMMARY_PREFIX: &str = "Summary of prior conversation:\n";

pub const DEFAULT_TRIGGER_THRESHOLD: usize = 20;

/// Replaces old messages with a summary written by a secondary agent
///
/// The secondary agent is typically a cheaper model. Its failures are
/// returned unchanged.
#[derive(Clone)]
pub struct Summarization {
    agent: Arc<dyn TextAgent>,
    trigger_threshold: usize,
    keep_last: usize,
    summary_prompt: String,
    trigger_ratio: f64,
    accounting: TokenAccounting,
}

impl Summarization {
    pub fn new(agent: Arc<dyn TextAgent>) -> Self {
        Self {
            agent,
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            keep_last: super::masking::DEFAULT_KEEP_LAST,
            summary_prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
            trigger_ratio: super::masking::DEFAULT_TRIGGER_RATIO,
            accounting: TokenAccounting::default(),
        }
    }

    pub fn from_config(agent: Arc<dyn TextAgent>, config: &CompactionConfig) -> Result<Self> {
        let summarization = Self::new(agent)
            .with_keep_last(config.keep_last)
            .with_trigger_threshold(config.trigger_threshold)
            .with_trigger_ratio(config.trigger_ratio)
            .with_accounting(config.accounting);
        match &config.summary_prompt {
            Some(prompt) => summarization.with_summary_prompt(prompt.clone()),
            None => Ok(summarization),
        }
    }

    /// Message count that triggers when the context window is unknown
    pub fn with_trigger_threshold(mut self, threshold: usize) -> Self {
        self.trigger_threshold = threshold;
        self
    }

    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.keep_last = keep_last;
        self
    }

    pub fn with_trigger_ratio(mut self, ratio: f64) -> Self {
        self.trigger_ratio = ratio;
        self
    }

    pub fn with_accounting(mut self, accounting: TokenAccounting) -> Self {
        self.accounting = accounting;
        self
    }

    /// Replace the prompt template; it must contain `{conversation}`
    pub fn with_summary_prompt(mut self, prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if !prompt.contains(CONVERSATION_PLACEHOLDER) {
            return Err(TechneError::Configuration(format!(
                "Summary prompt must contain {CONVERSATION_PLACEHOLDER}"
            )));
        }
        self.summary_prompt = prompt;
        Ok(self)
    }

    pub fn keep_last(&self) -> usize {
        self.keep_last
    }

    pub fn summary_prompt(&self) -> &str {
        &self.summary_prompt
    }

    fn trigger(&self) -> Trigger {
        Trigger {
            trigger_ratio: self.trigger_ratio,
            fallback_threshold: self.trigger_threshold,
            accounting: self.accounting,
        }
    }

    /// Summarize everything before the last `keep_last` messages
    ///
    /// Returns `[summary, recent...]` when the trigger fires and the history
    /// unchanged otherwise.
    pub async fn summarize_messages(
        &self,
        ctx: &RunContext,
        messages: Vec<ModelMessage>,
    ) -> Result<Vec<ModelMessage>> {
        let check = self.trigger().check(ctx, &messages);
        if !check.triggered {
            return Ok(messages);
        }

        let cutoff = pair_safe_cutoff(&messages, messages.len().saturating_sub(self.keep_last));
        if cutoff == 0 {
            return Ok(messages);
        }

        let span = tracing::info_span!(
            "capability compaction/summarization",
            capability = "compaction/summarization",
            trigger_ratio = self.trigger_ratio,
            context_utilization = check.utilization,
            total_tokens = check.observed_tokens,
            context_window = check.context_window,
            messages_total = messages.len(),
            messages_kept = messages.len() - cutoff,
            messages_summarized = cutoff,
        );

        let mut recent = messages;
        let older: Vec<ModelMessage> = recent.drain(..cutoff).collect();
        let prompt = self
            .summary_prompt
            .replace(CONVERSATION_PLACEHOLDER, &format_messages(&older));

        let result = self.agent.run(&prompt).instrument(span.clone()).await?;
        span.in_scope(|| {
            tracing::debug!(
                summarized = older.len(),
                summary_len = result.output.len(),
                "summarized prior conversation"
            )
        });

        let summary = ModelRequest::system_prompt(format!("{SUMMARY_PREFIX}{}", result.output));
        let mut compacted = Vec::with_capacity(recent.len() + 1);
        compacted.push(ModelMessage::Request(summary));
        compacted.extend(recent);
        Ok(compacted)
    }
}

/// Move `cutoff` back so no tool return is separated from its call
///
/// A request holding tool returns or tool retries belongs with the response
/// right before it.
pub(crate) fn pair_safe_cutoff(messages: &[ModelMessage], mut cutoff: usize) -> usize {
    while cutoff > 0 && cutoff < messages.len() && answers_tool_call(&messages[cutoff]) {
        cutoff -= 1;
    }
    cutoff
}

fn answers_tool_call(message: &ModelMessage) -> bool {
    message.as_request().is_some_and(|request| {
        request.parts.iter().any(|part| match part {
            RequestPart::ToolReturn(_) => true,
            RequestPart::RetryPrompt(retry) => retry.tool_name.is_some(),
            _ => false,
        })
    })
}

#[async_trait]
impl HistoryProcessor for Summarization {
    async fn process(&self, ctx: &RunContext, messages: Vec<ModelMessage>) -> Result<Vec<ModelMessage>> {
        self.summarize_messages(ctx, messages).await
    }
}

#[async_trait]
impl Capability for Summarization {
    async fn before_model_request(
        &self,
        ctx: &RunContext,
        mut request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        let mut messages = self.summarize_messages(ctx, request.messages).await?;
        validate_history(&mut messages)?;
        request.messages = messages;
        Ok(request)
    }
}
