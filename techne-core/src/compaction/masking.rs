use async_trait::async_trait;
use serde_json::Value;

use super::trigger::{TokenAccounting, Trigger};
use crate::capabilities::{Capability, HistoryProcessor, validate_history};
use crate::config::CompactionConfig;
use crate::error::Result;
use crate::messages::{ModelMessage, RequestPart};
use crate::run::{PreparedRequest, RunContext};

pub const DEFAULT_PLACEHOLDER: &str = "[compacted]";
pub const DEFAULT_KEEP_LAST: usize = 10;
pub const DEFAULT_TRIGGER_RATIO: f64 = 0.7;

/// Replaces the content of old tool returns with a placeholder
///
/// Message structure is untouched, so every tool call keeps its return;
/// only the returned content shrinks. The last `keep_last` messages are
/// never masked.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMasking {
    keep_last: usize,
    placeholder: String,
    trigger_ratio: f64,
    threshold: Option<usize>,
    accounting: TokenAccounting,
}

impl ObservationMasking {
    pub fn new() -> Self {
        Self {
            keep_last: DEFAULT_KEEP_LAST,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            trigger_ratio: DEFAULT_TRIGGER_RATIO,
            threshold: None,
            accounting: TokenAccounting::default(),
        }
    }

    pub fn from_config(config: &CompactionConfig) -> Self {
        Self::new()
            .with_keep_last(config.keep_last)
            .with_placeholder(config.placeholder.clone())
            .with_trigger_ratio(config.trigger_ratio)
            .with_accounting(config.accounting)
    }

    pub fn with_keep_last(mut self, keep_last: usize) -> Self {
        self.keep_last = keep_last;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_trigger_ratio(mut self, ratio: f64) -> Self {
        self.trigger_ratio = ratio;
        self
    }

    /// Message count that triggers masking when no token ratio is available
    ///
    /// Defaults to `keep_last`, i.e. mask as soon as anything is old enough.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_accounting(mut self, accounting: TokenAccounting) -> Self {
        self.accounting = accounting;
        self
    }

    pub fn keep_last(&self) -> usize {
        self.keep_last
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    fn trigger(&self) -> Trigger {
        Trigger {
            trigger_ratio: self.trigger_ratio,
            fallback_threshold: self.threshold.unwrap_or(self.keep_last),
            accounting: self.accounting,
        }
    }

    /// Mask a history, leaving the input untouched
    ///
    /// Returns a copy of `messages` when the trigger does not fire.
    pub fn mask_messages(&self, ctx: &RunContext, messages: &[ModelMessage]) -> Vec<ModelMessage> {
        let check = self.trigger().check(ctx, messages);
        if !check.triggered {
            return messages.to_vec();
        }

        let cutoff = messages.len().saturating_sub(self.keep_last);
        let mut older = messages[..cutoff].to_vec();
        let mut masked = 0usize;
        for message in &mut older {
            if let ModelMessage::Request(request) = message {
                for part in &mut request.parts {
                    let content = match part {
                        RequestPart::ToolReturn(ret) => &mut ret.content,
                        RequestPart::RetryPrompt(retry) => &mut retry.content,
                        _ => continue,
                    };
                    *content = Value::String(self.placeholder.clone());
                    masked += 1;
                }
            }
        }

        let span = tracing::info_span!(
            "capability compaction/masking",
            capability = "compaction/masking",
            trigger_ratio = self.trigger_ratio,
            context_utilization = check.utilization,
            total_tokens = check.observed_tokens,
            context_window = check.context_window,
            messages_total = messages.len(),
            messages_kept = messages.len() - cutoff,
            tool_returns_masked = masked,
        );
        span.in_scope(|| tracing::debug!(masked, "masked old tool returns"));

        older.extend_from_slice(&messages[cutoff..]);
        older
    }
}

impl Default for ObservationMasking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryProcessor for ObservationMasking {
    async fn process(&self, ctx: &RunContext, messages: Vec<ModelMessage>) -> Result<Vec<ModelMessage>> {
        Ok(self.mask_messages(ctx, &messages))
    }
}

#[async_trait]
impl Capability for ObservationMasking {
    async fn before_model_request(
        &self,
        ctx: &RunContext,
        mut request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        let mut messages = self.mask_messages(ctx, &request.messages);
        validate_history(&mut messages)?;
        request.messages = messages;
        Ok(request)
    }
}
