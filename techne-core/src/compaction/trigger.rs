//! When to compact

use serde::{Deserialize, Serialize};

use crate::messages::ModelMessage;
use crate::run::RunContext;

/// Which token count is compared against the context window
///
/// A policy instance uses one basis for its whole lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAccounting {
    /// Running total of input and output tokens across the run
    #[default]
    #[serde(alias = "cumulative")]
    CumulativeRun,
    /// `input_tokens` of the most recent model response that reported any
    #[serde(alias = "last_response")]
    LastResponseInput,
}

impl TokenAccounting {
    /// Token count for this basis, or `None` when there is no usage signal yet
    ///
    /// The run total always counts as a signal, even at zero.
    pub fn observed_tokens(&self, ctx: &RunContext, messages: &[ModelMessage]) -> Option<u64> {
        match self {
            TokenAccounting::CumulativeRun => Some(ctx.usage.total_tokens()),
            TokenAccounting::LastResponseInput => last_input_tokens(messages),
        }
    }
}

/// `input_tokens` of the latest response with a non-zero count
pub fn last_input_tokens(messages: &[ModelMessage]) -> Option<u64> {
    messages
        .iter()
        .rev()
        .filter_map(ModelMessage::as_response)
        .map(|response| response.usage.input_tokens)
        .find(|tokens| *tokens > 0)
}

/// Decide whether a history should be compacted
///
/// With a known context window and a usage signal, compacts when
/// `observed_tokens / context_window > trigger_ratio`. Otherwise compacts
/// when there are more than `fallback_threshold` messages.
pub fn should_compact(
    message_count: usize,
    observed_tokens: Option<u64>,
    context_window: Option<u64>,
    trigger_ratio: f64,
    fallback_threshold: usize,
) -> bool {
    match (context_window.filter(|window| *window > 0), observed_tokens) {
        (Some(window), Some(tokens)) => utilization(tokens, window) > trigger_ratio,
        _ => message_count > fallback_threshold,
    }
}

pub(crate) fn utilization(tokens: u64, context_window: u64) -> f64 {
    if context_window == 0 {
        return 0.0;
    }
    tokens as f64 / context_window as f64
}

/// Trigger settings shared by the compaction policies
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Trigger {
    pub trigger_ratio: f64,
    pub fallback_threshold: usize,
    pub accounting: TokenAccounting,
}

/// Outcome of a trigger check, kept around for span attributes
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TriggerCheck {
    pub triggered: bool,
    pub observed_tokens: u64,
    pub context_window: u64,
    pub utilization: f64,
}

impl Trigger {
    pub fn check(&self, ctx: &RunContext, messages: &[ModelMessage]) -> TriggerCheck {
        let context_window = ctx.model.context_window;
        let observed = self.accounting.observed_tokens(ctx, messages);
        let triggered = should_compact(
            messages.len(),
            observed,
            context_window,
            self.trigger_ratio,
            self.fallback_threshold,
        );
        let observed_tokens = observed.unwrap_or(0);
        let context_window = context_window.unwrap_or(0);
        let check = TriggerCheck {
            triggered,
            observed_tokens,
            context_window,
            utilization: utilization(observed_tokens, context_window),
        };
        tracing::debug!(
            triggered,
            accounting = ?self.accounting,
            observed_tokens,
            context_window,
            messages = messages.len(),
            "compaction trigger evaluated"
        );
        check
    }
}
