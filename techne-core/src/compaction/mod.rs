//! History compaction
//!
//! Policies that shrink the conversation before it is sent to the model:
//!
//! - [`ObservationMasking`] replaces old tool-return content with a placeholder
//! - [`Summarization`] replaces old messages with a summary from a secondary agent
//! - [`MaskedSummarization`] masks first, then summarizes
//!
//! Each policy fires when context utilization exceeds its trigger ratio, or,
//! when the context window or usage is unknown, when the history grows past
//! a message-count threshold. Every policy is both a [`HistoryProcessor`] and
//! a [`Capability`].
//!
//! [`HistoryProcessor`]: crate::capabilities::HistoryProcessor
//! [`Capability`]: crate::capabilities::Capability

mod format;
mod masked_summarization;
mod masking;
mod summarization;
mod trigger;

pub use format::format_messages;
pub use masked_summarization::MaskedSummarization;
pub use masking::{DEFAULT_KEEP_LAST, DEFAULT_PLACEHOLDER, DEFAULT_TRIGGER_RATIO, ObservationMasking};
pub use summarization::{
    CONVERSATION_PLACEHOLDER, DEFAULT_SUMMARY_PROMPT, DEFAULT_TRIGGER_THRESHOLD, SUMMARY_PREFIX,
    Summarization,
};
pub use trigger::{TokenAccounting, last_input_tokens, should_compact};

#[cfg(test)]
mod tests;
