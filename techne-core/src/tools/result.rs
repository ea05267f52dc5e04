//! Tool error model
//!
//! Two layers:
//! - [`ToolError`] describes a failed tool execution, with a kind taxonomy
//!   that separates model-correctable failures from fatal ones
//! - [`ToolCallError`] is what the hook pipeline returns; denial and approval
//!   requests are control signals for the run loop, not tool failures

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured tool error with taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    /// Error kind (determines retryability)
    pub kind: ToolErrorKind,

    /// Human-readable error message; shown to the model for retry kinds
    pub message: String,

    /// Additional context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ToolError {
    /// Create a new tool error
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Add context
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Ask the model to call again with corrected arguments
    pub fn model_retry(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ModelRetry, message)
    }

    /// Arguments did not match the tool's schema
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message)
    }

    /// Message to send back to the model, if the model should see this error
    pub fn retry_prompt(&self) -> Option<&str> {
        self.kind.is_retryable().then_some(self.message.as_str())
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Tool asked the model to retry (retryable - model fixes args)
    ModelRetry,

    /// Arguments failed to parse or validate (retryable - model fixes args)
    InvalidArguments,

    /// Internal tool error (not retryable - bug)
    Internal,

    /// Cancelled by user/system (not retryable)
    Cancelled,
}

impl ToolErrorKind {
    /// Check if the calling model may retry after seeing this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolErrorKind::ModelRetry | ToolErrorKind::InvalidArguments
        )
    }

    /// Check if this error kind is fatal (never retry)
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

/// Outcome of the tool-call pipeline other than a result value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolCallError {
    /// A before-hook refused the call; the tool never ran
    #[error("Tool call '{tool_name}' denied: {message}")]
    Denied { tool_name: String, message: String },

    /// A before-hook needs an external approval decision before the call can run
    #[error("Tool call '{tool_name}' requires approval")]
    ApprovalRequired {
        tool_name: String,
        args: Map<String, Value>,
    },

    /// The tool (or argument handling) failed
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl ToolCallError {
    pub fn denied(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        ToolCallError::Denied {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    pub fn approval_required(tool_name: impl Into<String>, args: Map<String, Value>) -> Self {
        ToolCallError::ApprovalRequired {
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Denial and approval requests steer the run loop; they are never shown
    /// to the model as tool output
    pub fn is_control_signal(&self) -> bool {
        matches!(
            self,
            ToolCallError::Denied { .. } | ToolCallError::ApprovalRequired { .. }
        )
    }
}
