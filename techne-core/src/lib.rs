//! # Techne - Composable Capabilities for LLM Agents
//!
//! Techne is the behavior layer around an agent's model loop:
//! - Capabilities that contribute instructions, model settings and tools, and
//!   intercept every model request and response
//! - Declarative construction of capabilities from `(name, arguments)` specs
//! - Glob-based tool permissions and before/after tool-call hooks
//! - History compaction by observation masking and LLM summarization
//! - A todo toolset whose dependencies always form an acyclic graph
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use techne_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let spec = AgentSpec::from_yaml_str(
//!         "model: my-model\ncapabilities:\n  - Thinking\n  - Instructions: Be brief.\n",
//!     )?;
//!     let capability = spec.build_capabilities(Vec::new())?;
//!
//!     let ctx = RunContext::new(ModelProfile::new("my-model").with_context_window(128_000));
//!     let request = PreparedRequest::new(vec![ModelRequest::user_prompt("Hello").into()]);
//!     let prepared = capability.before_model_request(&ctx, request).await?;
//!     println!("{} message(s) ready", prepared.messages.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Techne does not talk to model providers itself. Callers implement
//! [`llm::ModelClient`] for requests and [`llm::TextAgent`] for the secondary
//! agent that writes summaries; [`run::run_model_turn`] wires a capability
//! around a single request.

pub mod capabilities;
pub mod compaction;
pub mod config;
pub mod error;
pub mod llm;
pub mod messages;
pub mod run;
pub mod spec;
pub mod todos;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capabilities::{
        BoxedCapability, Capability, CombinedCapability, HistoryProcessor, Instruction,
        Instructions, InstructionsCapability, ModelSettingsCapability, Thinking, ToolsetCapability,
        WebSearch,
    };
    pub use crate::compaction::{
        MaskedSummarization, ObservationMasking, Summarization, TokenAccounting,
    };
    pub use crate::config::{CompactionConfig, PermissionsConfig, TechneConfig};
    pub use crate::error::{Result, TechneError};
    pub use crate::llm::{AgentOutput, ModelClient, ModelProfile, ModelSettings, TextAgent};
    pub use crate::messages::{
        ModelMessage, ModelRequest, ModelResponse, RequestUsage, RunUsage,
    };
    pub use crate::run::{PreparedRequest, RunContext, run_model_turn};
    pub use crate::spec::{AgentSpec, NamedSpec, SpecError, SpecType};
    pub use crate::todos::{InMemoryTodoStorage, Todo, TodoStatus, TodoStorage, TodoToolset};
    pub use crate::tools::{
        PermissionRule, Tool, ToolDefinition, ToolError, ToolManager, ToolPermission, Toolset,
        permission_hook,
    };
}
