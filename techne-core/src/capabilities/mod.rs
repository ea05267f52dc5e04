//! Capabilities: composable units of agent behavior
//!
//! A capability may contribute instructions, model settings, a toolset and
//! builtin tools, and may intercept every model request and response. Every
//! contribution defaults to "nothing" and every hook to a passthrough, so a
//! concrete capability only implements what it needs.
//!
//! [`CombinedCapability`] folds a list of capabilities into one:
//! before-hooks run first to last, after-hooks last to first.
//!
//! # Example
//!
//! ```rust,ignore
//! use techne_core::capabilities::{CombinedCapability, InstructionsCapability, Thinking};
//!
//! let combined = CombinedCapability::new(vec![
//!     Arc::new(InstructionsCapability::new("Answer in one sentence.")),
//!     Arc::new(Thinking::new()),
//! ]);
//! let settings = combined.get_model_settings();
//! ```

mod combined;
mod history_processor;
mod instructions;
mod model_settings;
mod toolset;
mod web_search;

pub use combined::CombinedCapability;
pub use history_processor::{
    HistoryProcessor, HistoryProcessorCapability, HistoryProcessorFn, history_processor_fn,
    validate_history,
};
pub use instructions::InstructionsCapability;
pub use model_settings::{ModelSettingsCapability, Thinking};
pub use toolset::ToolsetCapability;
pub use web_search::WebSearch;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::{BuiltinTool, ModelSettings};
use crate::messages::ModelResponse;
use crate::run::{PreparedRequest, RunContext};
use crate::spec::SpecType;
use crate::tools::BoxedToolset;

/// A composable unit of agent behavior
#[async_trait]
pub trait Capability: Send + Sync {
    fn get_instructions(&self) -> Option<Instructions> {
        None
    }

    fn get_model_settings(&self) -> Option<ModelSettings> {
        None
    }

    fn get_toolset(&self) -> Option<BoxedToolset> {
        None
    }

    fn get_builtin_tools(&self) -> Vec<BuiltinTool> {
        Vec::new()
    }

    /// Rewrite the outgoing request; may replace the message history
    async fn before_model_request(
        &self,
        _ctx: &RunContext,
        request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        Ok(request)
    }

    /// Inspect or rewrite the model's response
    async fn after_model_request(
        &self,
        _ctx: &RunContext,
        response: ModelResponse,
    ) -> Result<ModelResponse> {
        Ok(response)
    }
}

/// Shared capability handle
pub type BoxedCapability = Arc<dyn Capability>;

type DynamicInstruction = dyn Fn(&RunContext) -> String + Send + Sync;

/// One instruction, fixed or computed per run step
#[derive(Clone)]
pub enum Instruction {
    Static(String),
    Dynamic(Arc<DynamicInstruction>),
}

impl Instruction {
    pub fn dynamic<F>(render: F) -> Self
    where
        F: Fn(&RunContext) -> String + Send + Sync + 'static,
    {
        Instruction::Dynamic(Arc::new(render))
    }

    pub fn render(&self, ctx: &RunContext) -> String {
        match self {
            Instruction::Static(text) => text.clone(),
            Instruction::Dynamic(render) => render(ctx),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Instruction::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Instruction {
    fn from(text: &str) -> Self {
        Instruction::Static(text.to_string())
    }
}

impl From<String> for Instruction {
    fn from(text: String) -> Self {
        Instruction::Static(text)
    }
}

/// Instructions as a capability contributes them: one or many
#[derive(Debug, Clone)]
pub enum Instructions {
    One(Instruction),
    Many(Vec<Instruction>),
}

impl Instructions {
    pub fn into_vec(self) -> Vec<Instruction> {
        match self {
            Instructions::One(instruction) => vec![instruction],
            Instructions::Many(instructions) => instructions,
        }
    }
}

impl From<Instruction> for Instructions {
    fn from(instruction: Instruction) -> Self {
        Instructions::One(instruction)
    }
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Instructions::One(text.into())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Instructions::One(text.into())
    }
}

impl From<Vec<Instruction>> for Instructions {
    fn from(instructions: Vec<Instruction>) -> Self {
        Instructions::Many(instructions)
    }
}

/// Flatten optional instructions into a list
pub fn normalize_instructions(instructions: Option<Instructions>) -> Vec<Instruction> {
    instructions.map(Instructions::into_vec).unwrap_or_default()
}

/// Render instructions for a step, joining non-empty entries with blank lines
pub fn render_instructions(instructions: &[Instruction], ctx: &RunContext) -> Option<String> {
    let rendered: Vec<String> = instructions
        .iter()
        .map(|instruction| instruction.render(ctx))
        .filter(|text| !text.trim().is_empty())
        .collect();
    (!rendered.is_empty()).then(|| rendered.join("\n\n"))
}

/// Built-in capability types constructible from specs
pub fn capability_types() -> Vec<SpecType<BoxedCapability>> {
    vec![
        InstructionsCapability::spec_type(),
        ModelSettingsCapability::spec_type(),
        Thinking::spec_type(),
        WebSearch::spec_type(),
    ]
}
