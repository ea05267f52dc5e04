//! Toolsets: groups of tools with a shared lifecycle
//!
//! A toolset is entered when a run starts and exited when it ends, which is
//! where run-scoped state is acquired and released.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::result::ToolError;
use super::tool::{BoxedTool, ToolDefinition};
use crate::error::Result;
use crate::run::RunContext;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// Tool with this name already exists
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
}

/// A group of tools exposed to the model
#[async_trait]
pub trait Toolset: Send + Sync {
    /// Acquire run-scoped resources
    async fn enter(&self) -> Result<()> {
        Ok(())
    }

    /// Release run-scoped resources
    async fn exit(&self) -> Result<()> {
        Ok(())
    }

    /// Definitions of every tool, in a stable order
    async fn tool_definitions(&self, ctx: &RunContext) -> Vec<ToolDefinition>;

    /// Run a tool by name
    async fn call_tool(
        &self,
        ctx: &RunContext,
        name: &str,
        args: Map<String, Value>,
    ) -> std::result::Result<Value, ToolError>;
}

/// Shared toolset handle
pub type BoxedToolset = Arc<dyn Toolset>;

/// Toolset over a fixed set of tools, keyed by name
#[derive(Default)]
pub struct FunctionToolset {
    tools: IndexMap<String, BoxedTool>,
}

impl FunctionToolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, rejecting duplicate names
    pub fn register(&mut self, tool: BoxedTool) -> std::result::Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_tool(mut self, tool: BoxedTool) -> std::result::Result<Self, RegistryError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl Toolset for FunctionToolset {
    async fn tool_definitions(&self, _ctx: &RunContext) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| tool.definition().clone())
            .collect()
    }

    async fn call_tool(
        &self,
        ctx: &RunContext,
        name: &str,
        args: Map<String, Value>,
    ) -> std::result::Result<Value, ToolError> {
        match self.tools.get(name) {
            Some(tool) => tool.call(ctx, args).await,
            None => Err(unknown_tool(name)),
        }
    }
}

/// Toolset made of other toolsets
///
/// Children are entered in order and exited in reverse. Calls are routed to
/// the first child that defines the tool.
#[derive(Default)]
pub struct CombinedToolset {
    toolsets: Vec<BoxedToolset>,
}

impl CombinedToolset {
    pub fn new(toolsets: Vec<BoxedToolset>) -> Self {
        Self { toolsets }
    }

    pub fn toolsets(&self) -> &[BoxedToolset] {
        &self.toolsets
    }
}

#[async_trait]
impl Toolset for CombinedToolset {
    async fn enter(&self) -> Result<()> {
        for (index, toolset) in self.toolsets.iter().enumerate() {
            if let Err(err) = toolset.enter().await {
                // unwind the children that did enter
                for entered in self.toolsets[..index].iter().rev() {
                    if let Err(exit_err) = entered.exit().await {
                        tracing::warn!(error = %exit_err, "toolset exit failed during unwind");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    async fn exit(&self) -> Result<()> {
        let mut first_error = None;
        for toolset in self.toolsets.iter().rev() {
            if let Err(err) = toolset.exit().await {
                tracing::warn!(error = %err, "toolset exit failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn tool_definitions(&self, ctx: &RunContext) -> Vec<ToolDefinition> {
        let mut definitions = Vec::new();
        for toolset in &self.toolsets {
            definitions.extend(toolset.tool_definitions(ctx).await);
        }
        definitions
    }

    async fn call_tool(
        &self,
        ctx: &RunContext,
        name: &str,
        args: Map<String, Value>,
    ) -> std::result::Result<Value, ToolError> {
        for toolset in &self.toolsets {
            let owns_tool = toolset
                .tool_definitions(ctx)
                .await
                .iter()
                .any(|definition| definition.name == name);
            if owns_tool {
                return toolset.call_tool(ctx, name, args).await;
            }
        }
        Err(unknown_tool(name))
    }
}

pub(crate) fn unknown_tool(name: &str) -> ToolError {
    ToolError::model_retry(format!("Unknown tool name: '{name}'"))
}
