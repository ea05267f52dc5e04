//! Per-step tool dispatch with ordered before/after hooks
//!
//! ```text
//! before hooks (in order, each may rewrite args or stop the call)
//!     -> tool
//!         -> after hooks (in order, each transforms the result)
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::hooks::{BoxedAfterHook, BoxedBeforeHook};
use super::result::{ToolCallError, ToolError};
use super::tool::ToolDefinition;
use super::toolset::{BoxedToolset, unknown_tool};
use crate::error::{Result, TechneError};
use crate::messages::ToolCallPart;
use crate::run::RunContext;

/// Dispatches tool calls for one run step
///
/// Hooks are registered once and carried to every later step by
/// [`for_run_step`](Self::for_run_step).
#[derive(Clone)]
pub struct ToolManager {
    toolset: BoxedToolset,
    ctx: RunContext,
    tools: Arc<IndexMap<String, ToolDefinition>>,
    before_hooks: Arc<Vec<BoxedBeforeHook>>,
    after_hooks: Arc<Vec<BoxedAfterHook>>,
}

impl ToolManager {
    /// Prepare the first step of a run
    pub async fn new(toolset: BoxedToolset, ctx: RunContext) -> Result<Self> {
        Self::build(toolset, ctx, Arc::default(), Arc::default()).await
    }

    async fn build(
        toolset: BoxedToolset,
        ctx: RunContext,
        before_hooks: Arc<Vec<BoxedBeforeHook>>,
        after_hooks: Arc<Vec<BoxedAfterHook>>,
    ) -> Result<Self> {
        let mut tools = IndexMap::new();
        for definition in toolset.tool_definitions(&ctx).await {
            if tools.contains_key(&definition.name) {
                return Err(TechneError::Configuration(format!(
                    "Tool name conflicts across toolsets: '{}'",
                    definition.name
                )));
            }
            tools.insert(definition.name.clone(), definition);
        }

        Ok(Self {
            toolset,
            ctx,
            tools: Arc::new(tools),
            before_hooks,
            after_hooks,
        })
    }

    pub fn with_before_hook(mut self, hook: BoxedBeforeHook) -> Self {
        Arc::make_mut(&mut self.before_hooks).push(hook);
        self
    }

    pub fn with_after_hook(mut self, hook: BoxedAfterHook) -> Self {
        Arc::make_mut(&mut self.after_hooks).push(hook);
        self
    }

    /// Manager for the next step, with refreshed tool definitions and the same hooks
    pub async fn for_run_step(&self, ctx: RunContext) -> Result<Self> {
        Self::build(
            Arc::clone(&self.toolset),
            ctx,
            Arc::clone(&self.before_hooks),
            Arc::clone(&self.after_hooks),
        )
        .await
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn tool_defs(&self) -> Vec<ToolDefinition> {
        self.tools.values().cloned().collect()
    }

    pub fn before_hook_count(&self) -> usize {
        self.before_hooks.len()
    }

    pub fn after_hook_count(&self) -> usize {
        self.after_hooks.len()
    }

    /// Run one tool call through the hook pipeline
    ///
    /// Calls for different tools may be awaited concurrently; the hooks of a
    /// single call always run sequentially in registration order.
    pub async fn handle_call(&self, call: &ToolCallPart) -> std::result::Result<Value, ToolCallError> {
        let Some(tool_def) = self.tools.get(&call.tool_name) else {
            return Err(unknown_tool(&call.tool_name).into());
        };

        let mut args = call.args_as_map().map_err(|e| {
            ToolError::invalid_arguments(format!(
                "Invalid arguments for tool '{}': {}",
                call.tool_name, e
            ))
        })?;

        tracing::debug!(
            run_id = %self.ctx.run_id,
            tool = %call.tool_name,
            tool_call_id = %call.tool_call_id,
            "handling tool call"
        );

        for hook in self.before_hooks.iter() {
            if let Some(replaced) = hook.before_tool_call(&self.ctx, tool_def, &args).await? {
                args = replaced;
            }
        }

        let mut result = self
            .toolset
            .call_tool(&self.ctx, &call.tool_name, args.clone())
            .await?;

        for hook in self.after_hooks.iter() {
            result = hook.after_tool_call(&self.ctx, tool_def, &args, result).await?;
        }

        Ok(result)
    }
}
