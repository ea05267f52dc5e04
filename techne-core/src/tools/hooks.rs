//! Hooks wrapped around every tool call

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::result::ToolCallError;
use super::tool::ToolDefinition;
use crate::run::RunContext;

/// Runs before a tool is invoked
///
/// Returning `Ok(None)` keeps the arguments, `Ok(Some(args))` replaces them for
/// later hooks and the tool, and an error stops the call.
#[async_trait]
pub trait BeforeToolCallHook: Send + Sync {
    async fn before_tool_call(
        &self,
        ctx: &RunContext,
        tool_def: &ToolDefinition,
        args: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, ToolCallError>;
}

/// Runs after a tool returns and may transform its result
#[async_trait]
pub trait AfterToolCallHook: Send + Sync {
    async fn after_tool_call(
        &self,
        ctx: &RunContext,
        tool_def: &ToolDefinition,
        args: &Map<String, Value>,
        result: Value,
    ) -> Result<Value, ToolCallError>;
}

pub type BoxedBeforeHook = Arc<dyn BeforeToolCallHook>;
pub type BoxedAfterHook = Arc<dyn AfterToolCallHook>;

/// Before-hook backed by a plain function
pub struct BeforeHookFn<F>(F);

#[async_trait]
impl<F> BeforeToolCallHook for BeforeHookFn<F>
where
    F: Fn(&ToolDefinition, &Map<String, Value>) -> Result<Option<Map<String, Value>>, ToolCallError>
        + Send
        + Sync,
{
    async fn before_tool_call(
        &self,
        _ctx: &RunContext,
        tool_def: &ToolDefinition,
        args: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, ToolCallError> {
        (self.0)(tool_def, args)
    }
}

/// After-hook backed by a plain function
pub struct AfterHookFn<F>(F);

#[async_trait]
impl<F> AfterToolCallHook for AfterHookFn<F>
where
    F: Fn(&ToolDefinition, &Map<String, Value>, Value) -> Result<Value, ToolCallError> + Send + Sync,
{
    async fn after_tool_call(
        &self,
        _ctx: &RunContext,
        tool_def: &ToolDefinition,
        args: &Map<String, Value>,
        result: Value,
    ) -> Result<Value, ToolCallError> {
        (self.0)(tool_def, args, result)
    }
}

pub fn before_hook_fn<F>(hook: F) -> BoxedBeforeHook
where
    F: Fn(&ToolDefinition, &Map<String, Value>) -> Result<Option<Map<String, Value>>, ToolCallError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(BeforeHookFn(hook))
}

pub fn after_hook_fn<F>(hook: F) -> BoxedAfterHook
where
    F: Fn(&ToolDefinition, &Map<String, Value>, Value) -> Result<Value, ToolCallError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(AfterHookFn(hook))
}
