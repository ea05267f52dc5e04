//! Core Tool trait and tool definitions

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::result::ToolError;
use crate::run::RunContext;

/// What the model is told about a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the arguments object
    #[serde(default = "empty_object_schema")]
    pub parameters_json_schema: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    /// Builtin tool id this function tool should yield to when the provider has it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefers_builtin: Option<String>,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters_json_schema: empty_object_schema(),
            strict: None,
            prefers_builtin: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters_json_schema = schema;
        self
    }

    pub fn with_prefers_builtin(mut self, builtin_id: impl Into<String>) -> Self {
        self.prefers_builtin = Some(builtin_id.into());
        self
    }
}

/// Core trait for callable tools
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Execute with already-validated arguments
    async fn call(&self, ctx: &RunContext, args: Map<String, Value>) -> Result<Value, ToolError>;
}

/// Type alias for boxed tools
pub type BoxedTool = Arc<dyn Tool>;

/// Tool backed by an async function of its arguments
pub struct FunctionTool<F> {
    definition: ToolDefinition,
    handler: F,
}

impl<F, Fut> FunctionTool<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    pub fn new(definition: ToolDefinition, handler: F) -> Self {
        Self {
            definition,
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> Tool for FunctionTool<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(&self, _ctx: &RunContext, args: Map<String, Value>) -> Result<Value, ToolError> {
        (self.handler)(args).await
    }
}
