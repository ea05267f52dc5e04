use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{BoxedCapability, Capability};
use crate::llm::{BuiltinTool, WebSearchTool};
use crate::run::RunContext;
use crate::spec::SpecType;
use crate::tools::{BoxedToolset, ToolDefinition, ToolError, Toolset};

/// Provider-side web search, optionally backed by a function-tool fallback
///
/// Fallback tools are marked as preferring the builtin, so providers with
/// native search use that instead.
#[derive(Clone, Default)]
pub struct WebSearch {
    tool: WebSearchTool,
    fallback: Option<BoxedToolset>,
}

impl WebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: WebSearchTool) -> Self {
        self.tool = tool;
        self
    }

    pub fn with_fallback(mut self, toolset: BoxedToolset) -> Self {
        self.fallback = Some(toolset);
        self
    }

    /// Spec type `WebSearch`; takes no arguments
    pub fn spec_type() -> SpecType<BoxedCapability> {
        SpecType::new("WebSearch", Vec::new(), |_| {
            let capability: BoxedCapability = Arc::new(WebSearch::new());
            Ok(capability)
        })
    }

    fn builtin(&self) -> BuiltinTool {
        BuiltinTool::WebSearch(self.tool.clone())
    }
}

impl Capability for WebSearch {
    fn get_toolset(&self) -> Option<BoxedToolset> {
        let fallback = self.fallback.as_ref()?;
        Some(Arc::new(PreferBuiltin {
            inner: Arc::clone(fallback),
            builtin_id: self.builtin().unique_id(),
        }))
    }

    fn get_builtin_tools(&self) -> Vec<BuiltinTool> {
        vec![self.builtin()]
    }
}

/// Marks every tool of the wrapped toolset as deferring to a builtin
struct PreferBuiltin {
    inner: BoxedToolset,
    builtin_id: &'static str,
}

#[async_trait]
impl Toolset for PreferBuiltin {
    async fn enter(&self) -> crate::error::Result<()> {
        self.inner.enter().await
    }

    async fn exit(&self) -> crate::error::Result<()> {
        self.inner.exit().await
    }

    async fn tool_definitions(&self, ctx: &RunContext) -> Vec<ToolDefinition> {
        self.inner
            .tool_definitions(ctx)
            .await
            .into_iter()
            .map(|definition| definition.with_prefers_builtin(self.builtin_id))
            .collect()
    }

    async fn call_tool(
        &self,
        ctx: &RunContext,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        self.inner.call_tool(ctx, name, args).await
    }
}
