//! Compaction pipeline example
//!
//! Builds capabilities from an agent spec, adds masked summarization, and runs
//! a few model turns against a canned client so the compaction spans show up
//! in the logs. Run with `RUST_LOG=debug` to see every step.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use techne_core::compaction::MaskedSummarization;
use techne_core::llm::ModelRequestParameters;
use techne_core::messages::{RequestPart, ResponsePart, ToolCallPart, ToolReturnPart};
use techne_core::prelude::*;

/// Echoes the size of each request back as text
struct EchoClient {
    calls: AtomicUsize,
}

#[async_trait]
impl ModelClient for EchoClient {
    async fn request(
        &self,
        messages: &[ModelMessage],
        _settings: &ModelSettings,
        _parameters: &ModelRequestParameters,
    ) -> Result<ModelResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelResponse::text(format!("turn {call}: saw {} messages", messages.len()))
            .with_usage(RequestUsage::new(40 * messages.len() as u64, 20)))
    }

    fn profile(&self) -> ModelProfile {
        ModelProfile::new("echo").with_context_window(2_000)
    }
}

/// Stands in for a cheaper summarization model
struct OneLineSummarizer;

#[async_trait]
impl TextAgent for OneLineSummarizer {
    async fn run(&self, prompt: &str) -> Result<AgentOutput> {
        let lines = prompt.lines().filter(|line| line.starts_with("User:")).count();
        Ok(AgentOutput {
            output: format!("The user asked {lines} earlier question(s)."),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,techne_core=debug")),
        )
        .init();

    let spec = AgentSpec::from_yaml_str(
        r#"
model: echo
capabilities:
  - Instructions: Keep answers short.
  - ModelSettings: { max_tokens: 256 }
"#,
    )?;
    let compaction = MaskedSummarization::new(Arc::new(OneLineSummarizer))
        .with_keep_last(6)
        .with_trigger_threshold(12);
    let capability = spec
        .build_capabilities(Vec::new())?
        .with_capability(Arc::new(compaction));

    let client = EchoClient {
        calls: AtomicUsize::new(0),
    };
    let mut ctx = RunContext::new(client.profile());
    let mut history: Vec<ModelMessage> = Vec::new();

    for i in 0..6 {
        let call_id = format!("lookup-{i}");
        history.push(ModelRequest::user_prompt(format!("What is item {i}?")).into());
        history.push(
            ModelResponse::new(vec![ResponsePart::ToolCall(ToolCallPart::new(
                "lookup",
                json!({ "item": i }),
                call_id.clone(),
            ))])
            .into(),
        );
        history.push(
            ModelRequest::new(vec![RequestPart::ToolReturn(ToolReturnPart::new(
                "lookup",
                format!("item {i} is a very long record that nobody needs to read twice"),
                call_id,
            ))])
            .into(),
        );

        let (prepared, response) =
            run_model_turn(&capability, &client, &ctx, PreparedRequest::new(history.clone())).await?;
        ctx.usage.incr(&response.usage);
        ctx = ctx.next_step();

        println!(
            "step {}: sent {} of {} messages, {} tokens used so far",
            ctx.run_step,
            prepared.messages.len(),
            history.len(),
            ctx.usage.total_tokens()
        );
        history = prepared.messages;
        history.push(response.into());
    }

    Ok(())
}
