//! Tests for compaction triggers and policies

use super::*;
use crate::capabilities::Capability;
use crate::error::{Result, TechneError};
use crate::llm::{AgentOutput, ModelProfile, TextAgent};
use crate::messages::{
    ModelMessage, ModelRequest, ModelResponse, RequestPart, RequestUsage, ResponsePart,
    RetryPromptPart, RunUsage, TextPart, ToolCallPart, ToolReturnPart,
};
use crate::run::{PreparedRequest, RunContext};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

/// Returns a fixed summary and remembers every prompt
#[derive(Default)]
struct RecordingAgent {
    prompts: Mutex<Vec<String>>,
}

impl RecordingAgent {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextAgent for RecordingAgent {
    async fn run(&self, prompt: &str) -> Result<AgentOutput> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(AgentOutput {
            output: "the summary".to_string(),
        })
    }
}

struct FailingAgent;

#[async_trait]
impl TextAgent for FailingAgent {
    async fn run(&self, _prompt: &str) -> Result<AgentOutput> {
        Err(TechneError::model(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "summarizer timed out",
        )))
    }
}

fn ctx_without_window() -> RunContext {
    RunContext::new(ModelProfile::new("test"))
}

fn ctx_with_usage(input_tokens: u64) -> RunContext {
    RunContext::new(ModelProfile::new("test").with_context_window(128_000)).with_usage(RunUsage {
        requests: 1,
        input_tokens,
        ..Default::default()
    })
}

/// One exchange: question, tool call, tool return, answer
fn turn(i: usize) -> Vec<ModelMessage> {
    let call_id = format!("call-{i}");
    vec![
        ModelRequest::user_prompt(format!("question {i}")).into(),
        ModelResponse::new(vec![ResponsePart::ToolCall(ToolCallPart::new(
            "search",
            json!({ "query": format!("q{i}") }),
            call_id.clone(),
        ))])
        .into(),
        ModelRequest::new(vec![RequestPart::ToolReturn(ToolReturnPart::new(
            "search",
            format!("result {i}"),
            call_id,
        ))])
        .into(),
        ModelResponse::text(format!("answer {i}")).into(),
    ]
}

/// `turns` exchanges followed by a pending user prompt
fn history(turns: usize) -> Vec<ModelMessage> {
    let mut messages: Vec<ModelMessage> = (0..turns).flat_map(turn).collect();
    messages.push(ModelRequest::user_prompt("next").into());
    messages
}

fn tool_return_contents(messages: &[ModelMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter_map(ModelMessage::as_request)
        .flat_map(|request| request.parts.iter())
        .filter_map(|part| match part {
            RequestPart::ToolReturn(ret) => Some(ret.content.clone()),
            RequestPart::RetryPrompt(retry) => Some(retry.content.clone()),
            _ => None,
        })
        .collect()
}

fn system_prompt(message: &ModelMessage) -> Option<&str> {
    match message.as_request()?.parts.first()? {
        RequestPart::SystemPrompt(prompt) => Some(prompt.content.as_str()),
        _ => None,
    }
}

#[test]
fn test_should_compact_by_ratio() {
    assert!(should_compact(3, Some(90_000), Some(128_000), 0.7, 20));
    assert!(!should_compact(3, Some(50_000), Some(128_000), 0.7, 20));
}

#[test]
fn test_should_compact_unknown_window_uses_message_count() {
    assert!(!should_compact(5, Some(1_000_000), None, 0.7, 20));
    assert!(should_compact(21, Some(0), None, 0.7, 20));
    assert!(!should_compact(20, None, None, 0.0, 20));
}

#[test]
fn test_should_compact_without_usage_signal_uses_message_count() {
    assert!(should_compact(21, None, Some(128_000), 0.7, 20));
    assert!(!should_compact(3, None, Some(128_000), 0.7, 20));
}

#[test]
fn test_zero_cumulative_tokens_never_trigger() {
    let ctx = RunContext::new(ModelProfile::new("test").with_context_window(128_000));
    let messages = history(20);
    let observed = TokenAccounting::CumulativeRun.observed_tokens(&ctx, &messages);
    assert_eq!(observed, Some(0));
    assert!(!should_compact(messages.len(), observed, Some(128_000), 0.7, 5));
}

#[test]
fn test_last_input_tokens_skips_empty_usage() {
    let messages: Vec<ModelMessage> = vec![
        ModelRequest::user_prompt("a").into(),
        ModelResponse::text("b").with_usage(RequestUsage::new(4_000, 10)).into(),
        ModelRequest::user_prompt("c").into(),
        ModelResponse::text("d").into(),
    ];
    assert_eq!(last_input_tokens(&messages), Some(4_000));
    assert_eq!(last_input_tokens(&messages[..1]), None);
}

#[test]
fn test_accounting_bases_stay_distinct() {
    let ctx = ctx_with_usage(100_000);
    let messages: Vec<ModelMessage> = vec![
        ModelRequest::user_prompt("a").into(),
        ModelResponse::text("b").with_usage(RequestUsage::new(1_000, 10)).into(),
    ];
    assert_eq!(
        TokenAccounting::CumulativeRun.observed_tokens(&ctx, &messages),
        Some(100_000)
    );
    assert_eq!(
        TokenAccounting::LastResponseInput.observed_tokens(&ctx, &messages),
        Some(1_000)
    );
}

#[test]
fn test_masking_below_ratio_is_noop() {
    let masking = ObservationMasking::new().with_keep_last(2);
    let messages = history(3);
    assert_eq!(masking.mask_messages(&ctx_with_usage(1_000), &messages), messages);
}

#[test]
fn test_masking_replaces_old_tool_returns_only() {
    let masking = ObservationMasking::new().with_keep_last(3);
    let messages = history(3);
    let original = messages.clone();

    let masked = masking.mask_messages(&ctx_with_usage(100_000), &messages);

    assert_eq!(messages, original);
    assert_eq!(masked.len(), messages.len());
    assert_eq!(
        tool_return_contents(&masked),
        vec![json!("[compacted]"), json!("[compacted]"), json!("result 2")]
    );
    assert_eq!(&masked[10..], &messages[10..]);
}

#[test]
fn test_masking_preserves_tool_call_pairing() {
    let masking = ObservationMasking::new().with_keep_last(1);
    let masked = masking.mask_messages(&ctx_with_usage(100_000), &history(2));

    let call_ids: Vec<&str> = masked
        .iter()
        .filter_map(ModelMessage::as_response)
        .flat_map(|response| response.tool_calls())
        .map(|call| call.tool_call_id.as_str())
        .collect();
    let return_ids: Vec<&str> = masked
        .iter()
        .filter_map(ModelMessage::as_request)
        .flat_map(|request| request.parts.iter())
        .filter_map(|part| match part {
            RequestPart::ToolReturn(ret) => Some(ret.tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(call_ids, vec!["call-0", "call-1"]);
    assert_eq!(return_ids, call_ids);
}

#[test]
fn test_masking_is_idempotent() {
    let masking = ObservationMasking::new().with_keep_last(2);
    let ctx = ctx_with_usage(100_000);
    let once = masking.mask_messages(&ctx, &history(3));
    let twice = masking.mask_messages(&ctx, &once);
    assert_eq!(once, twice);
}

#[test]
fn test_masking_covers_retry_prompts() {
    let masking = ObservationMasking::new().with_keep_last(1).with_placeholder("[gone]");
    let messages: Vec<ModelMessage> = vec![
        ModelRequest::new(vec![RequestPart::RetryPrompt(
            RetryPromptPart::new("bad arguments").for_tool("search", "call-0"),
        )])
        .into(),
        ModelResponse::text("ok").into(),
        ModelRequest::user_prompt("next").into(),
    ];
    let masked = masking.mask_messages(&ctx_with_usage(100_000), &messages);
    assert_eq!(tool_return_contents(&masked), vec![json!("[gone]")]);
}

#[test]
fn test_masking_without_window_falls_back_to_keep_last() {
    let masking = ObservationMasking::new().with_keep_last(10);
    let ctx = ctx_without_window();

    let short = history(2);
    assert_eq!(masking.mask_messages(&ctx, &short), short);

    let long = history(3);
    let masked = masking.mask_messages(&ctx, &long);
    assert_eq!(tool_return_contents(&masked)[0], json!("[compacted]"));
}

#[tokio::test]
async fn test_summarization_replaces_older_messages() {
    let agent = Arc::new(RecordingAgent::default());
    let summarization = Summarization::new(agent.clone())
        .with_trigger_threshold(5)
        .with_keep_last(3);

    let messages = history(3);
    let compacted = summarization
        .summarize_messages(&ctx_without_window(), messages.clone())
        .await
        .unwrap();

    // The cutoff moves back one so the kept tool return still follows its call
    assert_eq!(compacted.len(), 5);
    assert_eq!(
        system_prompt(&compacted[0]),
        Some("Summary of prior conversation:\nthe summary")
    );
    assert_eq!(&compacted[1..], &messages[9..]);

    let prompts = agent.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Summarize the following conversation"));
    assert!(prompts[0].contains("User: question 0"));
    assert!(prompts[0].contains("Tool Call: search({\"query\":\"q0\"})"));
    assert!(prompts[0].contains("Tool Result (search): result 1"));
    assert!(!prompts[0].contains("answer 2"));
}

#[tokio::test]
async fn test_summarization_below_threshold_skips_agent() {
    let agent = Arc::new(RecordingAgent::default());
    let summarization = Summarization::new(agent.clone());

    let messages = history(2);
    let out = summarization
        .summarize_messages(&ctx_without_window(), messages.clone())
        .await
        .unwrap();
    assert_eq!(out, messages);
    assert!(agent.prompts().is_empty());
}

#[tokio::test]
async fn test_summarization_does_not_retrigger_on_collapsed_history() {
    let agent = Arc::new(RecordingAgent::default());
    let summarization = Summarization::new(agent.clone())
        .with_trigger_threshold(5)
        .with_keep_last(3);
    let ctx = ctx_without_window();

    let once = summarization.summarize_messages(&ctx, history(3)).await.unwrap();
    let twice = summarization.summarize_messages(&ctx, once.clone()).await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(agent.prompts().len(), 1);
}

#[tokio::test]
async fn test_summarization_propagates_agent_failure() {
    let summarization = Summarization::new(Arc::new(FailingAgent)).with_trigger_threshold(1);
    let err = summarization
        .summarize_messages(&ctx_without_window(), history(3))
        .await
        .unwrap_err();
    assert!(matches!(err, TechneError::Model(_)));
    assert_eq!(err.to_string(), "Model error: summarizer timed out");
}

#[test]
fn test_summary_prompt_requires_placeholder() {
    let agent = Arc::new(RecordingAgent::default());
    let err = Summarization::new(agent.clone())
        .with_summary_prompt("Summarize please")
        .err()
        .unwrap();
    assert!(matches!(err, TechneError::Configuration(_)));

    let custom = Summarization::new(agent)
        .with_summary_prompt("Short version of:\n{conversation}")
        .unwrap();
    assert_eq!(custom.summary_prompt(), "Short version of:\n{conversation}");
}

#[tokio::test]
async fn test_masked_summarization_masks_before_summarizing() {
    let agent = Arc::new(RecordingAgent::default());
    let policy = MaskedSummarization::new(agent.clone())
        .with_keep_last(3)
        .with_trigger_threshold(5);

    let compacted = policy
        .compact_messages(&ctx_without_window(), history(3))
        .await
        .unwrap();
    assert_eq!(compacted.len(), 5);

    let prompts = agent.prompts();
    assert!(prompts[0].contains("Tool Result (search): [compacted]"));
    assert!(!prompts[0].contains("result 0"));
    assert!(!prompts[0].contains("result 1"));
    // Recent tool return is neither masked nor summarized
    assert_eq!(tool_return_contents(&compacted), vec![json!("result 2")]);
}

#[tokio::test]
async fn test_summarization_capability_stamps_final_request() {
    let agent = Arc::new(RecordingAgent::default());
    let capability = Summarization::new(agent)
        .with_trigger_threshold(5)
        .with_keep_last(3);

    let request = PreparedRequest::new(history(3));
    let request = capability
        .before_model_request(&ctx_without_window(), request)
        .await
        .unwrap();
    let last = request.messages.last().and_then(ModelMessage::as_request).unwrap();
    assert!(last.timestamp.is_some());
    assert!(system_prompt(&request.messages[0]).is_some());
}

#[test]
fn test_format_messages() {
    let mut messages = vec![ModelMessage::from(ModelRequest::system_prompt("be brief"))];
    messages.extend(turn(0));
    messages.push(
        ModelResponse::new(vec![ResponsePart::Text(TextPart::new("done"))]).into(),
    );

    assert_eq!(
        format_messages(&messages),
        "System: be brief\n\
         User: question 0\n\
         Tool Call: search({\"query\":\"q0\"})\n\
         Tool Result (search): result 0\n\
         Assistant: answer 0\n\
         Assistant: done"
    );
}

#[test]
fn test_policies_from_config() {
    let config = crate::config::CompactionConfig {
        keep_last: 4,
        placeholder: "[hidden]".to_string(),
        accounting: TokenAccounting::LastResponseInput,
        ..Default::default()
    };
    let masking = ObservationMasking::from_config(&config);
    assert_eq!(masking.keep_last(), 4);
    assert_eq!(masking.placeholder(), "[hidden]");

    let summarization =
        Summarization::from_config(Arc::new(RecordingAgent::default()), &config).unwrap();
    assert_eq!(summarization.keep_last(), 4);
    assert_eq!(summarization.summary_prompt(), DEFAULT_SUMMARY_PROMPT);
}
