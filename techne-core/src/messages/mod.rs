//! Conversation history exchanged with a model
//!
//! A history is an ordered list of [`ModelMessage`]s alternating between
//! requests (what the agent sends) and responses (what the model returns).
//! Tool calls live in a response; their returns live in the following request.

mod usage;

pub use usage::{RequestUsage, RunUsage};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single message in the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelMessage {
    /// Message sent to the model
    Request(ModelRequest),
    /// Message returned by the model
    Response(ModelResponse),
}

impl ModelMessage {
    pub fn as_request(&self) -> Option<&ModelRequest> {
        match self {
            ModelMessage::Request(request) => Some(request),
            ModelMessage::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&ModelResponse> {
        match self {
            ModelMessage::Response(response) => Some(response),
            ModelMessage::Request(_) => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, ModelMessage::Request(_))
    }
}

impl From<ModelRequest> for ModelMessage {
    fn from(request: ModelRequest) -> Self {
        ModelMessage::Request(request)
    }
}

impl From<ModelResponse> for ModelMessage {
    fn from(response: ModelResponse) -> Self {
        ModelMessage::Response(response)
    }
}

/// A request message made of prompt, tool-return and retry parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub parts: Vec<RequestPart>,
    /// When the request was sent; filled in before the request goes out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ModelRequest {
    pub fn new(parts: Vec<RequestPart>) -> Self {
        Self {
            parts,
            timestamp: None,
            instructions: None,
        }
    }

    /// Request holding a single user prompt
    pub fn user_prompt(content: impl Into<String>) -> Self {
        Self::new(vec![RequestPart::UserPrompt(UserPromptPart::new(content))])
    }

    /// Request holding a single system prompt
    pub fn system_prompt(content: impl Into<String>) -> Self {
        Self::new(vec![RequestPart::SystemPrompt(SystemPromptPart::new(content))])
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Parts that can appear in a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "kebab-case")]
pub enum RequestPart {
    SystemPrompt(SystemPromptPart),
    UserPrompt(UserPromptPart),
    ToolReturn(ToolReturnPart),
    RetryPrompt(RetryPromptPart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPromptPart {
    pub content: String,
}

impl SystemPromptPart {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPromptPart {
    pub content: String,
}

impl UserPromptPart {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// The result of a tool call, sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolReturnPart {
    pub tool_name: String,
    pub content: Value,
    pub tool_call_id: String,
}

impl ToolReturnPart {
    pub fn new(
        tool_name: impl Into<String>,
        content: impl Into<Value>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Content rendered as text; strings are used verbatim, anything else as JSON
    pub fn model_response_str(&self) -> String {
        value_to_text(&self.content)
    }
}

/// Asks the model to try again, optionally on behalf of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPromptPart {
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl RetryPromptPart {
    pub fn new(content: impl Into<Value>) -> Self {
        Self {
            content: content.into(),
            tool_name: None,
            tool_call_id: None,
        }
    }

    pub fn for_tool(mut self, tool_name: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self.tool_call_id = Some(tool_call_id.into());
        self
    }
}

/// A response message produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub parts: Vec<ResponsePart>,
    #[serde(default)]
    pub usage: RequestUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ModelResponse {
    pub fn new(parts: Vec<ResponsePart>) -> Self {
        Self {
            parts,
            usage: RequestUsage::default(),
            model_name: None,
            timestamp: Utc::now(),
        }
    }

    /// Response holding a single text part
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(vec![ResponsePart::Text(TextPart::new(content))])
    }

    pub fn with_usage(mut self, usage: RequestUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Tool calls requested in this response, in order
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallPart> {
        self.parts.iter().filter_map(|part| match part {
            ResponsePart::ToolCall(call) => Some(call),
            _ => None,
        })
    }
}

/// Parts that can appear in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "kebab-case")]
pub enum ResponsePart {
    Text(TextPart),
    ToolCall(ToolCallPart),
    Thinking(ThinkingPart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    pub content: String,
}

impl TextPart {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingPart {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A tool invocation requested by the model
///
/// `args` is either a JSON object or a string holding one, depending on how
/// the provider delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
    pub tool_call_id: String,
}

impl ToolCallPart {
    pub fn new(tool_name: impl Into<String>, args: Value, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Arguments as a JSON object; empty when the model sent none
    pub fn args_as_map(&self) -> serde_json::Result<Map<String, Value>> {
        match &self.args {
            Value::Null => Ok(Map::new()),
            Value::String(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Value::String(raw) => serde_json::from_str(raw),
            other => serde_json::from_value(other.clone()),
        }
    }

    /// Arguments serialized as a compact JSON string
    pub fn args_as_json_str(&self) -> String {
        match &self.args {
            Value::String(raw) => raw.clone(),
            Value::Null => "{}".to_string(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod messages_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_args_from_string() {
        let call = ToolCallPart::new("add", json!("{\"a\": 1, \"b\": 2}"), "call-1");
        let args = call.args_as_map().unwrap();
        assert_eq!(args.get("a"), Some(&json!(1)));
        assert_eq!(call.args_as_json_str(), "{\"a\": 1, \"b\": 2}");
    }

    #[test]
    fn test_tool_call_args_empty() {
        let call = ToolCallPart::new("list_todos", Value::Null, "call-1");
        assert!(call.args_as_map().unwrap().is_empty());
        assert_eq!(call.args_as_json_str(), "{}");
    }

    #[test]
    fn test_message_serde_tags() {
        let message = ModelMessage::from(ModelRequest::user_prompt("hi"));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["kind"], "request");
        assert_eq!(value["parts"][0]["part_kind"], "user-prompt");

        let back: ModelMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, message);
    }
}
