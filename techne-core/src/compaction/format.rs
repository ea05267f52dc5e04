use crate::messages::{ModelMessage, RequestPart, ResponsePart};

/// Flatten messages into a plain transcript for a summarizer, one line per part
///
/// Retry prompts and thinking parts are left out.
pub fn format_messages(messages: &[ModelMessage]) -> String {
    let mut lines = Vec::new();
    for message in messages {
        match message {
            ModelMessage::Request(request) => {
                for part in &request.parts {
                    match part {
                        RequestPart::UserPrompt(prompt) => lines.push(format!("User: {}", prompt.content)),
                        RequestPart::SystemPrompt(prompt) => {
                            lines.push(format!("System: {}", prompt.content))
                        }
                        RequestPart::ToolReturn(ret) => lines.push(format!(
                            "Tool Result ({}): {}",
                            ret.tool_name,
                            ret.model_response_str()
                        )),
                        RequestPart::RetryPrompt(_) => {}
                    }
                }
            }
            ModelMessage::Response(response) => {
                for part in &response.parts {
                    match part {
                        ResponsePart::Text(text) => lines.push(format!("Assistant: {}", text.content)),
                        ResponsePart::ToolCall(call) => lines.push(format!(
                            "Tool Call: {}({})",
                            call.tool_name,
                            call.args_as_json_str()
                        )),
                        ResponsePart::Thinking(_) => {}
                    }
                }
            }
        }
    }
    lines.join("\n")
}
