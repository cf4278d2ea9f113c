use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

use super::base::Usage;
use super::errors::ProviderError;
use crate::errors::AgentError;
use crate::models::message::{Message, ToolRequest};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"));
static VALID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex"));

/// Convert internal messages to the chat-completions message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::System | Role::User => messages_spec.push(json!({
                "role": message.role,
                "content": message.content,
            })),
            Role::Assistant => {
                let mut converted = json!({ "role": "assistant" });

                // Every request is echoed, parsed or not, so each tool reply that
                // follows has a matching id
                let tool_calls: Vec<Value> = message
                    .tool_requests
                    .iter()
                    .map(|request| {
                        let (name, arguments) = echoed_function(request);
                        json!({
                            "id": request.id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": arguments,
                            }
                        })
                    })
                    .collect();

                if tool_calls.is_empty() {
                    converted["content"] = json!(message.content);
                } else {
                    converted["content"] = if message.content.is_empty() {
                        Value::Null
                    } else {
                        json!(message.content)
                    };
                    converted["tool_calls"] = json!(tool_calls);
                }
                messages_spec.push(converted);
            }
            Role::Tool => messages_spec.push(json!({
                "role": "tool",
                "content": message.content,
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
            })),
        }
    }

    messages_spec
}

const UNKNOWN_TOOL: &str = "unknown_tool";

/// The function name and argument text to send back for a request. Unparsed
/// requests fall back to their sanitized raw name and, when it is not JSON,
/// an empty argument object.
fn echoed_function(request: &ToolRequest) -> (String, String) {
    match (&request.tool_call, &request.raw) {
        (Ok(call), _) => (
            sanitize_function_name(&call.name),
            call.arguments.to_string(),
        ),
        (Err(_), Some(raw)) => {
            let name = sanitize_function_name(&raw.name);
            let name = if name.is_empty() {
                UNKNOWN_TOOL.to_string()
            } else {
                name
            };
            let arguments = match serde_json::from_str::<Value>(&raw.arguments) {
                Ok(value) => value.to_string(),
                Err(_) => "{}".to_string(),
            };
            (name, arguments)
        }
        (Err(_), None) => (UNKNOWN_TOOL.to_string(), "{}".to_string()),
    }
}

/// Convert tool descriptors to the chat-completions tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(ProviderError::InvalidRequest(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build a tool request from the raw pieces of a function call
pub fn parse_tool_request(id: &str, function_name: &str, arguments: &str) -> ToolRequest {
    if !is_valid_function_name(function_name) {
        let error = AgentError::InvalidToolName(format!(
            "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
            function_name
        ));
        return ToolRequest::new(id, Err(error)).with_raw(function_name, arguments);
    }

    // Some endpoints send an empty string for argument-less calls
    let arguments = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };

    match serde_json::from_str::<Value>(arguments) {
        Ok(params) => ToolRequest::new(id, Ok(ToolCall::new(function_name, params))),
        Err(e) => ToolRequest::new(
            id,
            Err(AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ))),
        )
        .with_raw(function_name, arguments),
    }
}

/// Convert a chat-completions response to an internal assistant message
pub fn openai_response_to_message(response: &Value) -> Result<Message, ProviderError> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ProviderError::MalformedResponse("response has no choices".to_string()))?;

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|t| t.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let function_name = tool_call["function"]["name"].as_str().unwrap_or_default();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();
            message
                .tool_requests
                .push(parse_tool_request(id, function_name, arguments));
        }
    }

    Ok(message)
}

/// Read token counts from a response or a final stream chunk
pub fn get_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage").filter(|u| !u.is_null()) else {
        return Usage::default();
    };

    let count = |key: &str| usage.get(key).and_then(|v| v.as_i64()).map(|v| v as i32);
    let input_tokens = count("prompt_tokens");
    let output_tokens = count("completion_tokens");
    let total_tokens = count("total_tokens").or(match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

pub fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

/// Map an `error` object in a response body to a provider error
pub fn check_openai_error(error: &Value) -> ProviderError {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    match error.get("code").and_then(|c| c.as_str()) {
        Some("context_length_exceeded") | Some("string_above_max_length") => {
            ProviderError::ContextLengthExceeded(message)
        }
        _ => ProviderError::Api(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    #[test]
    fn test_messages_to_openai_spec() {
        let messages = vec![
            Message::system().with_text("Be brief"),
            Message::user().with_text("Hello"),
        ];
        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "system");
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(spec[1]["content"], "Hello");
    }

    #[test]
    fn test_messages_to_openai_spec_tool_round() {
        let messages = vec![
            Message::assistant()
                .with_tool_request("call_1", Ok(ToolCall::new("add", json!({"a": 2, "b": 3})))),
            Message::tool("call_1").with_text("5"),
        ];
        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["content"], Value::Null);
        assert_eq!(spec[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(spec[0]["tool_calls"][0]["function"]["name"], "add");
        assert_eq!(
            spec[0]["tool_calls"][0]["function"]["arguments"],
            r#"{"a":2,"b":3}"#
        );
        assert_eq!(spec[1]["role"], "tool");
        assert_eq!(spec[1]["tool_call_id"], "call_1");
        assert_eq!(spec[1]["content"], "5");
    }

    #[test]
    fn test_messages_to_openai_spec_echoes_failed_requests() {
        let messages = vec![
            Message::user().with_text("Add 2 and 3"),
            Message::assistant().with_tool_request(
                "call_bad",
                Err(AgentError::InvalidParameters("not json".to_string())),
            ),
            Message::tool("call_bad").with_text("Error: not json"),
        ];
        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec[1]["content"], Value::Null);
        assert_eq!(spec[1]["tool_calls"][0]["id"], "call_bad");
        assert_eq!(spec[1]["tool_calls"][0]["function"]["name"], "unknown_tool");
        assert_eq!(spec[1]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(spec[2]["tool_call_id"], "call_bad");
    }

    #[test]
    fn test_messages_to_openai_spec_uses_raw_call() {
        let bad_name = parse_tool_request("call_1", "get weather!", r#"{"city": "Oslo"}"#);
        let bad_args = parse_tool_request("call_2", "add", "{not json");
        let mut assistant = Message::assistant().with_text("Working on it");
        assistant.tool_requests = vec![bad_name, bad_args];
        let spec = messages_to_openai_spec(&[assistant]);

        let calls = spec[0]["tool_calls"].as_array().unwrap();
        assert_eq!(spec[0]["content"], "Working on it");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["function"]["name"], "get_weather_");
        assert_eq!(calls[0]["function"]["arguments"], r#"{"city":"Oslo"}"#);
        assert_eq!(calls[1]["function"]["name"], "add");
        assert_eq!(calls[1]["function"]["arguments"], "{}");
    }

    #[test]
    fn test_messages_to_openai_spec_empty_assistant_has_content() {
        let spec = messages_to_openai_spec(&[Message::assistant()]);
        assert_eq!(spec[0]["content"], "");
        assert!(spec[0].get("tool_calls").is_none());
    }

    #[test]
    fn test_tools_to_openai_spec() -> anyhow::Result<()> {
        let tool = Tool::new(
            "test_tool",
            "A test tool",
            json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Test parameter"
                    }
                },
                "required": ["input"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool])?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let tool = Tool::new("test_tool", "A test tool", json!({}));
        let result = tools_to_openai_spec(&[tool.clone(), tool]);
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }

    #[test]
    fn test_openai_response_to_message_tool_request() -> anyhow::Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(&response)?;

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.tool_requests.len(), 1);
        let call = message.tool_requests[0].tool_call.as_ref().unwrap();
        assert_eq!(call.name, "example_fn");
        assert_eq!(call.arguments, json!({"param": "value"}));
        assert_eq!(get_usage(&response), Usage::new(Some(10), Some(25), Some(35)));
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_invalid_name() -> anyhow::Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["name"] =
            json!("invalid fn");
        let message = openai_response_to_message(&response)?;

        assert!(matches!(
            message.tool_requests[0].tool_call,
            Err(AgentError::InvalidToolName(_))
        ));
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_bad_arguments() -> anyhow::Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("{not json");
        let message = openai_response_to_message(&response)?;

        assert!(matches!(
            message.tool_requests[0].tool_call,
            Err(AgentError::InvalidParameters(_))
        ));
        Ok(())
    }

    #[test]
    fn test_openai_response_without_choices() {
        let result = openai_response_to_message(&json!({"choices": []}));
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_check_openai_error() {
        let error = json!({"code": "context_length_exceeded", "message": "too long"});
        assert!(matches!(
            check_openai_error(&error),
            ProviderError::ContextLengthExceeded(m) if m == "too long"
        ));

        let error = json!({"code": "rate_limited", "message": "slow down"});
        assert!(matches!(check_openai_error(&error), ProviderError::Api(_)));
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("get weather!"), "get_weather_");
        assert!(is_valid_function_name("RAGQuery"));
        assert!(!is_valid_function_name(""));
    }
}
