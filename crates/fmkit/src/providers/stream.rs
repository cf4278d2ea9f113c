//! Buffering of server-sent chat-completion chunks.
//!
//! A streamed response arrives as `data: {...}` lines. Text deltas can be shown as
//! they come, but tool calls arrive in pieces keyed by index (id and name first,
//! arguments spread over many chunks), so the complete message is only known once
//! the stream ends.

use serde_json::Value;
use std::collections::BTreeMap;

use super::base::Usage;
use super::errors::ProviderError;
use super::utils::{check_openai_error, get_usage, parse_tool_request};
use crate::models::message::Message;

/// Splits a byte stream into complete lines, holding back any partial line
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }

    /// Return whatever is left once the byte stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

/// What a single SSE line means for the stream
#[derive(Debug, PartialEq)]
pub enum SseLine {
    Data(Value),
    Done,
    Ignored,
}

pub fn parse_sse_line(line: &str) -> Result<SseLine, ProviderError> {
    let Some(data) = line.strip_prefix("data:") else {
        // comments, event names, blank separators
        return Ok(SseLine::Ignored);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(SseLine::Ignored);
    }
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    Ok(SseLine::Data(serde_json::from_str(data)?))
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates chunks until the full assistant message can be built
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    tool_calls: BTreeMap<u64, PartialToolCall>,
    usage: Usage,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one chunk, returning the text fragment it carried, if any
    pub fn apply(&mut self, chunk: &Value) -> Result<Option<String>, ProviderError> {
        if let Some(error) = chunk.get("error") {
            return Err(check_openai_error(error));
        }

        let usage = get_usage(chunk);
        if usage != Usage::default() {
            self.usage = usage;
        }

        let Some(delta) = chunk
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("delta"))
        else {
            return Ok(None);
        };

        if let Some(tool_calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
            for (position, call) in tool_calls.iter().enumerate() {
                let index = call
                    .get("index")
                    .and_then(|i| i.as_u64())
                    .unwrap_or(position as u64);
                let partial = self.tool_calls.entry(index).or_default();
                if let Some(id) = call.get("id").and_then(|v| v.as_str()) {
                    partial.id = id.to_string();
                }
                if let Some(function) = call.get("function") {
                    if let Some(name) = function.get("name").and_then(|v| v.as_str()) {
                        partial.name.push_str(name);
                    }
                    if let Some(arguments) = function.get("arguments").and_then(|v| v.as_str()) {
                        partial.arguments.push_str(arguments);
                    }
                }
            }
        }

        match delta.get("content").and_then(|c| c.as_str()) {
            Some(text) if !text.is_empty() => {
                self.content.push_str(text);
                Ok(Some(text.to_string()))
            }
            _ => Ok(None),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Build the complete assistant message from everything received
    pub fn finish(self) -> (Message, Usage) {
        let mut message = Message::assistant().with_text(&self.content);
        for partial in self.tool_calls.into_values() {
            message.tool_requests.push(parse_tool_request(
                &partial.id,
                &partial.name,
                &partial.arguments,
            ));
        }
        (message, self.usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use serde_json::json;

    #[test]
    fn test_line_buffer_joins_split_lines() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b": 1}\r\n\ndata: [DONE]");
        assert_eq!(lines, vec!["data: {\"a\": 1}".to_string(), String::new()]);
        assert_eq!(buffer.finish(), Some("data: [DONE]".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_parse_sse_line() -> anyhow::Result<()> {
        assert_eq!(parse_sse_line("data: [DONE]")?, SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive")?, SseLine::Ignored);
        assert_eq!(parse_sse_line("")?, SseLine::Ignored);
        assert_eq!(parse_sse_line("data: {\"x\":1}")?, SseLine::Data(json!({"x": 1})));
        assert!(parse_sse_line("data: {oops").is_err());
        Ok(())
    }

    #[test]
    fn test_accumulator_text_only() -> anyhow::Result<()> {
        let mut acc = StreamAccumulator::new();
        let first = acc.apply(&json!({"choices": [{"delta": {"role": "assistant", "content": "Hel"}}]}))?;
        let second = acc.apply(&json!({"choices": [{"delta": {"content": "lo"}}]}))?;
        acc.apply(&json!({
            "choices": [{"delta": {}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }))?;

        assert_eq!(first.as_deref(), Some("Hel"));
        assert_eq!(second.as_deref(), Some("lo"));
        assert!(!acc.has_tool_calls());

        let (message, usage) = acc.finish();
        assert_eq!(message.content, "Hello");
        assert!(message.tool_requests.is_empty());
        assert_eq!(usage.total_tokens, Some(5));
        Ok(())
    }

    #[test]
    fn test_accumulator_tool_call_deltas() -> anyhow::Result<()> {
        let mut acc = StreamAccumulator::new();
        acc.apply(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_a", "function": {"name": "add", "arguments": ""}}
        ]}}]}))?;
        acc.apply(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "{\"a\": 2,"}}
        ]}}]}))?;
        acc.apply(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 1, "id": "call_b", "function": {"name": "greeting", "arguments": ""}},
            {"index": 0, "function": {"arguments": " \"b\": 3}"}}
        ]}}]}))?;

        assert!(acc.has_tool_calls());
        let (message, _) = acc.finish();
        assert_eq!(message.tool_requests.len(), 2);
        assert_eq!(message.tool_requests[0].id, "call_a");
        let call = message.tool_requests[0].tool_call.as_ref().unwrap();
        assert_eq!(call.arguments, json!({"a": 2, "b": 3}));
        let call = message.tool_requests[1].tool_call.as_ref().unwrap();
        assert_eq!(call.name, "greeting");
        assert_eq!(call.arguments, json!({}));
        Ok(())
    }

    #[test]
    fn test_accumulator_truncated_arguments() -> anyhow::Result<()> {
        let mut acc = StreamAccumulator::new();
        acc.apply(&json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_a", "function": {"name": "add", "arguments": "{\"a\": "}}
        ]}}]}))?;
        let (message, _) = acc.finish();
        assert!(matches!(
            message.tool_requests[0].tool_call,
            Err(AgentError::InvalidParameters(_))
        ));
        Ok(())
    }

    #[test]
    fn test_accumulator_error_chunk() {
        let mut acc = StreamAccumulator::new();
        let result = acc.apply(&json!({"error": {"message": "quota exceeded"}}));
        assert!(matches!(result, Err(ProviderError::Api(m)) if m == "quota exceeded"));
    }
}
