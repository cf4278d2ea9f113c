use tracing::{debug, warn};

use super::ToolRegistry;
use crate::errors::AgentError;
use crate::models::message::{Message, ToolRequest};

/// Appended to tool output that was cut to fit the configured limit
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Execute one tool request and answer it with a tool message.
///
/// Failures never escape: an unknown tool, a malformed request or a failing
/// handler all become an `Error: ...` message the model can react to.
pub async fn dispatch(
    registry: &ToolRegistry,
    request: &ToolRequest,
    max_output_chars: usize,
) -> Message {
    let output = match &request.tool_call {
        Ok(call) => match registry.get(&call.name) {
            Some(handler) => {
                debug!(tool = %call.name, id = %request.id, "invoking tool");
                handler.invoke(call.arguments.clone()).await
            }
            None => Err(AgentError::ToolNotFound(call.name.clone())),
        },
        Err(e) => Err(e.clone()),
    };

    let content = match output {
        Ok(text) => truncate_output(&text, max_output_chars),
        Err(e) => {
            warn!(id = %request.id, error = %e, "tool request failed");
            format!("Error: {}", e)
        }
    };

    Message::tool(&request.id).with_text(content)
}

/// Keep the first `max_chars` characters, marking the cut when one was made
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{}", &text[..end], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
