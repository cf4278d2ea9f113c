use async_trait::async_trait;
use serde_json::{json, Value};

use super::ToolHandler;
use crate::errors::AgentResult;
use crate::models::tool::Tool;

pub struct GreetingTool {
    tool: Tool,
}

impl GreetingTool {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "greeting",
                "Greeting for everyone",
                json!({"type": "object", "properties": {}}),
            ),
        }
    }
}

impl Default for GreetingTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for GreetingTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn invoke(&self, _arguments: Value) -> AgentResult<String> {
        Ok("Hello World".to_string())
    }
}
