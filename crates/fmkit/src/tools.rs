//! Tools an agent can offer to the model, and the registry that holds them.

pub mod arithmetic;
pub mod dispatch;
pub mod greeting;
pub mod retrieval;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;

pub use dispatch::{dispatch, truncate_output, TRUNCATION_MARKER};

/// A callable exposed to the model under a unique name
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The descriptor sent to the model
    fn tool(&self) -> &Tool;

    fn name(&self) -> &str {
        &self.tool().name
    }

    fn description(&self) -> &str {
        &self.tool().description
    }

    fn input_schema(&self) -> &Value {
        &self.tool().input_schema
    }

    /// Run the tool with the model-provided arguments
    async fn invoke(&self, arguments: Value) -> AgentResult<String>;
}

/// Tool handlers in registration order, keyed by unique name
#[derive(Default)]
pub struct ToolRegistry {
    handlers: Vec<Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler, rejecting a name that is already taken
    pub fn register(&mut self, handler: Box<dyn ToolHandler>) -> AgentResult<()> {
        if self.get(handler.name()).is_some() {
            return Err(AgentError::DuplicateTool(handler.name().to_string()));
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn with<H: ToolHandler + 'static>(mut self, handler: H) -> AgentResult<Self> {
        self.register(Box::new(handler))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.name() == name)
            .map(|handler| &**handler)
    }

    /// Descriptors for every registered tool, in registration order
    pub fn tools(&self) -> Vec<Tool> {
        self.handlers
            .iter()
            .map(|handler| handler.tool().clone())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
