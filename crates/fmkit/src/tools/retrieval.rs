use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::ToolHandler;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::Tool;
use crate::retrieval::Retriever;

pub const NO_RESULTS: &str = "No relevant documents found.";

/// Document search exposed to the model as `RAGQuery`
pub struct RetrievalTool {
    tool: Tool,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl RetrievalTool {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        let tool = Tool::new(
            "RAGQuery",
            "Search information in documents to provide context to a user query. \
            Useful when asked to ground the answer in specific knowledge from documents.",
            json!({
                "type": "object",
                "additionalProperties": false,
                "$schema": "http://json-schema.org/draft-07/schema#",
                "properties": {
                    "input": {
                        "description": "input for the tool",
                        "type": "string"
                    }
                }
            }),
        );
        Self {
            tool,
            retriever,
            top_k,
        }
    }
}

#[async_trait]
impl ToolHandler for RetrievalTool {
    fn tool(&self) -> &Tool {
        &self.tool
    }

    async fn invoke(&self, arguments: Value) -> AgentResult<String> {
        let query = match arguments.get("input") {
            Some(Value::String(query)) => query.clone(),
            // some models wrap the query in an object
            Some(other) if !other.is_null() => other.to_string(),
            _ => {
                return Err(AgentError::InvalidParameters(
                    "The parameter 'input' is required".to_string(),
                ))
            }
        };

        let passages = self.retriever.retrieve(&query, self.top_k).await?;
        if passages.is_empty() {
            return Ok(NO_RESULTS.to_string());
        }

        Ok(passages
            .into_iter()
            .map(|passage| passage.text)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
