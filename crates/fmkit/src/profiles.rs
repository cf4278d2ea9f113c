//! Named agent setups: a system prompt plus the tools that go with it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString};

use crate::agent::{Agent, RunConfig};
use crate::errors::{AgentError, AgentResult};
use crate::prompt_template::load_embedded_prompt;
use crate::providers::base::Provider;
use crate::retrieval::Retriever;
use crate::tools::arithmetic;
use crate::tools::greeting::GreetingTool;
use crate::tools::retrieval::RetrievalTool;
use crate::tools::ToolRegistry;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AgentProfile {
    General,
    Calculator,
    Planner,
    Verifier,
    Math,
    Rag,
}

impl AgentProfile {
    fn prompt_file(&self) -> String {
        format!("{}.md", self)
    }

    /// Planners only plan; every other profile gets tools
    pub fn uses_tools(&self) -> bool {
        !matches!(self, AgentProfile::Planner)
    }

    /// The registry this profile works with. The `rag` profile needs a retriever.
    pub fn tools(
        &self,
        retriever: Option<Arc<dyn Retriever>>,
        top_k: usize,
    ) -> AgentResult<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        match self {
            AgentProfile::Planner => {}
            AgentProfile::Calculator | AgentProfile::Verifier | AgentProfile::Math => {
                for tool in arithmetic::all() {
                    registry.register(Box::new(tool))?;
                }
            }
            AgentProfile::General => {
                for tool in arithmetic::all() {
                    registry.register(Box::new(tool))?;
                }
                registry.register(Box::new(GreetingTool::new()))?;
            }
            AgentProfile::Rag => {
                let retriever = retriever.ok_or_else(|| {
                    AgentError::Internal("the rag profile needs a document index".to_string())
                })?;
                registry.register(Box::new(RetrievalTool::new(retriever, top_k)))?;
            }
        }
        Ok(registry)
    }

    /// Render this profile's system prompt for the given tools
    pub fn system_prompt(&self, registry: &ToolRegistry) -> AgentResult<String> {
        let context = HashMap::from([("tools", registry.names())]);
        load_embedded_prompt(&self.prompt_file(), &context)
            .map(|prompt| prompt.trim().to_string())
            .map_err(|e| AgentError::Internal(e.to_string()))
    }

    pub fn build_agent(
        &self,
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        config: RunConfig,
    ) -> AgentResult<Agent> {
        let prompt = self.system_prompt(&registry)?;
        Ok(Agent::new(provider)
            .with_name(self.to_string())
            .with_tools(registry)
            .with_system_prompt(prompt)
            .with_config(config))
    }
}
