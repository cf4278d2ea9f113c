use tracing::info;

use crate::agent::{Agent, RunOutcome};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::providers::errors::ProviderError;

pub const MATH_KEYWORDS: &[&str] = &[
    "calculate",
    "add",
    "subtract",
    "multiply",
    "divide",
    "math",
    "+",
    "-",
    "*",
    "/",
    "sum",
    "times",
    "what is",
    "compute",
    "solve",
    "result of",
];

/// A worker agent and the keywords that send a query its way
pub struct Route {
    pub name: String,
    pub keywords: Vec<String>,
    pub agent: Agent,
}

impl Route {
    fn matches(&self, query: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| query.contains(keyword.as_str()))
    }
}

#[derive(Debug)]
pub enum SupervisorOutcome {
    /// A worker handled the query
    Routed { route: String, outcome: RunOutcome },
    /// No route matched; no agent was called
    Unrouted,
}

/// Routes a conversation to the first worker whose keywords appear in the
/// first user message
#[derive(Default)]
pub struct Supervisor {
    routes: Vec<Route>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route<S: AsRef<str>>(
        mut self,
        name: impl Into<String>,
        keywords: &[S],
        agent: Agent,
    ) -> Self {
        self.routes.push(Route {
            name: name.into(),
            keywords: keywords
                .iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
            agent,
        });
        self
    }

    /// Pick the route for a conversation, if any
    pub fn route(&self, messages: &[Message]) -> Option<&Route> {
        let query = messages
            .iter()
            .find(|message| message.role == Role::User)?
            .content
            .to_lowercase();
        self.routes.iter().find(|route| route.matches(&query))
    }

    pub async fn run(&self, messages: &[Message]) -> Result<SupervisorOutcome, ProviderError> {
        let Some(route) = self.route(messages) else {
            info!("no route matched; ending without calling an agent");
            return Ok(SupervisorOutcome::Unrouted);
        };

        info!(route = %route.name, "routing conversation");
        let outcome = route.agent.run(messages).await?;
        Ok(SupervisorOutcome::Routed {
            route: route.name.clone(),
            outcome,
        })
    }
}
