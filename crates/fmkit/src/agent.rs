use async_stream::try_stream;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AgentSettings;
use crate::models::message::{Message, ToolRequest};
use crate::models::role::Role;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, StreamEvent, Usage};
use crate::providers::errors::ProviderError;
use crate::tools::{dispatch, ToolRegistry};

/// Limits and mode for a single run of the tool-calling loop
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Maximum number of model calls in one run
    pub max_iterations: usize,
    /// Tool output longer than this many characters is truncated
    pub max_tool_output_chars: usize,
    /// Use the provider's streaming call and forward text fragments
    pub stream: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            max_tool_output_chars: 2000,
            stream: false,
        }
    }
}

impl RunConfig {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            max_tool_output_chars: settings.max_tool_output,
            stream: false,
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced an answer without requesting tools
    Completed,
    /// The iteration ceiling was hit before a final answer
    IterationLimit,
}

/// What a running agent reports as it goes
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A piece of assistant text, only emitted when streaming
    Fragment(String),
    /// A message appended to the conversation
    Message(Message),
    /// The run is over; always the last event
    Finished {
        iterations: usize,
        status: RunStatus,
        usage: Usage,
    },
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The full conversation, including the input messages
    pub messages: Vec<Message>,
    /// Number of model calls made
    pub iterations: usize,
    pub status: RunStatus,
    pub usage: Usage,
}

impl RunOutcome {
    /// The last assistant message of the run
    pub fn final_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    /// The final answer text; `None` when the last assistant message is blank
    pub fn final_text(&self) -> Option<&str> {
        self.final_message().and_then(Message::text)
    }
}

enum LoopState {
    CallingModel,
    DispatchingTools(Vec<ToolRequest>),
    Done(RunStatus),
}

pub fn iteration_limit_message(max_iterations: usize) -> String {
    format!(
        "Stopped after {} iterations without reaching a final answer.",
        max_iterations
    )
}

/// Agent drives a model through the tool-calling loop until it answers
pub struct Agent {
    name: String,
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    system_prompt: Option<String>,
    config: RunConfig,
}

impl Agent {
    /// Create a new Agent with the specified provider and no tools
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            name: "agent".to_string(),
            provider,
            registry: ToolRegistry::new(),
            system_prompt: None,
            config: RunConfig::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.registry.tools()
    }

    /// The conversation a run starts from: the system prompt goes first unless
    /// the caller already supplied one
    pub fn prepare(&self, messages: &[Message]) -> Vec<Message> {
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            let has_system = messages
                .first()
                .is_some_and(|message| message.role == Role::System);
            if !has_system {
                conversation.push(Message::system().with_text(prompt));
            }
        }
        conversation.extend_from_slice(messages);
        conversation
    }

    async fn call_model(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        self.provider.complete(messages, tools).await
    }

    /// Create a stream of events as the agent works: every appended message, text
    /// fragments when streaming, and a final [`AgentEvent::Finished`].
    pub fn reply(&self, messages: &[Message]) -> BoxStream<'_, Result<AgentEvent, ProviderError>> {
        let mut messages = self.prepare(messages);
        let tools = self.registry.tools();

        Box::pin(try_stream! {
            let mut state = LoopState::CallingModel;
            let mut iterations = 0;
            let mut usage = Usage::default();

            loop {
                state = match state {
                    LoopState::CallingModel => {
                        if iterations >= self.config.max_iterations {
                            warn!(agent = %self.name, iterations, "iteration limit reached");
                            let message = Message::assistant()
                                .with_text(iteration_limit_message(self.config.max_iterations));
                            messages.push(message.clone());
                            yield AgentEvent::Message(message);
                            LoopState::Done(RunStatus::IterationLimit)
                        } else {
                            iterations += 1;
                            debug!(agent = %self.name, iteration = iterations, "calling model");

                            let (response, call_usage) = if self.config.stream {
                                let mut events = self.provider.stream(&messages, &tools).await?;
                                let mut summary = None;
                                while let Some(event) = events.next().await {
                                    match event? {
                                        StreamEvent::Fragment(text) => {
                                            yield AgentEvent::Fragment(text);
                                        }
                                        StreamEvent::Done { message, usage } => {
                                            summary = Some((message, usage));
                                            break;
                                        }
                                    }
                                }
                                summary.ok_or_else(|| {
                                    ProviderError::MalformedResponse(
                                        "stream ended without a final message".to_string(),
                                    )
                                })?
                            } else {
                                self.call_model(&messages, &tools).await?
                            };
                            usage.accumulate(&call_usage);

                            let pending = response.tool_requests.clone();
                            messages.push(response.clone());
                            yield AgentEvent::Message(response);

                            if pending.is_empty() {
                                LoopState::Done(RunStatus::Completed)
                            } else {
                                LoopState::DispatchingTools(pending)
                            }
                        }
                    }
                    LoopState::DispatchingTools(pending) => {
                        for request in &pending {
                            let result =
                                dispatch(&self.registry, request, self.config.max_tool_output_chars).await;
                            messages.push(result.clone());
                            yield AgentEvent::Message(result);
                        }
                        LoopState::CallingModel
                    }
                    LoopState::Done(status) => {
                        info!(agent = %self.name, iterations, ?status, "run finished");
                        yield AgentEvent::Finished { iterations, status, usage: usage.clone() };
                        break;
                    }
                };
            }
        })
    }

    /// Drive the loop to completion and return the whole conversation
    pub async fn run(&self, messages: &[Message]) -> Result<RunOutcome, ProviderError> {
        self.run_with(messages, |_| {}).await
    }

    /// Like [`Agent::run`], handing each streamed text fragment to `on_fragment`
    /// as it arrives
    pub async fn run_with<F>(
        &self,
        messages: &[Message],
        mut on_fragment: F,
    ) -> Result<RunOutcome, ProviderError>
    where
        F: FnMut(&str),
    {
        let mut outcome = RunOutcome {
            messages: self.prepare(messages),
            iterations: 0,
            status: RunStatus::Completed,
            usage: Usage::default(),
        };

        let mut events = self.reply(messages);
        while let Some(event) = events.try_next().await? {
            match event {
                AgentEvent::Fragment(text) => on_fragment(&text),
                AgentEvent::Message(message) => outcome.messages.push(message),
                AgentEvent::Finished {
                    iterations,
                    status,
                    usage,
                } => {
                    outcome.iterations = iterations;
                    outcome.status = status;
                    outcome.usage = usage;
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AgentError, AgentResult};
    use crate::models::tool::ToolCall;
    use crate::providers::mock::MockProvider;
    use crate::tools::arithmetic;
    use crate::tools::{ToolHandler, TRUNCATION_MARKER};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FailingTool {
        tool: Tool,
    }

    #[async_trait]
    impl ToolHandler for FailingTool {
        fn tool(&self) -> &Tool {
            &self.tool
        }

        async fn invoke(&self, _arguments: Value) -> AgentResult<String> {
            Err(AgentError::ExecutionError("disk on fire".to_string()))
        }
    }

    struct VerboseTool {
        tool: Tool,
    }

    #[async_trait]
    impl ToolHandler for VerboseTool {
        fn tool(&self) -> &Tool {
            &self.tool
        }

        async fn invoke(&self, _arguments: Value) -> AgentResult<String> {
            Ok("y".repeat(5000))
        }
    }

    fn calculator() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in arithmetic::all() {
            registry.register(Box::new(tool)).unwrap();
        }
        registry
    }

    fn tool_request(id: &str, name: &str, arguments: Value) -> Message {
        Message::assistant().with_tool_request(id, Ok(ToolCall::new(name, arguments)))
    }

    #[tokio::test]
    async fn test_immediate_answer() -> anyhow::Result<()> {
        let answer = Message::assistant().with_text("Paris.");
        let provider = Arc::new(MockProvider::new(vec![answer.clone()]));
        let agent = Agent::new(provider.clone()).with_tools(calculator());

        let outcome = agent
            .run(&[Message::user().with_text("Capital of France?")])
            .await?;

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages.last(), Some(&answer));
        assert_eq!(outcome.final_text(), Some("Paris."));
        assert_eq!(provider.calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_result_is_sent_back() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request("call_1", "add", json!({"a": 2, "b": 3})),
            Message::assistant().with_text("2 + 3 = 5"),
        ]));
        let agent = Agent::new(provider.clone()).with_tools(calculator());

        let outcome = agent.run(&[Message::user().with_text("What is 2 + 3?")]).await?;

        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.messages.len(), 4);
        let tool_message = &outcome.messages[2];
        assert_eq!(tool_message.role, Role::Tool);
        assert_eq!(tool_message.content, "5");
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].last(), Some(tool_message));
        assert_eq!(outcome.final_text(), Some("2 + 3 = 5"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tool_continues() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request("call_1", "weather", json!({"city": "Seoul"})),
            Message::assistant().with_text("I cannot check the weather."),
        ]));
        let agent = Agent::new(provider).with_tools(calculator());

        let outcome = agent.run(&[Message::user().with_text("Weather?")]).await?;

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.messages[2].content, "Error: Tool not found: weather");
        assert_eq!(outcome.final_text(), Some("I cannot check the weather."));
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_tool_continues() -> anyhow::Result<()> {
        let registry = ToolRegistry::new().with(FailingTool {
            tool: Tool::new("backup", "Back up the disk", json!({"type": "object"})),
        })?;
        let provider = Arc::new(MockProvider::new(vec![
            tool_request("call_1", "backup", json!({})),
            Message::assistant().with_text("The backup failed."),
        ]));
        let agent = Agent::new(provider).with_tools(registry);

        let outcome = agent.run(&[Message::user().with_text("Back up")]).await?;

        assert_eq!(
            outcome.messages[2].content,
            "Error: Tool execution failed: disk on fire"
        );
        assert_eq!(outcome.final_text(), Some("The backup failed."));
        Ok(())
    }

    #[tokio::test]
    async fn test_iteration_limit() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::repeating(tool_request(
            "call_loop",
            "add",
            json!({"a": 1, "b": 1}),
        )));
        let agent = Agent::new(provider.clone())
            .with_tools(calculator())
            .with_config(RunConfig {
                max_iterations: 3,
                ..RunConfig::default()
            });

        let outcome = agent.run(&[Message::user().with_text("Loop forever")]).await?;

        assert_eq!(outcome.status, RunStatus::IterationLimit);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(provider.calls().len(), 3);
        // user + 3 * (assistant + tool) + diagnostic
        assert_eq!(outcome.messages.len(), 8);
        assert_eq!(
            outcome.final_text(),
            Some("Stopped after 3 iterations without reaching a final answer.")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_long_tool_output_is_truncated() -> anyhow::Result<()> {
        let registry = ToolRegistry::new().with(VerboseTool {
            tool: Tool::new("dump", "Dump everything", json!({"type": "object"})),
        })?;
        let provider = Arc::new(MockProvider::new(vec![
            tool_request("call_1", "dump", json!({})),
            Message::assistant().with_text("Done."),
        ]));
        let agent = Agent::new(provider).with_tools(registry);

        let outcome = agent.run(&[Message::user().with_text("Dump")]).await?;

        let content = &outcome.messages[2].content;
        assert_eq!(content.chars().count(), 2000 + TRUNCATION_MARKER.len());
        assert!(content.ends_with(TRUNCATION_MARKER));
        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_requests_dispatched_in_order() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant()
                .with_tool_request("a", Ok(ToolCall::new("multiply", json!({"a": 3, "b": 4}))))
                .with_tool_request("b", Err(AgentError::InvalidParameters("bad".to_string())))
                .with_tool_request("c", Ok(ToolCall::new("subtract", json!({"a": 3, "b": 4})))),
            Message::assistant().with_text("Done."),
        ]));
        let agent = Agent::new(provider).with_tools(calculator());

        let outcome = agent.run(&[Message::user().with_text("Go")]).await?;

        let results: Vec<(&str, &str)> = outcome.messages[2..5]
            .iter()
            .map(|m| (m.tool_call_id.as_deref().unwrap(), m.content.as_str()))
            .collect();
        assert_eq!(
            results,
            vec![("a", "12"), ("b", "Error: Invalid parameters: bad"), ("c", "-1")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_system_prompt_inserted_once() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("Hi"),
            Message::assistant().with_text("Hi again"),
        ]));
        let agent = Agent::new(provider.clone()).with_system_prompt("You are terse.");

        agent.run(&[Message::user().with_text("Hello")]).await?;
        agent
            .run(&[
                Message::system().with_text("Custom"),
                Message::user().with_text("Hello"),
            ])
            .await?;

        let calls = provider.calls();
        assert_eq!(calls[0][0].role, Role::System);
        assert_eq!(calls[0][0].content, "You are terse.");
        assert_eq!(calls[1].len(), 2);
        assert_eq!(calls[1][0].content, "Custom");
        Ok(())
    }

    #[tokio::test]
    async fn test_streaming_forwards_fragments() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request("call_1", "add", json!({"a": 2, "b": 3})),
            Message::assistant().with_text("The answer is 5."),
        ]));
        let agent = Agent::new(provider)
            .with_tools(calculator())
            .with_config(RunConfig::default().with_stream(true));

        let events: Vec<AgentEvent> = agent
            .reply(&[Message::user().with_text("2 + 3?")])
            .try_collect()
            .await?;

        let fragments: Vec<&AgentEvent> = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::Fragment(_)))
            .collect();
        assert_eq!(fragments, vec![&AgentEvent::Fragment("The answer is 5.".to_string())]);
        assert!(matches!(
            events.last(),
            Some(AgentEvent::Finished { iterations: 2, status: RunStatus::Completed, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_run_with_collects_fragments_and_outcome() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request("call_1", "add", json!({"a": 2, "b": 3})),
            Message::assistant().with_text("The answer is 5."),
        ]));
        let agent = Agent::new(provider)
            .with_tools(calculator())
            .with_config(RunConfig::default().with_stream(true));

        let mut streamed = String::new();
        let outcome = agent
            .run_with(&[Message::user().with_text("2 + 3?")], |text| {
                streamed.push_str(text)
            })
            .await?;

        assert_eq!(streamed, "The answer is 5.");
        assert_eq!(outcome.final_text(), Some("The answer is 5."));
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.status, RunStatus::Completed);
        // user, assistant with request, tool result, final answer
        assert_eq!(outcome.messages.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_error_is_returned() {
        let provider = Arc::new(MockProvider::with_results(vec![Err(
            ProviderError::Api("quota exceeded".to_string()),
        )]));
        let agent = Agent::new(provider);

        let result = agent.run(&[Message::user().with_text("Hi")]).await;
        assert!(matches!(result, Err(ProviderError::Api(m)) if m == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_blank_final_answer_has_no_text() -> anyhow::Result<()> {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request("call_1", "divide", json!({"a": 1, "b": 0})),
            Message::assistant(),
        ]));
        let agent = Agent::new(provider).with_tools(calculator());

        let outcome = agent.run(&[Message::user().with_text("1/0")]).await?;
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.final_text(), None);
        assert!(outcome.messages[2].content.contains("division by zero"));
        Ok(())
    }
}
