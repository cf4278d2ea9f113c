use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace};

use super::base::{Provider, ProviderStream, StreamEvent, Usage};
use super::errors::ProviderError;
use super::stream::{parse_sse_line, SseLine, SseLineBuffer, StreamAccumulator};
use super::utils::{
    check_openai_error, get_usage, messages_to_openai_spec, openai_response_to_message,
    tools_to_openai_spec,
};
use crate::config::Settings;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Connection and sampling parameters for a chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub project_id: Option<String>,
    pub space_id: Option<String>,
    pub timeout: Duration,
}

impl OpenAiCompatibleConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.name.clone(),
            temperature: Some(settings.model.temperature),
            max_tokens: Some(settings.model.max_tokens),
            project_id: settings.project_id.clone(),
            space_id: settings.space_id.clone(),
            timeout: Duration::from_secs(settings.model.timeout_secs),
        }
    }
}

/// Chat model reached over the chat-completions JSON protocol
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_payload(&self, messages: &[Message], tools: &[Tool]) -> Result<Value, ProviderError> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages),
        });

        // Add optional parameters
        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }
        if let Some(project_id) = &self.config.project_id {
            payload["project_id"] = json!(project_id);
        } else if let Some(space_id) = &self.config.space_id {
            payload["space_id"] = json!(space_id);
        }

        Ok(payload)
    }

    async fn post(&self, payload: &Value) -> Result<Response, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                // The body may carry a structured error worth surfacing as such
                if let Some(error) = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|value| value.get("error").cloned())
                {
                    if let ProviderError::ContextLengthExceeded(message) =
                        check_openai_error(&error)
                    {
                        return Err(ProviderError::ContextLengthExceeded(message));
                    }
                }
                Err(ProviderError::Status { status, body })
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let payload = self.build_payload(messages, tools)?;
        trace!(
            "Request: {} messages, {} tools",
            messages.len(),
            tools.len()
        );

        let response: Value = self.post(&payload).await?.json().await?;

        if let Some(error) = response.get("error") {
            return Err(check_openai_error(error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = get_usage(&response);
        debug!(
            tool_requests = message.tool_requests.len(),
            total_tokens = ?usage.total_tokens,
            "model call completed"
        );

        Ok((message, usage))
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream, ProviderError> {
        let mut payload = self.build_payload(messages, tools)?;
        payload["stream"] = json!(true);
        payload["stream_options"] = json!({ "include_usage": true });

        let response = self.post(&payload).await?;
        let mut bytes = response.bytes_stream();

        Ok(Box::pin(try_stream! {
            let mut lines = SseLineBuffer::new();
            let mut accumulator = StreamAccumulator::new();
            let mut finished = false;

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for line in lines.push(&chunk) {
                    match parse_sse_line(&line)? {
                        SseLine::Data(data) => {
                            if let Some(fragment) = accumulator.apply(&data)? {
                                yield StreamEvent::Fragment(fragment);
                            }
                        }
                        SseLine::Done => finished = true,
                        SseLine::Ignored => {}
                    }
                }
                if finished {
                    break;
                }
            }

            if !finished {
                if let Some(line) = lines.finish() {
                    if let SseLine::Data(data) = parse_sse_line(&line)? {
                        if let Some(fragment) = accumulator.apply(&data)? {
                            yield StreamEvent::Fragment(fragment);
                        }
                    }
                }
            }

            let (message, usage) = accumulator.finish();
            debug!(tool_requests = message.tool_requests.len(), "model stream completed");
            yield StreamEvent::Done { message, usage };
        }))
    }
}
