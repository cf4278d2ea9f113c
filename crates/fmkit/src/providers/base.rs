use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use super::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Add another call's usage to this one; unknown counts stay unknown only
    /// while both sides are unknown
    pub fn accumulate(&mut self, other: &Usage) {
        fn add(left: Option<i32>, right: Option<i32>) -> Option<i32> {
            match (left, right) {
                (None, None) => None,
                (l, r) => Some(l.unwrap_or(0) + r.unwrap_or(0)),
            }
        }
        self.input_tokens = add(self.input_tokens, other.input_tokens);
        self.output_tokens = add(self.output_tokens, other.output_tokens);
        self.total_tokens = add(self.total_tokens, other.total_tokens);
    }
}

/// One item of a streamed model response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An incremental piece of the assistant's text
    Fragment(String),
    /// The terminal summary, carrying the complete message including any tool requests
    Done { message: Message, usage: Usage },
}

pub type ProviderStream = BoxStream<'static, Result<StreamEvent, ProviderError>>;

/// Base trait for chat model endpoints
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next assistant message for the conversation
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError>;

    /// Generate the next assistant message as a stream of fragments followed by a
    /// terminal [`StreamEvent::Done`]. Providers without native streaming deliver the
    /// whole text as a single fragment.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream, ProviderError> {
        let (message, usage) = self.complete(messages, tools).await?;
        let mut events = Vec::new();
        if !message.content.is_empty() {
            events.push(Ok(StreamEvent::Fragment(message.content.clone())));
        }
        events.push(Ok(StreamEvent::Done { message, usage }));
        Ok(stream::iter(events).boxed())
    }
}
