use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::base::{Provider, Usage};
use super::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<Message, ProviderError>>>>,
    repeat: Option<Message>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock provider whose scripted turns may also fail
    pub fn with_results(responses: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            repeat: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock provider that answers every call with the same message
    pub fn repeating(message: Message) -> Self {
        Self {
            repeat: Some(message),
            ..Self::new(Vec::new())
        }
    }

    /// The conversations the provider was called with, in call order
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        self.calls.lock().unwrap().push(messages.to_vec());

        let usage = Usage::new(Some(1), Some(1), Some(2));
        if let Some(message) = &self.repeat {
            return Ok((message.clone(), usage));
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((Message::assistant(), usage))
        } else {
            responses.remove(0).map(|message| (message, usage))
        }
    }
}
