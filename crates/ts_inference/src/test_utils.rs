use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use ts_core::{ChatMessage, CompletionOptions, Error, LanguageModel, Result};

/// Scripted model: replies are popped in order, every request is recorded.
pub struct MockModel {
    replies: Mutex<VecDeque<Result<String>>>,
    embedding: Option<Vec<f32>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            embedding: Some(vec![1.0, 0.0, 0.0]),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::Inference(message.to_string())));
        self
    }

    pub fn embedding(mut self, embedding: Option<Vec<f32>>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }

    async fn generate_embeddings(&self, _text: &str) -> Result<Vec<f32>> {
        self.embedding
            .clone()
            .ok_or_else(|| Error::Inference("embedding service down".to_string()))
    }
}
