use async_trait::async_trait;
use crate::types::{Category, ChatMessage};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Run a chat completion and return the assistant's reply
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String>;

    /// Generate embeddings for a piece of text
    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>>;

    /// Single-prompt convenience wrapper around `complete`
    async fn prompt(&self, prompt: &str) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)], &CompletionOptions::default()).await
    }
}

/// Finds a header image for a blog post.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Always yields a URL; implementations fall back to a fixed list.
    async fn resolve(&self, title: &str, category: Category) -> String;
}
