use std::fmt;

use async_trait::async_trait;
use ts_core::{ChatMessage, CompletionOptions, LanguageModel, Result, Role};

pub const EMBEDDING_SIZE: usize = 768;

/// Offline model: echoes the start of the last user message and derives
/// embeddings from character frequencies.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        // First 20 words
        let words: Vec<&str> = last.split_whitespace().take(20).collect();
        Ok(words.join(" "))
    }

    async fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0; EMBEDDING_SIZE];
        let text_len = text.chars().count() as f32;
        if text_len == 0.0 {
            return Ok(embedding);
        }

        embedding[0] = text_len / 1000.0;
        for c in text.to_lowercase().chars() {
            let slot = 1 + (c as usize) % (EMBEDDING_SIZE - 1);
            embedding[slot] += 1.0 / text_len;
        }
        Ok(embedding)
    }
}
