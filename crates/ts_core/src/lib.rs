pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{CompletionOptions, ImageResolver, LanguageModel};
pub use storage::{ArticleStorage, BlogStorage, Storage, WorkflowCacheStorage};
pub use types::{
    ArticleQuery, BlogEmbedding, BlogPost, Category, ChatMessage, EmbeddingMatch, NewBlogPost,
    NewsArticle, Role, WorkflowCacheEntry,
};

/// Cosine similarity of two vectors; 0.0 when either is empty, zero or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
