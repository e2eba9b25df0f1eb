pub mod blog;
pub mod json;
pub mod memory;
pub mod models;
pub mod rag;
pub mod trends;

#[cfg(test)]
pub(crate) mod test_utils;

pub use blog::{BlogOutcome, BlogWriter};
pub use memory::MemoryStore;
pub use models::{create_model, ModelKind};
pub use rag::{ContextResolver, ContextSource, RagAnswer, RagAssistant, RetrievedContext};
pub use trends::{TrendAnalyzer, TrendReport, TrendScorer};

pub mod prelude {
    pub use super::blog::{BlogOutcome, BlogWriter};
    pub use super::memory::MemoryStore;
    pub use super::models::{create_model, DummyModel, ModelKind, OpenAIModel};
    pub use super::rag::RagAssistant;
    pub use super::trends::{TrendAnalyzer, TrendReport};
    pub use ts_core::{Error, LanguageModel, Result};
}
