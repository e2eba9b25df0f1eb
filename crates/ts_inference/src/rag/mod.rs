use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use ts_core::types::truncate_chars;
use ts_core::{BlogPost, BlogStorage, ChatMessage, CompletionOptions, Error, LanguageModel, Result};

pub const SIMILARITY_THRESHOLD: f32 = 0.5;
pub const MAX_CONTEXT_POSTS: usize = 5;
pub const MAX_HISTORY_MESSAGES: usize = 5;
pub const CONTEXT_CHARS_PER_POST: usize = 1000;
pub const NO_CONTEXT_REPLY: &str =
    "I couldn't find any relevant information to answer your question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    BlogId,
    Vector,
    Keyword,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedContext {
    Found {
        source: ContextSource,
        posts: Vec<BlogPost>,
    },
    NoContext,
}

impl RetrievedContext {
    pub fn posts(&self) -> &[BlogPost] {
        match self {
            RetrievedContext::Found { posts, .. } => posts,
            RetrievedContext::NoContext => &[],
        }
    }
}

/// Finds blog posts for a query: explicit blog id, then embedding
/// similarity, then keyword match. The first non-empty source wins.
pub struct ContextResolver {
    model: Arc<dyn LanguageModel>,
    storage: Arc<dyn BlogStorage>,
}

impl ContextResolver {
    pub fn new(model: Arc<dyn LanguageModel>, storage: Arc<dyn BlogStorage>) -> Self {
        Self { model, storage }
    }

    pub async fn resolve(&self, query: &str, blog_id: Option<&str>) -> Result<RetrievedContext> {
        if let Some(id) = blog_id {
            let post = self
                .storage
                .get_blog(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Blog post {} not found", id)))?;
            return Ok(RetrievedContext::Found {
                source: ContextSource::BlogId,
                posts: vec![post],
            });
        }

        match self.vector_search(query).await {
            Ok(posts) if !posts.is_empty() => {
                debug!("Vector search found {} posts", posts.len());
                return Ok(RetrievedContext::Found {
                    source: ContextSource::Vector,
                    posts,
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Vector search failed, falling back to keywords: {}", e),
        }

        let posts = self.storage.search_blogs(query, MAX_CONTEXT_POSTS).await?;
        if posts.is_empty() {
            info!("No context found for query");
            return Ok(RetrievedContext::NoContext);
        }
        Ok(RetrievedContext::Found {
            source: ContextSource::Keyword,
            posts,
        })
    }

    async fn vector_search(&self, query: &str) -> Result<Vec<BlogPost>> {
        let embedding = self.model.generate_embeddings(query).await?;
        let matches = self
            .storage
            .match_embeddings(&embedding, SIMILARITY_THRESHOLD, MAX_CONTEXT_POSTS)
            .await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = matches.iter().map(|m| m.blog_id.clone()).collect();
        let mut posts = self.storage.get_blogs(&ids).await?;
        posts.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(posts)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub source: Option<ContextSource>,
    pub blog_ids: Vec<String>,
}

pub struct RagAssistant {
    model: Arc<dyn LanguageModel>,
    resolver: ContextResolver,
}

impl RagAssistant {
    pub fn new(model: Arc<dyn LanguageModel>, storage: Arc<dyn BlogStorage>) -> Self {
        Self {
            resolver: ContextResolver::new(model.clone(), storage),
            model,
        }
    }

    pub async fn answer(
        &self,
        query: &str,
        history: &[ChatMessage],
        blog_id: Option<&str>,
    ) -> Result<RagAnswer> {
        let (source, posts) = match self.resolver.resolve(query, blog_id).await? {
            RetrievedContext::Found { source, posts } => (source, posts),
            RetrievedContext::NoContext => {
                return Ok(RagAnswer {
                    answer: NO_CONTEXT_REPLY.to_string(),
                    source: None,
                    blog_ids: Vec::new(),
                })
            }
        };

        let messages = build_messages(query, history, &posts);
        let answer = match self.model.complete(&messages, &CompletionOptions::default()).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                format!(
                    "I apologize, but I encountered an error while generating a response: {}",
                    e
                )
            }
        };

        Ok(RagAnswer {
            answer,
            source: Some(source),
            blog_ids: posts.into_iter().map(|p| p.id).collect(),
        })
    }
}

fn build_messages(query: &str, history: &[ChatMessage], posts: &[BlogPost]) -> Vec<ChatMessage> {
    let context = posts
        .iter()
        .map(|p| {
            format!(
                "Title: {}\nContent: {}",
                p.title,
                truncate_chars(&p.content, CONTEXT_CHARS_PER_POST)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len().min(MAX_HISTORY_MESSAGES) + 2);
    messages.push(ChatMessage::system(format!(
        "You are a helpful assistant answering questions about our blog posts. \
         Use only the following context. If it does not contain the answer, say so.\n\n{}",
        context
    )));
    let skip = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    messages.extend(history.iter().skip(skip).cloned());
    messages.push(ChatMessage::user(query));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockModel;
    use chrono::Utc;
    use ts_core::{BlogEmbedding, Category, NewBlogPost, Role};
    use ts_storage::MemoryStorage;

    async fn seed(
        storage: &MemoryStorage,
        title: &str,
        content: &str,
        vector: Option<Vec<f32>>,
    ) -> BlogPost {
        let post = storage
            .insert_blog(&NewBlogPost {
                title: title.to_string(),
                content: content.to_string(),
                category: Category::Technology,
                trend_score: 1.0,
                image_url: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        if let Some(embedding) = vector {
            storage
                .store_embedding(&BlogEmbedding {
                    blog_id: post.id.clone(),
                    title: post.title.clone(),
                    content: post.content.clone(),
                    embedding,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        post
    }

    #[tokio::test]
    async fn test_blog_id_wins_and_unknown_id_fails() {
        let storage = Arc::new(MemoryStorage::new());
        let post = seed(&storage, "Rust", "ownership", None).await;
        let resolver = ContextResolver::new(Arc::new(MockModel::new()), storage);

        let context = resolver.resolve("anything", Some(&post.id)).await.unwrap();
        assert_eq!(
            context,
            RetrievedContext::Found {
                source: ContextSource::BlogId,
                posts: vec![post]
            }
        );
        assert!(matches!(
            resolver.resolve("anything", Some("missing")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_vector_match_skips_keyword_search() {
        let storage = Arc::new(MemoryStorage::new());
        let vector_hit = seed(&storage, "Embeddings", "vectors", Some(vec![1.0, 0.0, 0.0])).await;
        seed(&storage, "Keyword", "mentions query", None).await;
        let resolver = ContextResolver::new(Arc::new(MockModel::new()), storage);

        let context = resolver.resolve("query", None).await.unwrap();
        match context {
            RetrievedContext::Found { source, posts } => {
                assert_eq!(source, ContextSource::Vector);
                assert_eq!(posts, vec![vector_hit]);
            }
            RetrievedContext::NoContext => panic!("expected context"),
        }
    }

    #[tokio::test]
    async fn test_weak_similarity_falls_back_to_keywords() {
        let storage = Arc::new(MemoryStorage::new());
        for i in 0..7 {
            let title = format!("Post {}", i);
            seed(&storage, &title, "mentions the query", Some(vec![0.0, 1.0, 0.0])).await;
        }
        let resolver = ContextResolver::new(Arc::new(MockModel::new()), storage);

        match resolver.resolve("query", None).await.unwrap() {
            RetrievedContext::Found { source, posts } => {
                assert_eq!(source, ContextSource::Keyword);
                assert_eq!(posts.len(), MAX_CONTEXT_POSTS);
            }
            RetrievedContext::NoContext => panic!("expected keyword context"),
        }
    }

    #[tokio::test]
    async fn test_vector_matches_are_capped() {
        let storage = Arc::new(MemoryStorage::new());
        for i in 0..7 {
            let title = format!("Post {}", i);
            seed(&storage, &title, "vectors", Some(vec![1.0, 0.0, 0.0])).await;
        }
        let resolver = ContextResolver::new(Arc::new(MockModel::new()), storage);

        match resolver.resolve("query", None).await.unwrap() {
            RetrievedContext::Found { source, posts } => {
                assert_eq!(source, ContextSource::Vector);
                assert_eq!(posts.len(), MAX_CONTEXT_POSTS);
            }
            RetrievedContext::NoContext => panic!("expected vector context"),
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_falls_back_to_keywords() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&storage, "Embeddings", "vectors", Some(vec![1.0, 0.0, 0.0])).await;
        let keyword_hit = seed(&storage, "Keyword", "mentions QUERY here", None).await;
        let resolver =
            ContextResolver::new(Arc::new(MockModel::new().embedding(None)), storage.clone());

        let context = resolver.resolve("query", None).await.unwrap();
        assert_eq!(context.posts(), &[keyword_hit][..]);

        let resolver = ContextResolver::new(Arc::new(MockModel::new().embedding(None)), storage);
        assert_eq!(
            resolver.resolve("nothing matches", None).await.unwrap(),
            RetrievedContext::NoContext
        );
    }

    #[tokio::test]
    async fn test_answer_without_context_apologizes() {
        let model = Arc::new(MockModel::new());
        let assistant = RagAssistant::new(model.clone(), Arc::new(MemoryStorage::new()));

        let answer = assistant.answer("what is new?", &[], None).await.unwrap();
        assert_eq!(answer.answer, NO_CONTEXT_REPLY);
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn test_answer_uses_recent_history_and_truncated_context() {
        let storage = Arc::new(MemoryStorage::new());
        let long_body = format!("query {}", "y".repeat(2000));
        let post = seed(&storage, "Long", &long_body, None).await;
        let model = Arc::new(MockModel::new().reply("Here is the answer.").embedding(None));
        let assistant = RagAssistant::new(model.clone(), storage);

        let history: Vec<ChatMessage> = (0..8)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();
        let answer = assistant.answer("query", &history, None).await.unwrap();
        assert_eq!(answer.answer, "Here is the answer.");
        assert_eq!(answer.source, Some(ContextSource::Keyword));
        assert_eq!(answer.blog_ids, vec![post.id]);

        let request = model.last_request();
        assert_eq!(request.len(), 1 + MAX_HISTORY_MESSAGES + 1);
        assert_eq!(request[0].role, Role::System);
        assert!(!request[0].content.contains(&"y".repeat(CONTEXT_CHARS_PER_POST)));
        assert_eq!(request[1].content, "turn 3");
        assert_eq!(request.last().unwrap().content, "query");
    }

    #[tokio::test]
    async fn test_model_failure_becomes_apology() {
        let storage = Arc::new(MemoryStorage::new());
        seed(&storage, "Rust", "query text", None).await;
        let model = Arc::new(MockModel::new().fail("rate limited").embedding(None));
        let assistant = RagAssistant::new(model, storage);

        let answer = assistant.answer("query", &[], None).await.unwrap();
        assert!(answer.answer.starts_with("I apologize"));
        assert!(answer.answer.contains("rate limited"));
    }
}
