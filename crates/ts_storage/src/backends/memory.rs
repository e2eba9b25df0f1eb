use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use ts_core::types::contains_ignore_case;
use ts_core::{
    cosine_similarity, ArticleQuery, ArticleStorage, BlogEmbedding, BlogPost, BlogStorage,
    Category, EmbeddingMatch, Error, NewBlogPost, NewsArticle, Result, WorkflowCacheEntry,
    WorkflowCacheStorage,
};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<NewsArticle>,
    blogs: Vec<BlogPost>,
    embeddings: Vec<BlogEmbedding>,
    cache: Vec<WorkflowCacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn store_article(&mut self, article: &NewsArticle) -> Result<NewsArticle> {
        if self.articles.iter().any(|a| a.url == article.url) {
            return Err(Error::Duplicate(format!("Article already stored: {}", article.url)));
        }
        let mut stored = article.clone();
        stored.id = Some(Uuid::new_v4().to_string());
        self.articles.push(stored.clone());
        Ok(stored)
    }

    fn find_articles(&self, query: &ArticleQuery) -> Vec<NewsArticle> {
        let mut articles: Vec<NewsArticle> = self
            .articles
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            articles.truncate(limit);
        }
        articles
    }

    fn mark_analyzed(&mut self, url: &str, trend_score: f64) -> Result<()> {
        let article = self
            .articles
            .iter_mut()
            .find(|a| a.url == url)
            .ok_or_else(|| Error::NotFound(format!("Article not found: {}", url)))?;
        article.trend_score = trend_score;
        article.analyzed = true;
        Ok(())
    }

    fn top_trending(&self, category: Option<Category>, limit: usize) -> Vec<NewsArticle> {
        let mut articles: Vec<NewsArticle> = self
            .articles
            .iter()
            .filter(|a| category.map_or(true, |c| a.category == c))
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.trend_score.total_cmp(&a.trend_score));
        articles.truncate(limit);
        articles
    }

    fn insert_blog(&mut self, blog: &NewBlogPost) -> Result<BlogPost> {
        if self.blogs.iter().any(|b| b.title == blog.title) {
            return Err(Error::Duplicate(format!(
                "Blog post with title '{}' already exists",
                blog.title
            )));
        }
        let post = blog.clone().into_post(Uuid::new_v4().to_string());
        self.blogs.push(post.clone());
        Ok(post)
    }

    fn search_blogs(&self, keyword: &str, limit: usize) -> Vec<BlogPost> {
        self.blogs
            .iter()
            .filter(|b| {
                contains_ignore_case(&b.title, keyword) || contains_ignore_case(&b.content, keyword)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    fn match_embeddings(&self, query: &[f32], threshold: f32, count: usize) -> Vec<EmbeddingMatch> {
        let mut matches: Vec<EmbeddingMatch> = self
            .embeddings
            .iter()
            .map(|e| EmbeddingMatch {
                blog_id: e.blog_id.clone(),
                similarity: cosine_similarity(query, &e.embedding),
            })
            .filter(|m| m.similarity > threshold)
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(count);
        matches
    }
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn store_article(&self, article: &NewsArticle) -> Result<NewsArticle> {
        self.store.write().await.store_article(article)
    }

    async fn article_exists(&self, url: &str) -> Result<bool> {
        Ok(self.store.read().await.articles.iter().any(|a| a.url == url))
    }

    async fn find_articles(&self, query: &ArticleQuery) -> Result<Vec<NewsArticle>> {
        Ok(self.store.read().await.find_articles(query))
    }

    async fn mark_analyzed(&self, url: &str, trend_score: f64) -> Result<()> {
        self.store.write().await.mark_analyzed(url, trend_score)
    }

    async fn top_trending(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>> {
        Ok(self.store.read().await.top_trending(category, limit))
    }
}

#[async_trait]
impl BlogStorage for MemoryStorage {
    async fn insert_blog(&self, blog: &NewBlogPost) -> Result<BlogPost> {
        self.store.write().await.insert_blog(blog)
    }

    async fn blog_title_exists(&self, title: &str) -> Result<bool> {
        Ok(self.store.read().await.blogs.iter().any(|b| b.title == title))
    }

    async fn get_blog(&self, id: &str) -> Result<Option<BlogPost>> {
        Ok(self.store.read().await.blogs.iter().find(|b| b.id == id).cloned())
    }

    async fn get_blogs(&self, ids: &[String]) -> Result<Vec<BlogPost>> {
        let store = self.store.read().await;
        Ok(store
            .blogs
            .iter()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn list_blogs(&self, category: Option<Category>) -> Result<Vec<BlogPost>> {
        let store = self.store.read().await;
        let mut blogs: Vec<BlogPost> = store
            .blogs
            .iter()
            .filter(|b| category.map_or(true, |c| b.category == c))
            .cloned()
            .collect();
        blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(blogs)
    }

    async fn search_blogs(&self, keyword: &str, limit: usize) -> Result<Vec<BlogPost>> {
        Ok(self.store.read().await.search_blogs(keyword, limit))
    }

    async fn store_embedding(&self, embedding: &BlogEmbedding) -> Result<()> {
        self.store.write().await.embeddings.push(embedding.clone());
        Ok(())
    }

    async fn match_embeddings(
        &self,
        query: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        Ok(self.store.read().await.match_embeddings(query, threshold, count))
    }
}

#[async_trait]
impl WorkflowCacheStorage for MemoryStorage {
    async fn get_cached(
        &self,
        topic: &str,
        category: Category,
    ) -> Result<Option<WorkflowCacheEntry>> {
        let store = self.store.read().await;
        Ok(store
            .cache
            .iter()
            .filter(|e| e.topic.eq_ignore_ascii_case(topic) && e.category == category)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn put_cached(&self, entry: &WorkflowCacheEntry) -> Result<()> {
        self.store.write().await.cache.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn article(url: &str, title: &str, score: f64) -> NewsArticle {
        let now = Utc::now();
        NewsArticle {
            id: None,
            source: "test".to_string(),
            author: None,
            title: title.to_string(),
            description: None,
            url: url.to_string(),
            published_at: now,
            content: "content".to_string(),
            category: Category::Technology,
            analyzed: false,
            trend_score: score,
            image_url: None,
            created_at: now,
        }
    }

    fn blog(title: &str, content: &str) -> NewBlogPost {
        NewBlogPost {
            title: title.to_string(),
            content: content.to_string(),
            category: Category::Technology,
            trend_score: 1.0,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_article_roundtrip_and_analysis() {
        let storage = MemoryStorage::new();
        let stored = storage.store_article(&article("http://a", "AI chips", 1.0)).await.unwrap();
        assert!(stored.id.is_some());
        assert!(storage.article_exists("http://a").await.unwrap());
        assert!(storage.store_article(&article("http://a", "AI chips", 1.0)).await.is_err());

        storage.mark_analyzed("http://a", 0.42).await.unwrap();
        let analyzed = storage
            .find_articles(&ArticleQuery {
                analyzed: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(analyzed.len(), 1);
        assert_eq!(analyzed[0].trend_score, 0.42);

        assert!(matches!(
            storage.mark_analyzed("http://missing", 1.0).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_top_trending_orders_by_score() {
        let storage = MemoryStorage::new();
        storage.store_article(&article("http://a", "a", 0.3)).await.unwrap();
        storage.store_article(&article("http://b", "b", 1.1)).await.unwrap();
        storage.store_article(&article("http://c", "c", 0.7)).await.unwrap();

        let top = storage.top_trending(Some(Category::Technology), 2).await.unwrap();
        let urls: Vec<&str> = top.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["http://b", "http://c"]);
        assert!(storage.top_trending(Some(Category::Sports), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_blog_title_rejected() {
        let storage = MemoryStorage::new();
        storage.insert_blog(&blog("Same", "one")).await.unwrap();
        let result = storage.insert_blog(&blog("Same", "two")).await;
        assert!(matches!(result, Err(Error::Duplicate(_))));
        assert_eq!(storage.list_blogs(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keyword_search_and_embeddings() {
        let storage = MemoryStorage::new();
        let rust = storage.insert_blog(&blog("Rust in production", "memory safety")).await.unwrap();
        let golf = storage
            .insert_blog(&blog("Golf season", "birdies and RUST-coloured greens"))
            .await
            .unwrap();
        storage.insert_blog(&blog("Cooking", "pasta")).await.unwrap();

        let hits = storage.search_blogs("rust", 5).await.unwrap();
        assert_eq!(hits.len(), 2);

        for (post, vector) in [(&rust, vec![1.0, 0.0]), (&golf, vec![0.0, 1.0])] {
            storage
                .store_embedding(&BlogEmbedding {
                    blog_id: post.id.clone(),
                    title: post.title.clone(),
                    content: post.content.clone(),
                    embedding: vector,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let matches = storage.match_embeddings(&[0.9, 0.1], 0.5, 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].blog_id, rust.id);
    }

    #[tokio::test]
    async fn test_workflow_cache_latest_entry_wins() {
        let storage = MemoryStorage::new();
        let older = WorkflowCacheEntry {
            topic: "AI".to_string(),
            category: Category::Technology,
            result: serde_json::json!({"run": 1}),
            created_at: Utc::now() - Duration::hours(1),
        };
        let newer = WorkflowCacheEntry {
            result: serde_json::json!({"run": 2}),
            created_at: Utc::now(),
            ..older.clone()
        };
        storage.put_cached(&older).await.unwrap();
        storage.put_cached(&newer).await.unwrap();

        let hit = storage.get_cached("ai", Category::Technology).await.unwrap().unwrap();
        assert_eq!(hit.result["run"], 2);
        assert!(storage.get_cached("AI", Category::Health).await.unwrap().is_none());
    }
}
