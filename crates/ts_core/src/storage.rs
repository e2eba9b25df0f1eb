use async_trait::async_trait;
use std::sync::Arc;
use crate::types::{
    ArticleQuery, BlogEmbedding, BlogPost, Category, EmbeddingMatch, NewBlogPost, NewsArticle,
    WorkflowCacheEntry,
};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Store a new article and return it with its storage id
    async fn store_article(&self, article: &NewsArticle) -> Result<NewsArticle>;

    /// Returns true if an article with this URL is already stored
    async fn article_exists(&self, url: &str) -> Result<bool>;

    /// Articles matching the query, newest `created_at` first
    async fn find_articles(&self, query: &ArticleQuery) -> Result<Vec<NewsArticle>>;

    /// Record a trend score and flag the article as analyzed
    async fn mark_analyzed(&self, url: &str, trend_score: f64) -> Result<()>;

    /// Articles ordered by trend score, highest first
    async fn top_trending(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>>;
}

#[async_trait]
pub trait BlogStorage: Send + Sync {
    /// Insert a blog post. Fails with `Error::Duplicate` if the title exists.
    async fn insert_blog(&self, blog: &NewBlogPost) -> Result<BlogPost>;

    async fn blog_title_exists(&self, title: &str) -> Result<bool>;

    async fn get_blog(&self, id: &str) -> Result<Option<BlogPost>>;

    async fn get_blogs(&self, ids: &[String]) -> Result<Vec<BlogPost>>;

    async fn list_blogs(&self, category: Option<Category>) -> Result<Vec<BlogPost>>;

    /// Case-insensitive substring search over title and content
    async fn search_blogs(&self, keyword: &str, limit: usize) -> Result<Vec<BlogPost>>;

    async fn store_embedding(&self, embedding: &BlogEmbedding) -> Result<()>;

    /// Stored embeddings with similarity above `threshold`, best first
    async fn match_embeddings(
        &self,
        query: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<EmbeddingMatch>>;
}

#[async_trait]
pub trait WorkflowCacheStorage: Send + Sync {
    async fn get_cached(
        &self,
        topic: &str,
        category: Category,
    ) -> Result<Option<WorkflowCacheEntry>>;

    async fn put_cached(&self, entry: &WorkflowCacheEntry) -> Result<()>;
}

/// Every table the pipeline touches, behind one handle.
pub trait Storage: ArticleStorage + BlogStorage + WorkflowCacheStorage {}

impl<T: ArticleStorage + BlogStorage + WorkflowCacheStorage> Storage for T {}

// Forwarding impls so one shared `Arc<dyn Storage>` can be handed out as any
// of the narrower handles.

#[async_trait]
impl<T: ArticleStorage + ?Sized> ArticleStorage for Arc<T> {
    async fn store_article(&self, article: &NewsArticle) -> Result<NewsArticle> {
        (**self).store_article(article).await
    }

    async fn article_exists(&self, url: &str) -> Result<bool> {
        (**self).article_exists(url).await
    }

    async fn find_articles(&self, query: &ArticleQuery) -> Result<Vec<NewsArticle>> {
        (**self).find_articles(query).await
    }

    async fn mark_analyzed(&self, url: &str, trend_score: f64) -> Result<()> {
        (**self).mark_analyzed(url, trend_score).await
    }

    async fn top_trending(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>> {
        (**self).top_trending(category, limit).await
    }
}

#[async_trait]
impl<T: BlogStorage + ?Sized> BlogStorage for Arc<T> {
    async fn insert_blog(&self, blog: &NewBlogPost) -> Result<BlogPost> {
        (**self).insert_blog(blog).await
    }

    async fn blog_title_exists(&self, title: &str) -> Result<bool> {
        (**self).blog_title_exists(title).await
    }

    async fn get_blog(&self, id: &str) -> Result<Option<BlogPost>> {
        (**self).get_blog(id).await
    }

    async fn get_blogs(&self, ids: &[String]) -> Result<Vec<BlogPost>> {
        (**self).get_blogs(ids).await
    }

    async fn list_blogs(&self, category: Option<Category>) -> Result<Vec<BlogPost>> {
        (**self).list_blogs(category).await
    }

    async fn search_blogs(&self, keyword: &str, limit: usize) -> Result<Vec<BlogPost>> {
        (**self).search_blogs(keyword, limit).await
    }

    async fn store_embedding(&self, embedding: &BlogEmbedding) -> Result<()> {
        (**self).store_embedding(embedding).await
    }

    async fn match_embeddings(
        &self,
        query: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        (**self).match_embeddings(query, threshold, count).await
    }
}

#[async_trait]
impl<T: WorkflowCacheStorage + ?Sized> WorkflowCacheStorage for Arc<T> {
    async fn get_cached(
        &self,
        topic: &str,
        category: Category,
    ) -> Result<Option<WorkflowCacheEntry>> {
        (**self).get_cached(topic, category).await
    }

    async fn put_cached(&self, entry: &WorkflowCacheEntry) -> Result<()> {
        (**self).put_cached(entry).await
    }
}
