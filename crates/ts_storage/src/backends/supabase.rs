use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, info};
use ts_core::{
    ArticleQuery, ArticleStorage, BlogEmbedding, BlogPost, BlogStorage, Category, EmbeddingMatch,
    Error, NewBlogPost, NewsArticle, Result, WorkflowCacheEntry, WorkflowCacheStorage,
};
use url::Url;

const ARTICLES_TABLE: &str = "news_articles";
const BLOGS_TABLE: &str = "blogs";
const EMBEDDINGS_TABLE: &str = "blog_embeddings";
const CACHE_TABLE: &str = "workflow_cache";
const MATCH_EMBEDDINGS_RPC: &str = "match_blog_embeddings";

/// Supabase tables accessed through the PostgREST interface.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    rest_url: String,
    api_key: String,
}

impl fmt::Debug for SupabaseStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStorage")
            .field("rest_url", &self.rest_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl SupabaseStorage {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Url::parse(base_url).map_err(|e| Error::Config(format!("Invalid SUPABASE_URL: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn check(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 409 {
            return Err(Error::Duplicate(format!("{}: {}", what, body)));
        }
        Err(Error::Database(format!("{} failed ({}): {}", what, status, body)))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        debug!("Selecting from {} with {:?}", table, params);
        let response = self.request(Method::GET, table).query(params).send().await?;
        let response = Self::check(response, &format!("select from {}", table)).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(&self, table: &str, body: &B) -> Result<T> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let response = Self::check(response, &format!("insert into {}", table)).await?;
        let mut rows = response.json::<Vec<T>>().await?;
        if rows.is_empty() {
            return Err(Error::Database(format!("insert into {} returned no rows", table)));
        }
        Ok(rows.remove(0))
    }
}

/// PostgREST filters use `*` as the `ILIKE` wildcard. Reserved characters are dropped.
fn ilike_pattern(needle: &str) -> String {
    let cleaned: String = needle
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%'))
        .collect();
    format!("*{}*", cleaned.trim())
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Legacy rows carry capitalised or free-form categories.
fn parse_category(raw: Option<&str>) -> Category {
    raw.and_then(|c| c.parse().ok()).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ArticleRow {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    author: Option<String>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    url: String,
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    analyzed: Option<bool>,
    #[serde(default)]
    trend_score: Option<f64>,
    #[serde(default)]
    image_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl From<ArticleRow> for NewsArticle {
    fn from(row: ArticleRow) -> Self {
        let created_at = row.created_at.unwrap_or_else(Utc::now);
        NewsArticle {
            id: row.id.as_ref().and_then(id_from_value),
            source: row.source.unwrap_or_default(),
            author: row.author,
            title: row.title,
            description: row.description,
            url: row.url,
            published_at: row.published_at.unwrap_or(created_at),
            content: row.content.unwrap_or_default(),
            category: parse_category(row.category.as_deref()),
            analyzed: row.analyzed.unwrap_or(false),
            trend_score: row.trend_score.unwrap_or(1.0),
            image_url: row.image_url,
            created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlogRow {
    id: Value,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    trend_score: Option<f64>,
    #[serde(default)]
    image_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<BlogRow> for BlogPost {
    type Error = Error;

    fn try_from(row: BlogRow) -> Result<Self> {
        let id = id_from_value(&row.id)
            .ok_or_else(|| Error::Database(format!("blog row has an unusable id: {}", row.id)))?;
        Ok(BlogPost {
            id,
            title: row.title,
            content: row.content.unwrap_or_default(),
            category: parse_category(row.category.as_deref()),
            trend_score: row.trend_score.unwrap_or(1.0),
            image_url: row.image_url,
            created_at: row.created_at.unwrap_or_else(Utc::now),
        })
    }
}

fn blogs_from_rows(rows: Vec<BlogRow>) -> Result<Vec<BlogPost>> {
    rows.into_iter().map(BlogPost::try_from).collect()
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    blog_id: Value,
    similarity: f32,
}

#[derive(Debug, Deserialize)]
struct CacheRow {
    topic: String,
    #[serde(default)]
    category: Option<String>,
    result: Value,
    created_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl ArticleStorage for SupabaseStorage {
    async fn store_article(&self, article: &NewsArticle) -> Result<NewsArticle> {
        let mut body = serde_json::to_value(article)?;
        if let Some(obj) = body.as_object_mut() {
            obj.remove("id");
        }
        let row: ArticleRow = self.insert(ARTICLES_TABLE, &body).await?;
        info!("Saved article: {}", row.title);
        Ok(row.into())
    }

    async fn article_exists(&self, url: &str) -> Result<bool> {
        let rows: Vec<Value> = self
            .select(
                ARTICLES_TABLE,
                &[("select", "id".to_string()), ("url", format!("eq.{}", url))],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn find_articles(&self, query: &ArticleQuery) -> Result<Vec<NewsArticle>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(title) = &query.title_contains {
            params.push(("title", format!("ilike.{}", ilike_pattern(title))));
        }
        if let Some(category) = query.category {
            params.push(("category", format!("eq.{}", category)));
        }
        if let Some(analyzed) = query.analyzed {
            params.push(("analyzed", format!("eq.{}", analyzed)));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        let rows: Vec<ArticleRow> = self.select(ARTICLES_TABLE, &params).await?;
        Ok(rows.into_iter().map(NewsArticle::from).collect())
    }

    async fn mark_analyzed(&self, url: &str, trend_score: f64) -> Result<()> {
        let response = self
            .request(Method::PATCH, ARTICLES_TABLE)
            .query(&[("url", format!("eq.{}", url))])
            .json(&json!({ "trend_score": trend_score, "analyzed": true }))
            .send()
            .await?;
        Self::check(response, "update news_articles").await?;
        Ok(())
    }

    async fn top_trending(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("order", "trend_score.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(category) = category {
            params.push(("category", format!("eq.{}", category)));
        }
        let rows: Vec<ArticleRow> = self.select(ARTICLES_TABLE, &params).await?;
        Ok(rows.into_iter().map(NewsArticle::from).collect())
    }
}

#[async_trait]
impl BlogStorage for SupabaseStorage {
    async fn insert_blog(&self, blog: &NewBlogPost) -> Result<BlogPost> {
        if self.blog_title_exists(&blog.title).await? {
            return Err(Error::Duplicate(format!(
                "Blog post with title '{}' already exists",
                blog.title
            )));
        }
        let row: BlogRow = self.insert(BLOGS_TABLE, blog).await?;
        let post = BlogPost::try_from(row)?;
        info!("Blog post saved successfully with ID: {}", post.id);
        Ok(post)
    }

    async fn blog_title_exists(&self, title: &str) -> Result<bool> {
        let rows: Vec<Value> = self
            .select(
                BLOGS_TABLE,
                &[("select", "id".to_string()), ("title", format!("eq.{}", title))],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn get_blog(&self, id: &str) -> Result<Option<BlogPost>> {
        let rows: Vec<BlogRow> = self
            .select(
                BLOGS_TABLE,
                &[("select", "*".to_string()), ("id", format!("eq.{}", id))],
            )
            .await?;
        Ok(blogs_from_rows(rows)?.into_iter().next())
    }

    async fn get_blogs(&self, ids: &[String]) -> Result<Vec<BlogPost>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<BlogRow> = self
            .select(
                BLOGS_TABLE,
                &[("select", "*".to_string()), ("id", format!("in.({})", ids.join(",")))],
            )
            .await?;
        blogs_from_rows(rows)
    }

    async fn list_blogs(&self, category: Option<Category>) -> Result<Vec<BlogPost>> {
        let mut params = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if let Some(category) = category {
            params.push(("category", format!("eq.{}", category)));
        }
        let rows: Vec<BlogRow> = self.select(BLOGS_TABLE, &params).await?;
        blogs_from_rows(rows)
    }

    async fn search_blogs(&self, keyword: &str, limit: usize) -> Result<Vec<BlogPost>> {
        let pattern = ilike_pattern(keyword);
        let rows: Vec<BlogRow> = self
            .select(
                BLOGS_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("or", format!("(title.ilike.{0},content.ilike.{0})", pattern)),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        blogs_from_rows(rows)
    }

    async fn store_embedding(&self, embedding: &BlogEmbedding) -> Result<()> {
        let _: Value = self.insert(EMBEDDINGS_TABLE, embedding).await?;
        info!("Created embedding for blog ID: {}", embedding.blog_id);
        Ok(())
    }

    async fn match_embeddings(
        &self,
        query: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        let response = self
            .request(Method::POST, &format!("rpc/{}", MATCH_EMBEDDINGS_RPC))
            .json(&json!({
                "query_embedding": query,
                "match_threshold": threshold,
                "match_count": count,
            }))
            .send()
            .await?;
        let response = Self::check(response, MATCH_EMBEDDINGS_RPC).await?;
        let rows = response.json::<Vec<MatchRow>>().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                id_from_value(&row.blog_id).map(|blog_id| EmbeddingMatch {
                    blog_id,
                    similarity: row.similarity,
                })
            })
            .collect())
    }
}

#[async_trait]
impl WorkflowCacheStorage for SupabaseStorage {
    async fn get_cached(
        &self,
        topic: &str,
        category: Category,
    ) -> Result<Option<WorkflowCacheEntry>> {
        let rows: Vec<CacheRow> = self
            .select(
                CACHE_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("topic", format!("ilike.{}", topic)),
                    ("category", format!("eq.{}", category)),
                    ("order", "created_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(|row| WorkflowCacheEntry {
            topic: row.topic,
            category: parse_category(row.category.as_deref()),
            result: row.result,
            created_at: row.created_at.unwrap_or_else(Utc::now),
        }))
    }

    async fn put_cached(&self, entry: &WorkflowCacheEntry) -> Result<()> {
        let response = self
            .request(Method::POST, CACHE_TABLE)
            .json(entry)
            .send()
            .await?;
        Self::check(response, "insert into workflow_cache").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_url() {
        assert!(SupabaseStorage::new("not a url", "key").is_err());
        let storage = SupabaseStorage::new("https://project.supabase.co/", "key").unwrap();
        assert_eq!(storage.rest_url, "https://project.supabase.co/rest/v1");
        assert!(format!("{:?}", storage).contains("<redacted>"));
    }

    #[test]
    fn test_ilike_pattern_strips_reserved_characters() {
        assert_eq!(ilike_pattern("AI"), "*AI*");
        assert_eq!(ilike_pattern(" chips (2024), *new* "), "*chips 2024 new*");
    }

    #[test]
    fn test_article_row_conversion() {
        let row: ArticleRow = serde_json::from_value(json!({
            "id": 17,
            "source": "Reuters",
            "title": "Chips",
            "url": "https://example.com/chips",
            "published_at": "2024-03-01T10:00:00+00:00",
            "category": "Technology",
            "analyzed": true,
            "trend_score": 0.8,
            "created_at": "2024-03-01T11:00:00+00:00"
        }))
        .unwrap();
        let article = NewsArticle::from(row);
        assert_eq!(article.id.as_deref(), Some("17"));
        assert_eq!(article.category, Category::Technology);
        assert!(article.analyzed);
        assert_eq!(article.trend_score, 0.8);
        assert_eq!(article.content, "");
    }

    #[test]
    fn test_blog_row_conversion() {
        let row: BlogRow = serde_json::from_value(json!({
            "id": "c0ffee",
            "title": "Trends",
            "content": "body",
            "category": "unknown-category",
            "created_at": "2024-03-01T11:00:00Z"
        }))
        .unwrap();
        let post = BlogPost::try_from(row).unwrap();
        assert_eq!(post.id, "c0ffee");
        assert_eq!(post.category, Category::Miscellaneous);
        assert_eq!(post.trend_score, 1.0);

        let row: BlogRow = serde_json::from_value(json!({ "id": null, "title": "x" })).unwrap();
        assert!(BlogPost::try_from(row).is_err());
    }
}
