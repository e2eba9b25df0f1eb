use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use ts_core::{
    cosine_similarity, ArticleQuery, ArticleStorage, BlogEmbedding, BlogPost, BlogStorage,
    Category, EmbeddingMatch, Error, NewBlogPost, NewsArticle, Result, WorkflowCacheEntry,
    WorkflowCacheStorage,
};
use uuid::Uuid;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news_articles (
        id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        author TEXT,
        title TEXT NOT NULL,
        description TEXT,
        url TEXT NOT NULL UNIQUE,
        published_at TEXT NOT NULL,
        content TEXT NOT NULL,
        category TEXT NOT NULL,
        analyzed INTEGER NOT NULL DEFAULT 0,
        trend_score REAL NOT NULL DEFAULT 1.0,
        image_url TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blogs (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        category TEXT NOT NULL,
        trend_score REAL NOT NULL,
        image_url TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_embeddings (
        blog_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        embedding TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workflow_cache (
        topic TEXT NOT NULL,
        category TEXT NOT NULL,
        result TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
];

fn db_error(context: &str, e: sqlx::Error) -> Error {
    Error::Database(format!("{}: {}", context, e))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse date {}: {}", raw, e)))
}

fn parse_category(raw: &str) -> Category {
    raw.parse().unwrap_or_default()
}

/// `%needle%` for `LIKE ... ESCAPE '\'`, with wildcards in the needle escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn article_from_row(row: &SqliteRow) -> Result<NewsArticle> {
    Ok(NewsArticle {
        id: Some(row.get("id")),
        source: row.get("source"),
        author: row.get("author"),
        title: row.get("title"),
        description: row.get("description"),
        url: row.get("url"),
        published_at: parse_time(row.get::<&str, _>("published_at"))?,
        content: row.get("content"),
        category: parse_category(row.get::<&str, _>("category")),
        analyzed: row.get::<i64, _>("analyzed") != 0,
        trend_score: row.get("trend_score"),
        image_url: row.get("image_url"),
        created_at: parse_time(row.get::<&str, _>("created_at"))?,
    })
}

fn blog_from_row(row: &SqliteRow) -> Result<BlogPost> {
    Ok(BlogPost {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        category: parse_category(row.get::<&str, _>("category")),
        trend_score: row.get("trend_score"),
        image_url: row.get("image_url"),
        created_at: parse_time(row.get::<&str, _>("created_at"))?,
    })
}

pub struct SQLiteStorage {
    pool: SqlitePool,
}

impl SQLiteStorage {
    pub async fn new() -> Result<Self> {
        Self::new_with_path(Path::new("trendsage.db")).await
    }

    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| db_error("Invalid database path", e))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| db_error(&format!("Failed to run migration {}", i), e))?;
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn store_article(&self, article: &NewsArticle) -> Result<NewsArticle> {
        if self.article_exists(&article.url).await? {
            return Err(Error::Duplicate(format!("Article already stored: {}", article.url)));
        }
        let mut stored = article.clone();
        stored.id = Some(Uuid::new_v4().to_string());

        sqlx::query(
            r#"
            INSERT INTO news_articles
            (id, source, author, title, description, url, published_at, content,
             category, analyzed, trend_score, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stored.id.as_deref())
        .bind(&stored.source)
        .bind(stored.author.as_deref())
        .bind(&stored.title)
        .bind(stored.description.as_deref())
        .bind(&stored.url)
        .bind(stored.published_at.to_rfc3339())
        .bind(&stored.content)
        .bind(stored.category.as_str())
        .bind(stored.analyzed as i64)
        .bind(stored.trend_score)
        .bind(stored.image_url.as_deref())
        .bind(stored.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to store article", e))?;

        Ok(stored)
    }

    async fn article_exists(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM news_articles WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to check article", e))?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    async fn find_articles(&self, query: &ArticleQuery) -> Result<Vec<NewsArticle>> {
        let mut sql = String::from("SELECT * FROM news_articles WHERE 1 = 1");
        if query.title_contains.is_some() {
            sql.push_str(" AND title LIKE ? ESCAPE '\\'");
        }
        if query.category.is_some() {
            sql.push_str(" AND category = ?");
        }
        if query.analyzed.is_some() {
            sql.push_str(" AND analyzed = ?");
        }
        sql.push_str(" ORDER BY created_at DESC");
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql);
        if let Some(title) = &query.title_contains {
            q = q.bind(like_pattern(title));
        }
        if let Some(category) = query.category {
            q = q.bind(category.as_str());
        }
        if let Some(analyzed) = query.analyzed {
            q = q.bind(analyzed as i64);
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as i64);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to query articles", e))?;
        rows.iter().map(article_from_row).collect()
    }

    async fn mark_analyzed(&self, url: &str, trend_score: f64) -> Result<()> {
        let result =
            sqlx::query("UPDATE news_articles SET trend_score = ?, analyzed = 1 WHERE url = ?")
                .bind(trend_score)
                .bind(url)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to update article", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Article not found: {}", url)));
        }
        Ok(())
    }

    async fn top_trending(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<NewsArticle>> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT * FROM news_articles WHERE category = ? \
                     ORDER BY trend_score DESC LIMIT ?",
                )
                .bind(category.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM news_articles ORDER BY trend_score DESC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| db_error("Failed to query trending articles", e))?;
        rows.iter().map(article_from_row).collect()
    }
}

#[async_trait]
impl BlogStorage for SQLiteStorage {
    async fn insert_blog(&self, blog: &NewBlogPost) -> Result<BlogPost> {
        if self.blog_title_exists(&blog.title).await? {
            return Err(Error::Duplicate(format!(
                "Blog post with title '{}' already exists",
                blog.title
            )));
        }
        let post = blog.clone().into_post(Uuid::new_v4().to_string());
        sqlx::query(
            r#"
            INSERT INTO blogs (id, title, content, category, trend_score, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.category.as_str())
        .bind(post.trend_score)
        .bind(post.image_url.as_deref())
        .bind(post.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to store blog post", e))?;
        Ok(post)
    }

    async fn blog_title_exists(&self, title: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM blogs WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to check blog title", e))?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    async fn get_blog(&self, id: &str) -> Result<Option<BlogPost>> {
        let row = sqlx::query("SELECT * FROM blogs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to get blog post", e))?;
        row.as_ref().map(blog_from_row).transpose()
    }

    async fn get_blogs(&self, ids: &[String]) -> Result<Vec<BlogPost>> {
        let mut blogs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(blog) = self.get_blog(id).await? {
                blogs.push(blog);
            }
        }
        Ok(blogs)
    }

    async fn list_blogs(&self, category: Option<Category>) -> Result<Vec<BlogPost>> {
        let rows = match category {
            Some(category) => {
                sqlx::query("SELECT * FROM blogs WHERE category = ? ORDER BY created_at DESC")
                    .bind(category.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM blogs ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| db_error("Failed to list blog posts", e))?;
        rows.iter().map(blog_from_row).collect()
    }

    async fn search_blogs(&self, keyword: &str, limit: usize) -> Result<Vec<BlogPost>> {
        let pattern = like_pattern(keyword);
        let rows = sqlx::query(
            "SELECT * FROM blogs WHERE title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\' LIMIT ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to search blog posts", e))?;
        rows.iter().map(blog_from_row).collect()
    }

    async fn store_embedding(&self, embedding: &BlogEmbedding) -> Result<()> {
        let vector = serde_json::to_string(&embedding.embedding)?;
        sqlx::query(
            "INSERT INTO blog_embeddings (blog_id, title, content, embedding, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&embedding.blog_id)
        .bind(&embedding.title)
        .bind(&embedding.content)
        .bind(vector)
        .bind(embedding.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to store embedding", e))?;
        Ok(())
    }

    async fn match_embeddings(
        &self,
        query: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<EmbeddingMatch>> {
        let rows = sqlx::query("SELECT blog_id, embedding FROM blog_embeddings")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load embeddings", e))?;

        let mut matches = Vec::new();
        for row in rows {
            let vector: Vec<f32> = serde_json::from_str(row.get::<&str, _>("embedding"))?;
            let similarity = cosine_similarity(query, &vector);
            if similarity > threshold {
                matches.push(EmbeddingMatch {
                    blog_id: row.get("blog_id"),
                    similarity,
                });
            }
        }
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(count);
        Ok(matches)
    }
}

#[async_trait]
impl WorkflowCacheStorage for SQLiteStorage {
    async fn get_cached(
        &self,
        topic: &str,
        category: Category,
    ) -> Result<Option<WorkflowCacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM workflow_cache
            WHERE lower(topic) = lower(?) AND category = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(topic)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to read workflow cache", e))?;

        match row {
            Some(row) => Ok(Some(WorkflowCacheEntry {
                topic: row.get("topic"),
                category: parse_category(row.get::<&str, _>("category")),
                result: serde_json::from_str(row.get::<&str, _>("result"))?,
                created_at: parse_time(row.get::<&str, _>("created_at"))?,
            })),
            None => Ok(None),
        }
    }

    async fn put_cached(&self, entry: &WorkflowCacheEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO workflow_cache (topic, category, result, created_at) VALUES (?, ?, ?, ?)",
        )
            .bind(&entry.topic)
            .bind(entry.category.as_str())
            .bind(serde_json::to_string(&entry.result)?)
            .bind(entry.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to write workflow cache", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn article(url: &str, title: &str) -> NewsArticle {
        let now = Utc::now();
        NewsArticle {
            id: None,
            source: "BBC News".to_string(),
            author: Some("Reporter".to_string()),
            title: title.to_string(),
            description: None,
            url: url.to_string(),
            published_at: now,
            content: "Body".to_string(),
            category: Category::Health,
            analyzed: false,
            trend_score: 1.0,
            image_url: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        storage.store_article(&article("http://a", "Vaccine 100% effective")).await.unwrap();
        storage.store_article(&article("http://b", "Hospital funding")).await.unwrap();
        assert!(storage.article_exists("http://a").await.unwrap());
        assert!(matches!(
            storage.store_article(&article("http://a", "again")).await,
            Err(Error::Duplicate(_))
        ));

        let found = storage
            .find_articles(&ArticleQuery {
                title_contains: Some("vaccine".to_string()),
                category: Some(Category::Health),
                analyzed: Some(false),
                limit: Some(5),
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "http://a");

        storage.mark_analyzed("http://b", 1.17).await.unwrap();
        let top = storage.top_trending(None, 1).await.unwrap();
        assert_eq!(top[0].url, "http://b");
        assert!(top[0].analyzed);
    }

    #[tokio::test]
    async fn test_sqlite_blogs_and_cache() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let new_blog = NewBlogPost {
            title: "Health trends".to_string(),
            content: "Wearables everywhere".to_string(),
            category: Category::Health,
            trend_score: 0.9,
            image_url: None,
            created_at: Utc::now(),
        };
        let post = storage.insert_blog(&new_blog).await.unwrap();
        assert!(matches!(storage.insert_blog(&new_blog).await, Err(Error::Duplicate(_))));
        assert_eq!(storage.get_blog(&post.id).await.unwrap().unwrap().title, "Health trends");
        assert_eq!(storage.search_blogs("WEARABLES", 5).await.unwrap().len(), 1);

        storage
            .store_embedding(&BlogEmbedding {
                blog_id: post.id.clone(),
                title: post.title.clone(),
                content: post.content.clone(),
                embedding: vec![0.0, 1.0, 0.0],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let matches = storage.match_embeddings(&[0.0, 1.0, 0.1], 0.5, 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].blog_id, post.id);

        let entry = WorkflowCacheEntry {
            topic: "Wearables".to_string(),
            category: Category::Health,
            result: serde_json::json!({"blog": "Health trends"}),
            created_at: Utc::now(),
        };
        storage.put_cached(&entry).await.unwrap();
        let cached = storage.get_cached("wearables", Category::Health).await.unwrap().unwrap();
        assert_eq!(cached.result, entry.result);
    }
}
