use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use ts_core::types::truncate_chars;
use ts_core::{ArticleQuery, ArticleStorage, Category, Config, NewsArticle, Result};
use ts_inference::MemoryStore;

use crate::category::resolve_category;
use crate::content::ContentScraper;
use crate::newsapi::{NewsApiArticle, NewsApiClient};
use crate::retry::RetryPolicy;

pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const STORED_CONTENT_CHARS: usize = 500;
const MAX_CONCURRENT_SCRAPES: usize = 5;

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn search(&self, query: &str, page_size: usize) -> Result<Vec<NewsApiArticle>>;
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn search(&self, query: &str, page_size: usize) -> Result<Vec<NewsApiArticle>> {
        self.everything(query, page_size).await
    }
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    /// Full article text, empty when the page cannot be read.
    async fn scrape(&self, url: &str) -> String;
}

#[async_trait]
impl PageScraper for ContentScraper {
    async fn scrape(&self, url: &str) -> String {
        ContentScraper::scrape(self, url).await
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub category: Category,
    pub articles: Vec<NewsArticle>,
    pub from_cache: bool,
}

impl Collection {
    fn empty(category: Category) -> Self {
        Self {
            category,
            articles: Vec::new(),
            from_cache: false,
        }
    }
}

/// Pulls articles for a topic from the news source, scrapes and remembers them.
pub struct NewsCollector {
    storage: Arc<dyn ArticleStorage>,
    memory: Arc<MemoryStore>,
    source: Arc<dyn NewsSource>,
    scraper: Arc<dyn PageScraper>,
    retry: RetryPolicy,
    semaphore: Arc<Semaphore>,
}

impl NewsCollector {
    pub fn new(
        storage: Arc<dyn ArticleStorage>,
        memory: Arc<MemoryStore>,
        source: Arc<dyn NewsSource>,
        scraper: Arc<dyn PageScraper>,
    ) -> Self {
        Self {
            storage,
            memory,
            source,
            scraper,
            retry: RetryPolicy::default(),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_SCRAPES)),
        }
    }

    pub fn from_config(
        config: &Config,
        storage: Arc<dyn ArticleStorage>,
        memory: Arc<MemoryStore>,
    ) -> Result<Self> {
        let source = NewsApiClient::new(config.require_news_api_key()?);
        let scraper = ContentScraper::new()?;
        Ok(Self::new(storage, memory, Arc::new(source), Arc::new(scraper)))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn collect(
        &self,
        topic: &str,
        category: Option<&str>,
        max_results: usize,
    ) -> Result<Collection> {
        let category = resolve_category(topic, category);
        info!("📰 Fetching news for topic: {}, category: {}", topic, category);

        let cached = self
            .storage
            .find_articles(&ArticleQuery {
                title_contains: Some(topic.to_string()),
                category: Some(category),
                analyzed: None,
                limit: Some(max_results),
            })
            .await;
        match cached {
            Ok(articles) if !articles.is_empty() => {
                info!("Found {} cached articles", articles.len());
                return Ok(Collection {
                    category,
                    articles,
                    from_cache: true,
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Error checking stored articles: {}", e),
        }

        let fetched = self
            .retry
            .run("Fetching from NewsAPI", || self.source.search(topic, max_results))
            .await;
        let fetched = match fetched {
            Ok(articles) => articles,
            Err(e) => {
                warn!("Max retries reached, giving up: {}", e);
                return Ok(Collection::empty(category));
            }
        };
        if fetched.is_empty() {
            warn!("No articles found for topic: {}", topic);
            return Ok(Collection::empty(category));
        }

        let fresh = self.filter_new(fetched).await;
        let scraped = join_all(
            fresh
                .into_iter()
                .map(|article| self.scrape_and_remember(article, category)),
        )
        .await;

        let mut saved = Vec::new();
        for (article, content) in scraped {
            let record = to_news_article(&article, content, category);
            match self.storage.store_article(&record).await {
                Ok(stored) => {
                    info!("💾 Saved article: {}", stored.title);
                    saved.push(stored);
                }
                Err(e) => warn!("Error saving article {}: {}", article.url, e),
            }
        }

        info!("✅ Saved {} new articles", saved.len());
        Ok(Collection {
            category,
            articles: saved,
            from_cache: false,
        })
    }

    async fn filter_new(&self, articles: Vec<NewsApiArticle>) -> Vec<NewsApiArticle> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for article in articles {
            if article.url.is_empty() || !seen.insert(article.url.clone()) {
                continue;
            }
            match self.storage.article_exists(&article.url).await {
                Ok(false) => fresh.push(article),
                Ok(true) => info!("⏭️ Skipping duplicate article: {}", article.title),
                Err(e) => warn!("Error checking article {}: {}", article.url, e),
            }
        }
        fresh
    }

    async fn scrape_and_remember(
        &self,
        article: NewsApiArticle,
        category: Category,
    ) -> (NewsApiArticle, String) {
        let content = match self.semaphore.acquire().await {
            Ok(_permit) => {
                let content = self.scraper.scrape(&article.url).await;
                self.memory
                    .add_article(
                        &article.url,
                        &content,
                        serde_json::json!({
                            "title": article.title,
                            "description": article.description,
                            "category": category,
                        }),
                    )
                    .await;
                content
            }
            Err(e) => {
                warn!("Scrape queue closed: {}", e);
                String::new()
            }
        };
        (article, content)
    }
}

fn to_news_article(article: &NewsApiArticle, content: String, category: Category) -> NewsArticle {
    let now = Utc::now();
    NewsArticle {
        id: None,
        source: article.source.name.clone(),
        author: article.author.clone(),
        title: article.title.clone(),
        description: article.description.clone(),
        url: article.url.clone(),
        published_at: article.published_at_or(now),
        content: truncate_chars(&content, STORED_CONTENT_CHARS),
        category,
        analyzed: false,
        trend_score: 1.0,
        image_url: None,
        created_at: now,
    }
}
