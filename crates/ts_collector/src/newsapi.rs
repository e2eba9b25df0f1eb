use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use ts_core::{Error, Result};

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    articles: Option<Vec<NewsApiArticle>>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsApiArticle {
    pub source: ArticleSource,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    #[serde(rename = "urlToImage")]
    pub url_to_image: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleSource {
    pub id: Option<String>,
    pub name: String,
}

impl NewsApiArticle {
    /// Falls back to `now` when the timestamp is missing or malformed.
    pub fn published_at_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&self.published_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now)
    }
}

pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: NEWSAPI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `everything` search, most relevant first.
    pub async fn everything(&self, query: &str, page_size: usize) -> Result<Vec<NewsApiArticle>> {
        let params = [
            ("q", query.to_string()),
            ("language", "en".to_string()),
            ("sortBy", "relevancy".to_string()),
            ("pageSize", page_size.to_string()),
        ];
        debug!("Querying NewsAPI for {}", query);

        let response = self
            .client
            .get(format!("{}/everything", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(&params)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        let body: NewsApiResponse = serde_json::from_str(&text).map_err(|e| {
            Error::Collection(format!("Unexpected NewsAPI response ({}): {}", status, e))
        })?;

        parse_response(body)
    }
}

fn parse_response(body: NewsApiResponse) -> Result<Vec<NewsApiArticle>> {
    if body.status != "ok" {
        return Err(Error::Collection(format!(
            "NewsAPI error {}: {}",
            body.code.unwrap_or_else(|| "unknown".to_string()),
            body.message.unwrap_or_else(|| "Unknown error".to_string())
        )));
    }
    Ok(body.articles.unwrap_or_default())
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
