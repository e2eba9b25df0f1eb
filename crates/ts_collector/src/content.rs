use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use ts_core::{Error, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches article pages and pulls out their paragraph text.
#[derive(Clone)]
pub struct ContentScraper {
    client: Client,
}

impl ContentScraper {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent("Mozilla/5.0 (compatible; trendsage/0.1)")
            .build()?;
        Ok(Self { client })
    }

    /// Empty string when the page cannot be fetched.
    pub async fn scrape(&self, url: &str) -> String {
        match self.fetch(url).await {
            Ok(html) => extract_article_text(&html),
            Err(e) => {
                warn!("Error scraping content from {}: {}", url, e);
                String::new()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Collection(format!("{} returned {}", url, status)));
        }
        Ok(response.text().await?)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Text of an element, skipping anything inside `<script>` or `<style>`.
fn visible_text(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text: &str = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map_or(false, |e| matches!(e.name(), "script" | "style"))
            });
            (!hidden).then(|| text.to_string())
        })
        .collect::<String>()
}

/// Paragraphs from `<article>`, else `<main>`, else `<body>`, else the whole page.
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let (Some(paragraphs), Some(containers)) = (
        selector("p"),
        ["article", "main", "body"]
            .iter()
            .map(|css| selector(css))
            .collect::<Option<Vec<_>>>(),
    ) else {
        return String::new();
    };

    let root = containers
        .iter()
        .find_map(|s| document.select(s).next())
        .unwrap_or_else(|| document.root_element());

    root.select(&paragraphs)
        .map(visible_text)
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
