use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use ts_core::types::truncate_chars;
use ts_core::{LanguageModel, Result};

pub const SUMMARY_MAX_CHARS: usize = 200;
pub const MAX_KEY_POINTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub content: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub metadata: serde_json::Value,
    pub added_at: DateTime<Utc>,
}

/// Per-URL summaries and key points, kept for a bounded time.
pub struct MemoryStore {
    model: Arc<dyn LanguageModel>,
    retention: Duration,
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new(model: Arc<dyn LanguageModel>, retention: Duration) -> Self {
        Self {
            model,
            retention,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `false` when the URL was already known.
    pub async fn add_article(&self, url: &str, content: &str, metadata: serde_json::Value) -> bool {
        if self.entries.read().await.contains_key(url) {
            debug!("Article already in memory: {}", url);
            return false;
        }

        let summary = match self.summarize(content).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Failed to summarize {}: {}", url, e);
                String::new()
            }
        };
        let key_points = match self.extract_key_points(content).await {
            Ok(points) => points,
            Err(e) => {
                warn!("Failed to extract key points from {}: {}", url, e);
                Vec::new()
            }
        };

        let mut entries = self.entries.write().await;
        if entries.contains_key(url) {
            return false;
        }
        entries.insert(
            url.to_string(),
            MemoryEntry {
                content: content.to_string(),
                summary,
                key_points,
                metadata,
                added_at: Utc::now(),
            },
        );
        true
    }

    async fn summarize(&self, content: &str) -> Result<String> {
        let prompt = format!(
            "Summarize the following article in 2-3 sentences:\n\n{}",
            content
        );
        let summary = self.model.prompt(&prompt).await?;
        Ok(truncate_chars(summary.trim(), SUMMARY_MAX_CHARS))
    }

    async fn extract_key_points(&self, content: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Extract up to {} key points from the following article. \
             Write one key point per line.\n\n{}",
            MAX_KEY_POINTS, content
        );
        let response = self.model.prompt(&prompt).await?;
        Ok(parse_key_points(&response))
    }

    pub async fn summary(&self, url: &str) -> Option<String> {
        self.entries.read().await.get(url).map(|e| e.summary.clone())
    }

    pub async fn key_points(&self, url: &str) -> Vec<String> {
        self.entries
            .read()
            .await
            .get(url)
            .map(|e| e.key_points.clone())
            .unwrap_or_default()
    }

    pub async fn all_summaries(&self) -> HashMap<String, String> {
        self.purge_expired(Utc::now()).await;
        self.entries
            .read()
            .await
            .iter()
            .map(|(url, e)| (url.clone(), e.summary.clone()))
            .collect()
    }

    pub async fn all_key_points(&self) -> HashMap<String, Vec<String>> {
        self.purge_expired(Utc::now()).await;
        self.entries
            .read()
            .await
            .iter()
            .map(|(url, e)| (url.clone(), e.key_points.clone()))
            .collect()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| match now.signed_duration_since(e.added_at).to_std() {
            Ok(age) => age <= self.retention,
            Err(_) => true,
        });
        let purged = before - entries.len();
        if purged > 0 {
            debug!("Purged {} expired memory entries", purged);
        }
    }
}

/// One point per non-empty line, list markers stripped, at most five.
pub fn parse_key_points(response: &str) -> Vec<String> {
    response
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.trim_start_matches(|c: char| c == '-' || c == '*' || c == '•');
            let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
            let line = if digits > 0 && line[digits..].starts_with(|c: char| c == '.' || c == ')') {
                &line[digits + 1..]
            } else {
                line
            };
            line.trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_KEY_POINTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockModel;

    #[test]
    fn test_parse_key_points() {
        let points = parse_key_points("1. First\n\n- Second\n* Third\n• Fourth\n2) Fifth\nSixth");
        assert_eq!(points, vec!["First", "Second", "Third", "Fourth", "Fifth"]);
        assert!(parse_key_points("  \n \n").is_empty());
    }

    #[tokio::test]
    async fn test_add_article_summarizes_once() {
        let long_summary = "x".repeat(300);
        let model = Arc::new(MockModel::new().reply(&long_summary).reply("- a\n- b"));
        let store = MemoryStore::new(model.clone(), Duration::from_secs(3600));

        assert!(store.add_article("http://a", "body", serde_json::json!({})).await);
        assert!(!store.add_article("http://a", "body", serde_json::json!({})).await);
        assert_eq!(model.request_count(), 2);

        assert_eq!(store.summary("http://a").await.unwrap().chars().count(), SUMMARY_MAX_CHARS);
        assert_eq!(store.key_points("http://a").await, vec!["a", "b"]);
        assert!(store.key_points("http://missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_still_stores_entry() {
        let model = Arc::new(MockModel::new().fail("boom").fail("boom"));
        let store = MemoryStore::new(model, Duration::from_secs(3600));

        assert!(store.add_article("http://a", "body", serde_json::json!({})).await);
        assert_eq!(store.summary("http://a").await, Some(String::new()));
        assert!(store.key_points("http://a").await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_are_purged() {
        let store = MemoryStore::new(Arc::new(MockModel::new()), Duration::from_secs(60 * 60));
        store.add_article("http://fresh", "body", serde_json::json!({})).await;
        store.add_article("http://stale", "body", serde_json::json!({})).await;
        store
            .entries
            .write()
            .await
            .get_mut("http://stale")
            .unwrap()
            .added_at = Utc::now() - chrono::Duration::minutes(61);

        let summaries = store.all_summaries().await;
        assert!(summaries.contains_key("http://fresh"));
        assert!(!summaries.contains_key("http://stale"));
        assert_eq!(store.all_key_points().await.len(), 1);
    }
}
