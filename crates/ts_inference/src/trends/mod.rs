use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_core::types::truncate_chars;
use ts_core::{
    ArticleQuery, ArticleStorage, Category, ChatMessage, CompletionOptions, LanguageModel,
    NewsArticle, Result,
};

use crate::json::{extract_json_object, string_list};
use crate::memory::MemoryStore;

pub const MAJOR_OUTLETS: &[&str] = &[
    "Reuters",
    "Associated Press",
    "BBC News",
    "CNN",
    "The New York Times",
    "The Washington Post",
    "Bloomberg",
    "The Guardian",
    "The Wall Street Journal",
    "Financial Times",
    "NPR",
    "Al Jazeera English",
];

const MAJOR_OUTLET_FACTOR: f64 = 1.2;
const MAX_RELEVANCE_FACTOR: f64 = 1.5;

#[derive(Debug, Clone)]
pub struct TrendScorer {
    major_outlets: HashSet<String>,
}

impl Default for TrendScorer {
    fn default() -> Self {
        Self::new(MAJOR_OUTLETS.iter().copied())
    }
}

impl TrendScorer {
    pub fn new<I, S>(major_outlets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            major_outlets: major_outlets
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn is_major_outlet(&self, source: &str) -> bool {
        self.major_outlets.contains(&source.trim().to_lowercase())
    }

    /// Recency decays with a 24h time constant, major outlets get a 20% boost
    /// and each key point adds 0.1 relevance up to 1.5. Rounded to 2 decimals.
    pub fn score(
        &self,
        published_at: DateTime<Utc>,
        source: &str,
        key_points: usize,
        now: DateTime<Utc>,
    ) -> f64 {
        let age_secs = now.signed_duration_since(published_at).num_seconds().max(0);
        let hours = age_secs as f64 / 3600.0;
        let time_factor = (-hours / 24.0).exp();

        let source_factor = if self.is_major_outlet(source) {
            MAJOR_OUTLET_FACTOR
        } else {
            1.0
        };
        let relevance_factor = (0.8 + 0.1 * key_points as f64).min(MAX_RELEVANCE_FACTOR);

        round2(time_factor * source_factor * relevance_factor)
    }

    pub fn score_article(
        &self,
        article: &NewsArticle,
        key_points: usize,
        now: DateTime<Utc>,
    ) -> f64 {
        self.score(article.published_at, &article.source, key_points, now)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendReport {
    pub topic: String,
    pub themes: Vec<String>,
    pub developments: Vec<String>,
    pub trends: Vec<String>,
    pub insights: Vec<String>,
    /// Model reply as received.
    pub raw: String,
    /// Scored articles, highest trend score first.
    pub articles: Vec<NewsArticle>,
}

impl TrendReport {
    pub fn empty(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn mean_trend_score(&self) -> f64 {
        if self.articles.is_empty() {
            return 1.0;
        }
        self.articles.iter().map(|a| a.trend_score).sum::<f64>() / self.articles.len() as f64
    }

    fn from_reply(topic: &str, raw: String, articles: Vec<NewsArticle>) -> Self {
        match extract_json_object(&raw) {
            Some(value) => Self {
                topic: topic.to_string(),
                themes: string_list(&value, "themes"),
                developments: string_list(&value, "developments"),
                trends: string_list(&value, "trends"),
                insights: string_list(&value, "insights"),
                raw,
                articles,
            },
            None => {
                debug!("Trend analysis reply was not JSON, keeping raw text");
                Self {
                    topic: topic.to_string(),
                    themes: vec![topic.to_string()],
                    raw,
                    articles,
                    ..Self::default()
                }
            }
        }
    }
}

pub struct TrendAnalyzer {
    model: Arc<dyn LanguageModel>,
    storage: Arc<dyn ArticleStorage>,
    memory: Arc<MemoryStore>,
    scorer: TrendScorer,
}

impl TrendAnalyzer {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        storage: Arc<dyn ArticleStorage>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            model,
            storage,
            memory,
            scorer: TrendScorer::default(),
        }
    }

    /// Scores the stored articles about `topic` not yet analyzed, optionally within one category.
    pub async fn analyze(&self, topic: &str, category: Option<Category>) -> Result<TrendReport> {
        let pending = self
            .storage
            .find_articles(&ArticleQuery {
                title_contains: Some(topic.to_string()),
                category,
                analyzed: Some(false),
                limit: None,
            })
            .await?;
        self.analyze_articles(topic, pending).await
    }

    /// Articles are only marked analyzed once the model has replied.
    pub async fn analyze_articles(
        &self,
        topic: &str,
        mut articles: Vec<NewsArticle>,
    ) -> Result<TrendReport> {
        if articles.is_empty() {
            info!("No articles to analyze for {}", topic);
            return Ok(TrendReport::empty(topic));
        }

        let now = Utc::now();
        for article in articles.iter_mut() {
            let key_points = self.memory.key_points(&article.url).await.len();
            article.trend_score = self.scorer.score_article(article, key_points, now);
        }
        articles.sort_by(|a, b| b.trend_score.total_cmp(&a.trend_score));
        info!("📈 Scored {} articles for {}", articles.len(), topic);

        let prompt = self.build_prompt(topic, &articles).await;
        let messages = [
            ChatMessage::system("You are a news trend analyst. Reply with JSON only."),
            ChatMessage::user(prompt),
        ];
        let raw = self
            .model
            .complete(&messages, &CompletionOptions::default())
            .await?;

        for article in articles.iter_mut() {
            self.storage
                .mark_analyzed(&article.url, article.trend_score)
                .await?;
            article.analyzed = true;
        }

        Ok(TrendReport::from_reply(topic, raw, articles))
    }

    async fn build_prompt(&self, topic: &str, articles: &[NewsArticle]) -> String {
        let mut listing = String::new();
        for article in articles {
            let summary = match self.memory.summary(&article.url).await {
                Some(summary) if !summary.is_empty() => summary,
                _ => article
                    .description
                    .clone()
                    .unwrap_or_else(|| truncate_chars(&article.content, 200)),
            };
            listing.push_str(&format!(
                "- {} ({}, trend score {:.2}): {}\n",
                article.title, article.source, article.trend_score, summary
            ));
        }

        format!(
            "Analyze the current news trends about \"{}\" from these articles:\n\n{}\n\
             Respond with a JSON object with the keys \"themes\", \"developments\", \
             \"trends\" and \"insights\", each an array of short strings.",
            topic, listing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockModel;
    use chrono::Duration;
    use std::time::Duration as StdDuration;
    use ts_storage::MemoryStorage;

    fn article(url: &str, source: &str, published_at: DateTime<Utc>) -> NewsArticle {
        NewsArticle {
            id: None,
            source: source.to_string(),
            author: None,
            title: format!("Chips story {}", url),
            description: Some("desc".to_string()),
            url: url.to_string(),
            published_at,
            content: "content".to_string(),
            category: Category::Technology,
            analyzed: false,
            trend_score: 1.0,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_score_formula() {
        let scorer = TrendScorer::default();
        let now = Utc::now();

        assert_eq!(scorer.score(now, "Reuters", 5, now), 1.56);
        assert_eq!(scorer.score(now, "Some Blog", 0, now), 0.8);
        assert_eq!(scorer.score(now, " reuters ", 10, now), 1.8);
        assert_eq!(scorer.score(now - Duration::hours(24), "Some Blog", 2, now), 0.37);
        // Future dates count as just published.
        assert_eq!(scorer.score(now + Duration::hours(5), "Some Blog", 2, now), 1.0);
    }

    #[test]
    fn test_score_properties() {
        let scorer = TrendScorer::default();
        let now = Utc::now();
        let mut previous = f64::MAX;
        for hours in [0, 1, 6, 12, 24, 48, 96] {
            let published = now - Duration::hours(hours);
            let major = scorer.score(published, "BBC News", 3, now);
            let minor = scorer.score(published, "Local Gazette", 3, now);
            assert!(major >= minor);
            assert!(major <= 1.8);
            assert!(minor <= previous);
            previous = minor;
        }
    }

    #[tokio::test]
    async fn test_analyze_scores_and_parses_reply() {
        let storage = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        storage
            .store_article(&article("http://old", "Local", now - Duration::hours(48)))
            .await
            .unwrap();
        storage.store_article(&article("http://new", "Reuters", now)).await.unwrap();

        let model = Arc::new(MockModel::new().reply(
            r#"Sure! {"themes": ["chips"], "developments": ["fab"], "trends": ["ai"], "insights": ["buy"]}"#,
        ));
        let memory = Arc::new(MemoryStore::new(model.clone(), StdDuration::from_secs(3600)));
        let analyzer = TrendAnalyzer::new(model.clone(), storage.clone(), memory);

        let report = analyzer.analyze("chips", Some(Category::Technology)).await.unwrap();
        assert_eq!(report.themes, vec!["chips"]);
        assert_eq!(report.insights, vec!["buy"]);
        assert_eq!(report.articles[0].url, "http://new");
        assert!(report.articles.iter().all(|a| a.analyzed));

        let pending = storage
            .find_articles(&ArticleQuery {
                analyzed: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_leaves_articles_pending() {
        let storage = Arc::new(MemoryStorage::new());
        storage.store_article(&article("http://a", "CNN", Utc::now())).await.unwrap();
        let model = Arc::new(MockModel::new().fail("rate limited"));
        let memory = Arc::new(MemoryStore::new(model.clone(), StdDuration::from_secs(3600)));
        let analyzer = TrendAnalyzer::new(model, storage.clone(), memory);

        assert!(analyzer.analyze("chips", None).await.is_err());

        let pending = storage
            .find_articles(&ArticleQuery {
                analyzed: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].trend_score, 1.0);
    }

    #[tokio::test]
    async fn test_analyze_only_picks_articles_about_topic() {
        let storage = Arc::new(MemoryStorage::new());
        storage.store_article(&article("http://a", "CNN", Utc::now())).await.unwrap();
        let mut other = article("http://b", "CNN", Utc::now());
        other.title = "Election results".to_string();
        storage.store_article(&other).await.unwrap();

        let model = Arc::new(MockModel::new().reply("{}"));
        let memory = Arc::new(MemoryStore::new(model.clone(), StdDuration::from_secs(3600)));
        let analyzer = TrendAnalyzer::new(model, storage.clone(), memory);

        let report = analyzer.analyze("CHIPS", None).await.unwrap();
        assert_eq!(report.articles.len(), 1);
        assert_eq!(report.articles[0].url, "http://a");

        let pending = storage
            .find_articles(&ArticleQuery {
                analyzed: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "http://b");
    }

    #[tokio::test]
    async fn test_unparseable_reply_keeps_raw_text() {
        let storage = Arc::new(MemoryStorage::new());
        storage.store_article(&article("http://a", "CNN", Utc::now())).await.unwrap();
        let model = Arc::new(MockModel::new().reply("Chips are hot this week."));
        let memory = Arc::new(MemoryStore::new(model.clone(), StdDuration::from_secs(3600)));
        let analyzer = TrendAnalyzer::new(model, storage, memory);

        let report = analyzer.analyze("chips", None).await.unwrap();
        assert_eq!(report.themes, vec!["chips"]);
        assert_eq!(report.raw, "Chips are hot this week.");
        assert!(report.trends.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_analyze() {
        let model = Arc::new(MockModel::new());
        let memory = Arc::new(MemoryStore::new(model.clone(), StdDuration::from_secs(3600)));
        let analyzer = TrendAnalyzer::new(model.clone(), Arc::new(MemoryStorage::new()), memory);

        let report = analyzer.analyze("chips", None).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.mean_trend_score(), 1.0);
        assert_eq!(model.request_count(), 0);
    }
}
