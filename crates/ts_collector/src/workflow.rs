use std::sync::Arc;

use serde::Serialize;
use ts_core::{
    ArticleStorage, BlogStorage, Category, Config, LanguageModel, Result, Storage,
    WorkflowCacheStorage,
};
use ts_inference::{BlogOutcome, BlogWriter, MemoryStore, TrendAnalyzer, TrendReport};
use ts_storage::{CacheWrite, WorkflowCache};

use crate::category::resolve_category;
use crate::images::UnsplashResolver;
use crate::logging::Logger;
use crate::manager::{NewsCollector, DEFAULT_MAX_RESULTS};

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub topic: String,
    pub category: Category,
    pub articles_collected: usize,
    pub articles_from_cache: bool,
    pub trends: TrendReport,
    pub blog: BlogOutcome,
}

/// Collect, analyze and write for one topic, memoized per `(topic, category)`.
pub struct Workflow {
    collector: NewsCollector,
    analyzer: TrendAnalyzer,
    writer: BlogWriter,
    cache: WorkflowCache,
    max_results: usize,
}

impl Workflow {
    pub fn new(
        collector: NewsCollector,
        analyzer: TrendAnalyzer,
        writer: BlogWriter,
        cache: WorkflowCache,
    ) -> Self {
        Self {
            collector,
            analyzer,
            writer,
            cache,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Wires the live NewsAPI, scraper and Unsplash clients around one storage handle.
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let memory = Arc::new(MemoryStore::new(model.clone(), config.memory_retention));
        let articles: Arc<dyn ArticleStorage> = Arc::new(storage.clone());
        let blogs: Arc<dyn BlogStorage> = Arc::new(storage.clone());
        let cache: Arc<dyn WorkflowCacheStorage> = Arc::new(storage);

        let collector = NewsCollector::from_config(config, articles.clone(), memory.clone())?;
        let analyzer = TrendAnalyzer::new(model.clone(), articles, memory);
        let writer = BlogWriter::new(model, blogs)
            .with_images(Arc::new(UnsplashResolver::new(config.unsplash_access_key.clone())));

        Ok(Self::new(
            collector,
            analyzer,
            writer,
            WorkflowCache::new(cache, config.cache_dir.clone()),
        ))
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub async fn execute(&self, topic: &str, category: Option<&str>) -> Result<serde_json::Value> {
        let category = resolve_category(topic, category);
        let logger = Logger::new().with_prefix(format!("[{} / {}]", topic, category));

        if let Some(cached) = self.cache.get(topic, category).await {
            logger.info("♻️ Returning cached workflow result");
            return Ok(cached);
        }

        logger.info("🚀 Starting workflow");
        let collection = self
            .collector
            .collect(topic, Some(category.as_str()), self.max_results)
            .await?;
        logger.info(&format!("📰 Collected {} articles", collection.articles.len()));

        let articles_collected = collection.articles.len();
        let trends = self.analyzer.analyze_articles(topic, collection.articles).await?;
        logger.info(&format!("📈 Identified {} themes", trends.themes.len()));

        let blog = self.writer.write(topic, Some(category), &trends).await?;
        match &blog {
            BlogOutcome::Created { post } => {
                logger.info(&format!("📝 Blog post created: {}", post.title))
            }
            BlogOutcome::Duplicate { title } => {
                logger.warn(&format!("Blog post already exists: {}", title))
            }
        }

        let result = WorkflowResult {
            topic: topic.to_string(),
            category,
            articles_collected,
            articles_from_cache: collection.from_cache,
            trends,
            blog,
        };
        let value = serde_json::to_value(&result)?;

        match self.cache.put(topic, category, &value).await {
            Ok(CacheWrite::Storage) => logger.debug("Result cached"),
            Ok(CacheWrite::File(path)) => {
                logger.warn(&format!("Result cached to {}", path.display()))
            }
            Err(e) => logger.error(&format!("Failed to cache result: {}", e)),
        }

        logger.info("✅ Workflow completed");
        Ok(value)
    }
}
