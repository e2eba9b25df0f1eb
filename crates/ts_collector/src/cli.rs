use std::sync::Arc;

use clap::Args;
use ts_core::{ArticleStorage, Config, LanguageModel, Result, Storage};
use ts_inference::MemoryStore;

use crate::manager::{NewsCollector, DEFAULT_MAX_RESULTS};
use crate::workflow::Workflow;

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Topic to search NewsAPI for
    pub topic: String,
    /// Category override: technology, culture, business, sports, politics,
    /// health, fashion or miscellaneous
    #[arg(long)]
    pub category: Option<String>,
    /// Maximum number of articles to fetch
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    pub max_results: usize,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Topic to collect, analyze and write about
    pub topic: String,
    /// Category override; classified from the topic when omitted
    #[arg(long)]
    pub category: Option<String>,
    /// Maximum number of articles to fetch
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    pub max_results: usize,
}

pub async fn handle_collect(
    args: CollectArgs,
    config: &Config,
    storage: Arc<dyn Storage>,
    model: Arc<dyn LanguageModel>,
) -> Result<()> {
    let memory = Arc::new(MemoryStore::new(model, config.memory_retention));
    let articles: Arc<dyn ArticleStorage> = Arc::new(storage);
    let collector = NewsCollector::from_config(config, articles, memory)?;

    let collection = collector
        .collect(&args.topic, args.category.as_deref(), args.max_results)
        .await?;
    println!(
        "Found {} articles ({})",
        collection.articles.len(),
        collection.category
    );
    let emoji = if collection.from_cache { "⏭️" } else { "🆕" };
    for article in &collection.articles {
        println!("{} {} - {}", emoji, article.title, article.url);
    }
    Ok(())
}

pub async fn handle_analyze(
    args: AnalyzeArgs,
    config: &Config,
    storage: Arc<dyn Storage>,
    model: Arc<dyn LanguageModel>,
) -> Result<()> {
    let workflow =
        Workflow::from_config(config, storage, model)?.with_max_results(args.max_results);
    let result = workflow.execute(&args.topic, args.category.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ts_core::Error;
    use ts_inference::models::DummyModel;
    use ts_storage::MemoryStorage;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        collect: CollectArgs,
    }

    #[test]
    fn test_collect_args() {
        let cli = TestCli::parse_from(["test", "electric vehicles", "--category", "business"]);
        assert_eq!(cli.collect.topic, "electric vehicles");
        assert_eq!(cli.collect.category.as_deref(), Some("business"));
        assert_eq!(cli.collect.max_results, DEFAULT_MAX_RESULTS);
    }

    #[tokio::test]
    async fn test_collect_requires_news_api_key() {
        let args = CollectArgs {
            topic: "AI".to_string(),
            category: None,
            max_results: 1,
        };
        let result = handle_collect(
            args,
            &Config::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(DummyModel::new()),
        )
        .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
