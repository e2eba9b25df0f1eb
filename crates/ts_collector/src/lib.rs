pub mod category;
pub mod cli;
pub mod content;
pub mod images;
pub mod logging;
pub mod manager;
pub mod newsapi;
pub mod retry;
pub mod workflow;

pub use category::{classify_topic, resolve_category};
pub use cli::{handle_analyze, handle_collect, AnalyzeArgs, CollectArgs};
pub use content::ContentScraper;
pub use images::UnsplashResolver;
pub use logging::{init_logging, parse_level, Logger};
pub use manager::{Collection, NewsCollector, NewsSource, PageScraper, DEFAULT_MAX_RESULTS};
pub use newsapi::{NewsApiArticle, NewsApiClient};
pub use retry::{Backoff, RetryPolicy};
pub use workflow::{Workflow, WorkflowResult};

pub mod prelude {
    pub use super::manager::{NewsCollector, NewsSource, PageScraper};
    pub use super::workflow::Workflow;
    pub use ts_core::{Category, Error, NewsArticle, Result};
}
