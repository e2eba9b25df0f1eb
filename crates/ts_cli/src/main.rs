use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use ts_collector::{
    handle_analyze, handle_collect, init_logging, parse_level, AnalyzeArgs, CollectArgs,
};
use ts_core::{BlogStorage, Category, ChatMessage, Config, LanguageModel, Storage};
use ts_inference::{create_model, ModelKind, RagAssistant};
use ts_storage::{create_storage, StorageKind};

const DEFAULT_TRENDS_LIMIT: usize = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Turns news trends into blog posts", long_about = None)]
pub struct Cli {
    /// Storage backend: memory, supabase or sqlite
    #[arg(long, default_value = "memory")]
    storage: StorageKind,
    /// Supabase URL override, or the SQLite database file
    #[arg(long)]
    backend_url: Option<String>,
    /// Language model: openai or dummy
    #[arg(long, default_value = "openai")]
    model: ModelKind,
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Collect, analyze and write a blog post for a topic
    Analyze(AnalyzeArgs),
    /// Collect and store articles for a topic
    Collect(CollectArgs),
    /// List stored blog posts
    Blogs {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Stored articles ordered by trend score
    Trends {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long, default_value_t = DEFAULT_TRENDS_LIMIT)]
        limit: usize,
    },
    /// Ask a question about the blog corpus
    Chat {
        query: String,
        /// Answer from this post only
        #[arg(long)]
        blog_id: Option<String>,
        /// JSON file holding earlier messages as `[{"role": "user", "content": "..."}]`
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

fn read_history(path: &Path) -> anyhow::Result<Vec<ChatMessage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading chat history from {}", path.display()))?;
    let history = serde_json::from_str(&raw)
        .with_context(|| format!("parsing chat history in {}", path.display()))?;
    Ok(history)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_model(kind: ModelKind, config: &Config) -> anyhow::Result<Arc<dyn LanguageModel>> {
    let model = create_model(kind, config)?;
    info!("🧠 Inference model initialized (using {})", model.name());
    Ok(model)
}

/// `blogs` and `trends` only read storage, so the model is built per command.
async fn run(
    command: Commands,
    config: &Config,
    storage: Arc<dyn Storage>,
    model: ModelKind,
) -> anyhow::Result<()> {
    match command {
        Commands::Analyze(args) => {
            handle_analyze(args, config, storage, load_model(model, config)?).await?
        }
        Commands::Collect(args) => {
            handle_collect(args, config, storage, load_model(model, config)?).await?
        }
        Commands::Blogs { category } => {
            let blogs = storage.list_blogs(category).await?;
            info!("📚 {} blog posts", blogs.len());
            print_json(&blogs)?;
        }
        Commands::Trends { category, limit } => {
            let articles = storage.top_trending(category, limit).await?;
            print_json(&articles)?;
        }
        Commands::Chat {
            query,
            blog_id,
            history,
        } => {
            let history = match history {
                Some(path) => read_history(&path)?,
                None => Vec::new(),
            };
            let blogs: Arc<dyn BlogStorage> = Arc::new(storage);
            let assistant = RagAssistant::new(load_model(model, config)?, blogs);
            let answer = assistant.answer(&query, &history, blog_id.as_deref()).await?;
            print_json(&answer)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(parse_level(&cli.log_level));

    let config = Config::from_env()?;
    let storage = create_storage(cli.storage, cli.backend_url.as_deref(), &config)
        .await
        .context(cli.storage.get_error_message())?;

    run(cli.command, &config, storage, cli.model).await
}
