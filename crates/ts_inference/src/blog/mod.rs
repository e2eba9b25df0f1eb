use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use ts_core::types::truncate_chars;
use ts_core::{
    BlogEmbedding, BlogPost, BlogStorage, Category, ChatMessage, CompletionOptions, Error,
    ImageResolver, LanguageModel, NewBlogPost, Result,
};

use crate::json::{extract_json_object, string_field};
use crate::trends::TrendReport;

pub const FALLBACK_TITLE: &str = "Analysis Report";
const PROMPT_ARTICLES: usize = 5;
const EMBEDDING_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BlogOutcome {
    Created { post: BlogPost },
    Duplicate { title: String },
}

/// Title, body and category pulled out of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct BlogDraft {
    pub title: String,
    pub content: String,
    pub category: Category,
}

/// Tries the reply as JSON, then the first `{...}` span, then a markdown
/// `# Heading`, and finally falls back to a fixed title.
pub fn parse_blog_reply(reply: &str, topic: &str, requested: Option<Category>) -> BlogDraft {
    let default_category = requested.unwrap_or(Category::Technology);

    if let Some(value) = extract_json_object(reply) {
        let title = string_field(&value, "title")
            .unwrap_or_else(|| format!("{} Trends Analysis", topic));
        let content = string_field(&value, "content").unwrap_or_else(|| reply.trim().to_string());
        let category = string_field(&value, "category")
            .and_then(|c| c.parse().ok())
            .unwrap_or(default_category);
        return BlogDraft {
            title,
            content,
            category,
        };
    }

    let heading = reply
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|h| !h.is_empty());

    BlogDraft {
        title: heading.unwrap_or(FALLBACK_TITLE).to_string(),
        content: reply.trim().to_string(),
        category: default_category,
    }
}

pub struct BlogWriter {
    model: Arc<dyn LanguageModel>,
    storage: Arc<dyn BlogStorage>,
    images: Option<Arc<dyn ImageResolver>>,
}

impl BlogWriter {
    pub fn new(model: Arc<dyn LanguageModel>, storage: Arc<dyn BlogStorage>) -> Self {
        Self {
            model,
            storage,
            images: None,
        }
    }

    pub fn with_images(mut self, images: Arc<dyn ImageResolver>) -> Self {
        self.images = Some(images);
        self
    }

    pub async fn write(
        &self,
        topic: &str,
        category: Option<Category>,
        report: &TrendReport,
    ) -> Result<BlogOutcome> {
        let messages = [
            ChatMessage::system(
                "You are a technology and culture blogger who turns trend analyses into engaging posts.",
            ),
            ChatMessage::user(build_prompt(topic, category, report)),
        ];
        let reply = self
            .model
            .complete(&messages, &CompletionOptions::default())
            .await?;
        let draft = parse_blog_reply(&reply, topic, category);

        if self.storage.blog_title_exists(&draft.title).await? {
            info!("Blog post '{}' already exists, skipping", draft.title);
            return Ok(BlogOutcome::Duplicate { title: draft.title });
        }

        let image_url = match &self.images {
            Some(images) => Some(images.resolve(&draft.title, draft.category).await),
            None => None,
        };

        let new_post = NewBlogPost {
            title: draft.title,
            content: draft.content,
            category: draft.category,
            trend_score: report.mean_trend_score(),
            image_url,
            created_at: Utc::now(),
        };
        let post = match self.storage.insert_blog(&new_post).await {
            Ok(post) => post,
            Err(Error::Duplicate(_)) => {
                return Ok(BlogOutcome::Duplicate {
                    title: new_post.title,
                })
            }
            Err(e) => return Err(e),
        };
        info!("📝 Stored blog post '{}' ({})", post.title, post.id);

        if let Err(e) = self.index(&post).await {
            warn!("Failed to index blog post {}: {}", post.id, e);
        }
        Ok(BlogOutcome::Created { post })
    }

    async fn index(&self, post: &BlogPost) -> Result<()> {
        let embedding = self.model.generate_embeddings(&post.content).await?;
        self.storage
            .store_embedding(&BlogEmbedding {
                blog_id: post.id.clone(),
                title: post.title.clone(),
                content: truncate_chars(&post.content, EMBEDDING_PREVIEW_CHARS),
                embedding,
                created_at: Utc::now(),
            })
            .await
    }
}

fn build_prompt(topic: &str, category: Option<Category>, report: &TrendReport) -> String {
    let mut prompt = format!("Write a blog post about the latest trends in \"{}\".\n\n", topic);

    let sections = [
        ("Key themes", &report.themes),
        ("Recent developments", &report.developments),
        ("Emerging trends", &report.trends),
        ("Insights", &report.insights),
    ];
    for (label, items) in sections {
        if !items.is_empty() {
            prompt.push_str(&format!("{}:\n", label));
            for item in items {
                prompt.push_str(&format!("- {}\n", item));
            }
            prompt.push('\n');
        }
    }
    if report.themes.is_empty() && !report.raw.is_empty() {
        prompt.push_str(&format!("Analysis:\n{}\n\n", report.raw));
    }

    if !report.articles.is_empty() {
        prompt.push_str("Sources:\n");
        for article in report.articles.iter().take(PROMPT_ARTICLES) {
            prompt.push_str(&format!("- {} - {}\n", article.title, article.url));
        }
        prompt.push('\n');
    }

    let category = category.unwrap_or(Category::Technology);
    prompt.push_str(&format!(
        "Respond with a JSON object with the keys \"title\", \"content\" (markdown), \
         \"category\" (one of {}; use \"{}\" if unsure) and \"summary\".",
        Category::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        category
    ));
    prompt
}
