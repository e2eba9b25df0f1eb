use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technology,
    Culture,
    Business,
    Fashion,
    Sports,
    Politics,
    Health,
    Miscellaneous,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Technology,
        Category::Culture,
        Category::Business,
        Category::Fashion,
        Category::Sports,
        Category::Politics,
        Category::Health,
        Category::Miscellaneous,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::Culture => "culture",
            Category::Business => "business",
            Category::Fashion => "fashion",
            Category::Sports => "sports",
            Category::Politics => "politics",
            Category::Health => "health",
            Category::Miscellaneous => "miscellaneous",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Miscellaneous
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::Config(format!("Unknown category: {}", s)))
    }
}

/// A collected news article as persisted in `news_articles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub content: String,
    pub category: Category,
    pub analyzed: bool,
    pub trend_score: f64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub trend_score: f64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for `blogs`; storage assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBlogPost {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub trend_score: f64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewBlogPost {
    pub fn into_post(self, id: String) -> BlogPost {
        BlogPost {
            id,
            title: self.title,
            content: self.content,
            category: self.category,
            trend_score: self.trend_score,
            image_url: self.image_url,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogEmbedding {
    pub blog_id: String,
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatch {
    pub blog_id: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCacheEntry {
    pub topic: String,
    pub category: Category,
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Filter used when looking up stored articles.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Case-insensitive substring of the title.
    pub title_contains: Option<String>,
    pub category: Option<Category>,
    pub analyzed: Option<bool>,
    pub limit: Option<usize>,
}

impl ArticleQuery {
    pub fn matches(&self, article: &NewsArticle) -> bool {
        if let Some(needle) = &self.title_contains {
            if !contains_ignore_case(&article.title, needle) {
                return false;
            }
        }
        if let Some(category) = self.category {
            if article.category != category {
                return false;
            }
        }
        if let Some(analyzed) = self.analyzed {
            if article.analyzed != analyzed {
                return false;
            }
        }
        true
    }
}

/// `ILIKE '%needle%'` semantics.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
