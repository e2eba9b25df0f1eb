use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_MODEL_NAME: &str = "gpt-4o";
pub const DEFAULT_RETENTION_MINUTES: u64 = 60;
pub const DEFAULT_CACHE_DIR: &str = "workflow_cache";

#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub service_role_key: Option<String>,
}

impl SupabaseConfig {
    /// The service-role key bypasses row-level security, so it wins over the anon key.
    pub fn api_key(&self) -> Option<&str> {
        self.service_role_key
            .as_deref()
            .or(self.anon_key.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model_name: String,
    pub news_api_key: Option<String>,
    pub unsplash_access_key: Option<String>,
    pub supabase: SupabaseConfig,
    pub memory_retention: Duration,
    pub cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model_name: DEFAULT_MODEL_NAME.to_string(),
            news_api_key: None,
            unsplash_access_key: None,
            supabase: SupabaseConfig::default(),
            memory_retention: Duration::from_secs(DEFAULT_RETENTION_MINUTES * 60),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Reads the process environment, loading `.env` first if one exists.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();

        let retention_minutes = match non_empty_var("TRENDSAGE_MEMORY_RETENTION_MINUTES") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                Error::Config(format!("TRENDSAGE_MEMORY_RETENTION_MINUTES is not a number: {}", e))
            })?,
            None => DEFAULT_RETENTION_MINUTES,
        };

        Ok(Self {
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model_name: non_empty_var("OPENAI_MODEL_NAME")
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            news_api_key: non_empty_var("NEWS_API_KEY"),
            unsplash_access_key: non_empty_var("UNSPLASH_ACCESS_KEY"),
            supabase: SupabaseConfig {
                url: non_empty_var("SUPABASE_URL"),
                anon_key: non_empty_var("SUPABASE_ANON_KEY"),
                service_role_key: non_empty_var("SUPABASE_SERVICE_ROLE_KEY"),
            },
            memory_retention: Duration::from_secs(retention_minutes * 60),
            cache_dir: non_empty_var("TRENDSAGE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
        })
    }

    pub fn require_openai_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY must be set".to_string()))
    }

    pub fn require_news_api_key(&self) -> Result<&str> {
        self.news_api_key
            .as_deref()
            .ok_or_else(|| Error::Config("NEWS_API_KEY must be set".to_string()))
    }

    pub fn require_supabase(&self) -> Result<(&str, &str)> {
        let url = self
            .supabase
            .url
            .as_deref()
            .ok_or_else(|| Error::Config("SUPABASE_URL must be set".to_string()))?;
        let key = self.supabase.api_key().ok_or_else(|| {
            Error::Config(
                "SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY must be set".to_string(),
            )
        })?;
        Ok((url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_role_key_preferred() {
        let supabase = SupabaseConfig {
            url: Some("https://project.supabase.co".to_string()),
            anon_key: Some("anon".to_string()),
            service_role_key: Some("service".to_string()),
        };
        assert_eq!(supabase.api_key(), Some("service"));

        let supabase = SupabaseConfig {
            service_role_key: None,
            ..supabase
        };
        assert_eq!(supabase.api_key(), Some("anon"));
    }

    #[test]
    fn test_require_accessors() {
        let config = Config::default();
        assert!(config.require_openai_api_key().is_err());
        assert!(config.require_news_api_key().is_err());
        assert!(config.require_supabase().is_err());
        assert_eq!(config.openai_model_name, "gpt-4o");
        assert_eq!(config.memory_retention, Duration::from_secs(3600));

        let config = Config {
            openai_api_key: Some("sk-test".to_string()),
            supabase: SupabaseConfig {
                url: Some("https://project.supabase.co".to_string()),
                anon_key: Some("anon".to_string()),
                service_role_key: None,
            },
            ..Config::default()
        };
        assert_eq!(config.require_openai_api_key().unwrap(), "sk-test");
        let (url, key) = config.require_supabase().unwrap();
        assert_eq!(url, "https://project.supabase.co");
        assert_eq!(key, "anon");
    }
}
