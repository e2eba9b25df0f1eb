use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use ts_core::{Category, Result, WorkflowCacheEntry, WorkflowCacheStorage};

/// Workflow results keyed by `(topic, category)`, backed by storage with a
/// local JSON file per key when the storage write fails.
#[derive(Clone)]
pub struct WorkflowCache {
    storage: Arc<dyn WorkflowCacheStorage>,
    cache_dir: PathBuf,
}

/// Where a result was written.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheWrite {
    Storage,
    File(PathBuf),
}

impl WorkflowCache {
    pub fn new(storage: Arc<dyn WorkflowCacheStorage>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            cache_dir: cache_dir.into(),
        }
    }

    /// `<cache_dir>/<topic>_<category>.json`, path separators in the topic replaced.
    pub fn file_path(&self, topic: &str, category: Category) -> PathBuf {
        let safe_topic: String = topic
            .trim()
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
            .collect();
        self.cache_dir
            .join(format!("{}_{}.json", safe_topic, category.as_str()))
    }

    pub async fn get(&self, topic: &str, category: Category) -> Option<serde_json::Value> {
        match self.storage.get_cached(topic, category).await {
            Ok(Some(entry)) => {
                debug!("Workflow cache hit in storage for {} ({})", topic, category);
                return Some(entry.result);
            }
            Ok(None) => {}
            Err(e) => warn!("Workflow cache lookup failed for {}: {}", topic, e),
        }

        let path = self.file_path(topic, category);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Workflow cache hit in {}", path.display());
                Some(value)
            }
            Err(e) => {
                warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn put(
        &self,
        topic: &str,
        category: Category,
        result: &serde_json::Value,
    ) -> Result<CacheWrite> {
        let entry = WorkflowCacheEntry {
            topic: topic.to_string(),
            category,
            result: result.clone(),
            created_at: Utc::now(),
        };

        match self.storage.put_cached(&entry).await {
            Ok(()) => Ok(CacheWrite::Storage),
            Err(e) => {
                warn!("Failed to cache workflow result in storage: {}", e);
                let path = self.write_file(&entry).await?;
                Ok(CacheWrite::File(path))
            }
        }
    }

    async fn write_file(&self, entry: &WorkflowCacheEntry) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.file_path(&entry.topic, entry.category);
        let body = serde_json::to_string_pretty(&entry.result)?;
        tokio::fs::write(&path, body).await?;
        debug!("Workflow result written to {}", path.display());
        Ok(path)
    }
}
