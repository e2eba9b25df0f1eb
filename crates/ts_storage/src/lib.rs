use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;
use ts_core::{Config, Error, Result, Storage};

pub mod backends;
pub mod cache;

pub use backends::*;
pub use cache::{CacheWrite, WorkflowCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Memory,
    Supabase,
    Sqlite,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::Supabase => "supabase",
            StorageKind::Sqlite => "sqlite",
        }
    }

    pub fn get_error_message(&self) -> &'static str {
        match self {
            StorageKind::Memory => "In-memory storage failed to initialize",
            StorageKind::Supabase => {
                "Supabase is not reachable. Check SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY"
            }
            StorageKind::Sqlite => {
                "SQLite storage unavailable. Build with `--features sqlite` and check the database path"
            }
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "supabase" => Ok(StorageKind::Supabase),
            "sqlite" => Ok(StorageKind::Sqlite),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

/// Builds the backend named by `kind`. `backend_url` overrides the Supabase URL
/// from the configuration, or names the SQLite database file.
pub async fn create_storage(
    kind: StorageKind,
    backend_url: Option<&str>,
    config: &Config,
) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match kind {
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
        StorageKind::Supabase => {
            let (config_url, key) = config.require_supabase()?;
            let url = backend_url.unwrap_or(config_url);
            Arc::new(SupabaseStorage::new(url, key)?)
        }
        StorageKind::Sqlite => create_sqlite(backend_url).await?,
    };
    info!("🏦 Storage backend initialized (using {})", kind);
    Ok(storage)
}

#[cfg(feature = "sqlite")]
async fn create_sqlite(backend_url: Option<&str>) -> Result<Arc<dyn Storage>> {
    let storage = match backend_url {
        Some(path) => SQLiteStorage::new_with_path(std::path::Path::new(path)).await?,
        None => SQLiteStorage::new().await?,
    };
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "sqlite"))]
async fn create_sqlite(_backend_url: Option<&str>) -> Result<Arc<dyn Storage>> {
    Err(Error::Config(StorageKind::Sqlite.get_error_message().to_string()))
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::cache::WorkflowCache;
    pub use super::{create_storage, StorageKind};
}
