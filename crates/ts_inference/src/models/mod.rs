use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ts_core::{Config, Error, LanguageModel, Result};

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAIModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    OpenAI,
    Dummy,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::OpenAI => f.write_str("openai"),
            ModelKind::Dummy => f.write_str("dummy"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ModelKind::OpenAI),
            "dummy" => Ok(ModelKind::Dummy),
            other => Err(Error::Config(format!("Unknown model: {}", other))),
        }
    }
}

pub fn create_model(kind: ModelKind, config: &Config) -> Result<Arc<dyn LanguageModel>> {
    match kind {
        ModelKind::OpenAI => {
            let api_key = config.require_openai_api_key()?;
            Ok(Arc::new(OpenAIModel::new(api_key, config.openai_model_name.clone())))
        }
        ModelKind::Dummy => Ok(Arc::new(DummyModel::new())),
    }
}
