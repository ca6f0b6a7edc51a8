use std::fmt;

pub mod extractor;
pub mod models;
pub mod tokenizer;

pub use extractor::{parse_filter, LlmFilterExtractor};
pub use models::create_model;
pub use tokenizer::TiktokenCounter;

/// Which generation backend to build and how to reach it.
#[derive(Clone, Default)]
pub struct Config {
    /// Backend selector: `openai` or `dummy`.
    pub model: String,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .finish()
    }
}

pub mod prelude {
    pub use super::models::{create_model, dummy::DummyModel, openai::OpenAiModel};
    pub use super::{Config, LlmFilterExtractor, TiktokenCounter};
    pub use nb_core::{Error, GenerationModel, Message, Result};
}
