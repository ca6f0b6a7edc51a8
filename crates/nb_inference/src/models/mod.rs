use std::sync::Arc;

use nb_core::{Error, GenerationModel, Result};

use crate::Config;

pub mod dummy;
pub mod openai;

pub async fn create_model(config: &Config) -> Result<Arc<dyn GenerationModel>> {
    match config.model.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(openai::OpenAiModel::new(config)?)),
        "dummy" => Ok(Arc::new(dummy::DummyModel::new())),
        other => Err(Error::Config(format!("unknown model '{}', expected 'openai' or 'dummy'", other))),
    }
}
