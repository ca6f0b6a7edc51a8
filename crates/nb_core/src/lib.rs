pub mod error;
pub mod models;
pub mod types;

pub use error::Error;
pub use models::{FilterExtractor, GenerationModel, Tokenizer, WordCounter};
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;
