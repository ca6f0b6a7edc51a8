use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The filter extractor returned something that is not a usable filter.
    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// One leaf of a fetch failed. Recovered inside the fetch coordinator.
    #[error("Fetch error ({source_name}/{category}): {reason}")]
    Fetch {
        source_name: String,
        category: String,
        reason: String,
    },

    /// A source answered, but not with a usable article list.
    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}
