use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{Filter, Message};
use crate::Result;

/// Turns a free-text utterance into a structured [`Filter`].
#[async_trait]
pub trait FilterExtractor: Send + Sync {
    /// `today` anchors relative dates ("five days ago") and is the default date.
    async fn extract(&self, utterance: &str, today: NaiveDate) -> Result<Filter>;
}

/// A chat-style completion service.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    fn name(&self) -> &str;

    /// Completes an ordered, role-tagged history ending in the latest user message.
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

#[async_trait]
impl<T: GenerationModel + ?Sized> GenerationModel for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, messages: &[Message]) -> Result<String> {
        (**self).generate(messages).await
    }
}

/// Counts units of text. Only used for telemetry and chunk sizing, never for enforcement.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Whitespace word count. The approximation chunk sizes are expressed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl Tokenizer for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}
