use std::fmt;

use async_trait::async_trait;
use nb_core::{GenerationModel, Message, Result, Role};

const ECHO_WORDS: usize = 20;

/// Offline model. Echoes the start of the latest user message, or a canned reply.
pub struct DummyModel {
    reply: Option<String>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self { reply: None }
    }

    /// Always answers `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn generate(&self, messages: &[Message]) -> Result<String> {
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let words: Vec<&str> = last_user.split_whitespace().take(ECHO_WORDS).collect();
        Ok(words.join(" "))
    }
}
