use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use nb_core::{
    CategoryTerm, Error, Filter, FilterExtractor, GenerationModel, Message, Result, Tokenizer, WordCounter,
};
use nb_sources::{detect_headline_intent, FetchCoordinator, FetchOutcome, QueryContext, SourceRegistry};
use tracing::{debug, info};

use crate::chunker::{chunk, DEFAULT_CHUNK_SIZE};
use crate::dedup::filter_unseen;
use crate::session::{HistoryWindow, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Chunk size in words.
    pub chunk_size: usize,
    pub page_size: Option<u32>,
    pub window: HistoryWindow,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: None,
            window: HistoryWindow::default(),
        }
    }
}

/// Where a turn currently is. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingFilter,
    Deduping,
    Fetching,
    Chunking,
    Generating,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::AwaitingFilter => "awaiting-filter",
            TurnPhase::Deduping => "deduping",
            TurnPhase::Fetching => "fetching",
            TurnPhase::Chunking => "chunking",
            TurnPhase::Generating => "generating",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub summary: String,
    pub filter: Filter,
    /// Terms left after dedup. Empty when every category had been served before.
    pub requested: Vec<CategoryTerm>,
    /// `None` when nothing needed fetching.
    pub fetched: Option<FetchOutcome>,
    pub chunks: usize,
    pub tokens_used: u64,
}

/// Runs one question through extraction, dedup, fetching, chunking and generation.
pub struct Orchestrator {
    extractor: Arc<dyn FilterExtractor>,
    generator: Arc<dyn GenerationModel>,
    tokenizer: Arc<dyn Tokenizer>,
    registry: SourceRegistry,
    coordinator: FetchCoordinator,
    config: OrchestratorConfig,
    today: Option<NaiveDate>,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn FilterExtractor>,
        generator: Arc<dyn GenerationModel>,
        registry: SourceRegistry,
        coordinator: FetchCoordinator,
    ) -> Self {
        Self {
            extractor,
            generator,
            tokenizer: Arc::new(WordCounter),
            registry,
            coordinator,
            config: OrchestratorConfig::default(),
            today: None,
        }
    }

    /// Tokenizer used for token telemetry. Chunk sizes stay in words.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Pins the date used as "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn enter(&self, session: &SessionState, phase: TurnPhase) {
        debug!("[session {}] -> {}", session.id(), phase);
    }

    /// Answers `utterance`, updating `session` only if the whole turn succeeds.
    pub async fn handle_turn(&self, session: &mut SessionState, utterance: &str) -> Result<TurnOutcome> {
        let today = self.today();

        self.enter(session, TurnPhase::AwaitingFilter);
        let started = Instant::now();
        let filter = self.extractor.extract(utterance, today).await.map_err(|e| match e {
            Error::Extraction(_) => e,
            other => Error::Extraction(other.to_string()),
        })?;
        info!(
            "🧭 Filter extracted in {}ms: categories={:?} dates={}",
            started.elapsed().as_millis(),
            filter.categories,
            filter.dates
        );

        self.enter(session, TurnPhase::Deduping);
        let requested = filter_unseen(&filter.categories, session.used_categories());

        let fetched = if requested.is_empty() {
            info!("All requested categories were already served, answering from history");
            None
        } else {
            self.enter(session, TurnPhase::Fetching);
            let ctx = QueryContext::from_filter(&filter, today, detect_headline_intent(utterance))
                .with_page_size(self.config.page_size);
            Some(self.coordinator.fetch(self.registry.sources(), &requested, &ctx).await)
        };

        self.enter(session, TurnPhase::Chunking);
        let text = fetched.as_ref().map(|f| f.text.as_str()).unwrap_or_default();
        let chunks = chunk(text, self.config.chunk_size);
        debug!("Split {} words into {} chunks", text.split_whitespace().count(), chunks.len());

        self.enter(session, TurnPhase::Generating);
        let checkpoint = session.checkpoint();
        let started = Instant::now();
        let (summary, tokens_used) = match self.generate(session, utterance, &chunks).await {
            Ok(generated) => generated,
            Err(e) => {
                session.rollback(checkpoint);
                return Err(match e {
                    Error::Generation(_) => e,
                    other => Error::Generation(other.to_string()),
                });
            }
        };
        info!(
            "✨ Generated summary with {} in {}ms ({} tokens this turn, {} total)",
            self.generator.name(),
            started.elapsed().as_millis(),
            tokens_used,
            session.token_total()
        );

        session.push(Message::assistant(summary.clone()));
        if let Some(outcome) = &fetched {
            session.mark_used(outcome.served_categories());
        }
        self.enter(session, TurnPhase::Idle);

        Ok(TurnOutcome {
            summary,
            filter,
            requested,
            fetched,
            chunks: chunks.len(),
            tokens_used,
        })
    }

    /// One sequential call per chunk. Each chunk becomes a user message of its own.
    async fn generate(&self, session: &mut SessionState, utterance: &str, chunks: &[String]) -> Result<(String, u64)> {
        let turn_start = session.history().len();
        let mut completions = Vec::with_capacity(chunks.len());
        let mut tokens_used = 0u64;

        for (i, text) in chunks.iter().enumerate() {
            session.push(Message::user(format!("{}\n\n{}", utterance, text)));
            let messages = self.config.window.select(session.history(), turn_start);
            let completion = self.generator.generate(&messages).await?;

            let sent: usize = messages.iter().map(|m| self.tokenizer.count(&m.content)).sum();
            let tokens = (sent + self.tokenizer.count(&completion)) as u64;
            session.record_tokens(tokens);
            tokens_used += tokens;
            debug!(
                "Chunk {}/{}: {} messages sent, {} tokens",
                i + 1,
                chunks.len(),
                messages.len(),
                tokens
            );
            completions.push(completion);
        }

        Ok((completions.join("\n"), tokens_used))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(TurnPhase::AwaitingFilter.to_string(), "awaiting-filter");
        assert_eq!(TurnPhase::Idle.to_string(), "idle");
    }

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.chunk_size, 30_000);
        assert_eq!(config.window, HistoryWindow::Last(40));
        assert!(config.page_size.is_none());
    }
}
