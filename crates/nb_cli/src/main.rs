use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nb_core::{FilterExtractor, GenerationModel, Tokenizer, WordCounter};
use nb_inference::models::dummy::DummyModel;
use nb_inference::{create_model, Config, LlmFilterExtractor, TiktokenCounter};
use nb_session::{HistoryWindow, Orchestrator, OrchestratorConfig, SessionState, TurnOutcome, DEFAULT_CHUNK_SIZE};
use nb_sources::logging::init_logging;
use nb_sources::{FetchConfig, FetchCoordinator, SourceCredentials, SourceRegistry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};

/// Reply the offline extractor gives: no category, today's date.
const OFFLINE_FILTER: &str = r#"{"categories": "None Found"}"#;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ask questions about the news", long_about = None)]
pub struct Cli {
    #[arg(long, default_value = "openai", help = "Model to use for inference. Available models: openai (default), dummy")]
    model: String,
    #[arg(long)]
    model_name: Option<String>,
    #[arg(long)]
    model_url: Option<String>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,
    #[arg(long, env = "NEWSAPI_API_KEY", hide_env_values = true)]
    newsapi_key: Option<String>,
    #[arg(long, env = "G_NEWS_KEY", hide_env_values = true)]
    gnews_key: Option<String>,
    #[arg(long, env = "MEDIA_STACK_KEY", hide_env_values = true)]
    mediastack_key: Option<String>,
    /// Words per chunk sent to the model
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    /// Past messages sent along with each request, 0 for all of them
    #[arg(long, default_value_t = 40)]
    history_window: usize,
    #[arg(long, default_value_t = 16)]
    max_concurrency: usize,
    /// Articles requested per source and category
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a single question
    Ask { utterance: Vec<String> },
    /// Keep answering questions from stdin until `quit`
    Chat,
    /// List the configured news sources
    Sources,
}

impl Cli {
    fn credentials(&self) -> SourceCredentials {
        SourceCredentials {
            newsapi: self.newsapi_key.clone(),
            gnews: self.gnews_key.clone(),
            mediastack: self.mediastack_key.clone(),
        }
    }

    fn model_config(&self) -> Config {
        Config {
            model: self.model.clone(),
            api_key: self.openai_key.clone(),
            model_name: self.model_name.clone(),
            base_url: self.model_url.clone(),
        }
    }

    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            chunk_size: self.chunk_size,
            page_size: self.page_size,
            window: HistoryWindow::from_limit(self.history_window),
        }
    }
}

async fn build_orchestrator(cli: &Cli, registry: SourceRegistry) -> Result<Orchestrator> {
    let generator = create_model(&cli.model_config())
        .await
        .with_context(|| format!("failed to initialize model '{}'", cli.model))?;
    info!("🧠 Inference model initialized successfully (using {})", generator.name());

    let extractor: Arc<dyn FilterExtractor> = if cli.model.eq_ignore_ascii_case("dummy") {
        Arc::new(LlmFilterExtractor::new(DummyModel::with_reply(OFFLINE_FILTER)))
    } else {
        Arc::new(LlmFilterExtractor::new(generator.clone()))
    };

    let tokenizer: Arc<dyn Tokenizer> = match TiktokenCounter::new() {
        Ok(counter) => Arc::new(counter),
        Err(e) => {
            warn!("Falling back to word counts for token telemetry: {}", e);
            Arc::new(WordCounter)
        }
    };

    let coordinator = FetchCoordinator::new(FetchConfig {
        max_concurrency: cli.max_concurrency,
        ..FetchConfig::default()
    })
    .context("failed to build HTTP client")?;

    Ok(Orchestrator::new(extractor, generator, registry, coordinator)
        .with_tokenizer(tokenizer)
        .with_config(cli.orchestrator_config()))
}

fn print_outcome(outcome: &TurnOutcome, session: &SessionState) {
    println!("{}", outcome.summary);
    println!();
    println!(
        "[{} chunk(s), {} tokens this turn, {} tokens total]",
        outcome.chunks,
        outcome.tokens_used,
        session.token_total()
    );
}

async fn chat(orchestrator: &Orchestrator, session: &mut SessionState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if is_quit(utterance) {
            break;
        }

        match orchestrator.handle_turn(session, utterance).await {
            Ok(outcome) => print_outcome(&outcome, session),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    Ok(())
}

fn is_quit(utterance: &str) -> bool {
    matches!(utterance.to_lowercase().as_str(), "quit" | "quit.")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { Level::DEBUG } else { Level::INFO });

    let registry = SourceRegistry::configured(&cli.credentials());
    registry.validate().context("invalid source configuration")?;

    match &cli.command {
        Commands::Sources => {
            if registry.is_empty() {
                println!("No sources configured. Set NEWSAPI_API_KEY, G_NEWS_KEY or MEDIA_STACK_KEY.");
            }
            for source in registry.sources() {
                println!("{:<12} {}", source.name, source.capabilities().join(", "));
            }
        }
        Commands::Ask { utterance } => {
            let utterance = utterance.join(" ");
            anyhow::ensure!(!utterance.trim().is_empty(), "nothing to ask");
            if registry.is_empty() {
                warn!("No news sources configured, answering without articles");
            }
            let orchestrator = build_orchestrator(&cli, registry).await?;
            let mut session = SessionState::new();
            let outcome = orchestrator.handle_turn(&mut session, &utterance).await?;
            print_outcome(&outcome, &session);
        }
        Commands::Chat => {
            if registry.is_empty() {
                warn!("No news sources configured, answering without articles");
            }
            let orchestrator = build_orchestrator(&cli, registry).await?;
            let mut session = SessionState::new();
            info!("💬 Session {} started, type 'quit' to exit", session.id());
            chat(&orchestrator, &mut session).await?;
            info!("👋 Session ended after {} tokens", session.token_total());
        }
    }

    Ok(())
}
