use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nb_core::{render_articles, ArticleRecord, Category, CategoryTerm, Error, Result};
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::logging::Logger;
use crate::query::{self, EndpointKind, QueryContext, SourceRequest};
use crate::registry::SourceDescriptor;

const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Upper bound on in-flight requests within one fetch call.
    pub max_concurrency: usize,
    /// Per-leaf deadline. `None` leaves timeouts to the transport.
    pub leaf_timeout: Option<Duration>,
}

impl FetchConfig {
    /// Permits for the per-call semaphore: `max_concurrency` clamped to what tokio accepts.
    pub fn permits(&self) -> usize {
        self.max_concurrency.clamp(1, Semaphore::MAX_PERMITS)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "newsbrief/0.1".to_string(),
            max_concurrency: 16,
            leaf_timeout: None,
        }
    }
}

/// What happened to one (source, category) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafReport {
    pub source_name: String,
    pub category: Category,
    pub endpoint: EndpointKind,
    pub articles: usize,
    pub error: Option<String>,
}

impl LeafReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated text of a fetch plus a report per leaf. Leaf order is not meaningful.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub text: String,
    pub leaves: Vec<LeafReport>,
}

impl FetchOutcome {
    /// Categories with at least one successful leaf, even if it returned no articles.
    pub fn served_categories(&self) -> BTreeSet<Category> {
        self.leaves
            .iter()
            .filter(|leaf| leaf.succeeded())
            .map(|leaf| leaf.category)
            .collect()
    }

    pub fn article_count(&self) -> usize {
        self.leaves.iter().map(|leaf| leaf.articles).sum()
    }

    pub fn failed_leaves(&self) -> usize {
        self.leaves.iter().filter(|leaf| !leaf.succeeded()).count()
    }
}

/// Fans a turn's categories out over every source and folds the answers into one document.
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    client: Client,
    config: FetchConfig,
}

impl FetchCoordinator {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder().user_agent(config.user_agent.clone()).build()?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// One task per source, each spawning one task per category term. Failed leaves
    /// contribute nothing and never affect their siblings. Dropping the returned future
    /// aborts every in-flight leaf.
    pub async fn fetch(&self, sources: &[SourceDescriptor], terms: &[CategoryTerm], ctx: &QueryContext) -> FetchOutcome {
        if sources.is_empty() || terms.is_empty() {
            return FetchOutcome::default();
        }

        let started = Instant::now();
        let runner = LeafRunner {
            client: self.client.clone(),
            semaphore: Arc::new(Semaphore::new(self.config.permits())),
            timeout: self.config.leaf_timeout,
        };
        let terms: Arc<[CategoryTerm]> = Arc::from(terms);
        let ctx = Arc::new(ctx.clone());

        let mut source_tasks = JoinSet::new();
        for source in sources {
            source_tasks.spawn(fetch_source(
                runner.clone(),
                Arc::new(source.clone()),
                terms.clone(),
                ctx.clone(),
            ));
        }

        let mut blocks = Vec::new();
        let mut leaves = Vec::with_capacity(sources.len() * terms.len());
        while let Some(joined) = source_tasks.join_next().await {
            match joined {
                Ok(results) => {
                    for (block, report) in results {
                        if !block.is_empty() {
                            blocks.push(block);
                        }
                        leaves.push(report);
                    }
                }
                Err(e) => warn!("Source task did not complete: {}", e),
            }
        }

        let outcome = FetchOutcome {
            text: blocks.join("\n\n"),
            leaves,
        };
        info!(
            "🔎 Fetched {} articles from {} requests ({} failed) in {}ms",
            outcome.article_count(),
            outcome.leaves.len(),
            outcome.failed_leaves(),
            started.elapsed().as_millis()
        );
        outcome
    }
}

async fn fetch_source(
    runner: LeafRunner,
    source: Arc<SourceDescriptor>,
    terms: Arc<[CategoryTerm]>,
    ctx: Arc<QueryContext>,
) -> Vec<(String, LeafReport)> {
    let mut leaf_tasks = JoinSet::new();
    for term in terms.iter() {
        let request = query::build(&source, term, &ctx);
        let runner = runner.clone();
        let source = source.clone();
        leaf_tasks.spawn(async move { runner.run(&source, request).await });
    }

    let mut results = Vec::with_capacity(terms.len());
    while let Some(joined) = leaf_tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!("[{}] Leaf task did not complete: {}", source.name, e),
        }
    }
    results
}

#[derive(Clone)]
struct LeafRunner {
    client: Client,
    semaphore: Arc<Semaphore>,
    timeout: Option<Duration>,
}

impl LeafRunner {
    async fn run(&self, source: &SourceDescriptor, request: SourceRequest) -> (String, LeafReport) {
        let logger = Logger::new().with_prefix(format!("[{}/{}]", source.name, request.category));
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.execute(source, &request)).await {
                Ok(result) => result,
                Err(_) => Err(fetch_error(&request, format!("timed out after {}ms", limit.as_millis()))),
            },
            None => self.execute(source, &request).await,
        };

        let mut report = LeafReport {
            source_name: source.name.clone(),
            category: request.category,
            endpoint: request.kind,
            articles: 0,
            error: None,
        };
        match result {
            Ok(records) => {
                logger.debug(&format!("{} articles", records.len()));
                report.articles = records.len();
                (render_articles(&records), report)
            }
            Err(e) => {
                logger.warn(&format!("Request failed, continuing without it: {}", e));
                report.error = Some(e.to_string());
                (String::new(), report)
            }
        }
    }

    async fn execute(&self, source: &SourceDescriptor, request: &SourceRequest) -> Result<Vec<ArticleRecord>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::External(e.into()))?;

        debug!("GET {}", request.redacted_url());
        let response = self
            .client
            .get(&request.endpoint)
            .query(&request.params)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(fetch_error(request, format!("HTTP {}: {}", status, preview)));
        }

        source
            .kind
            .parse_articles(&body, request.category, &source.name)
            .map_err(|e| fetch_error(request, e.to_string()))
    }
}

fn fetch_error(request: &SourceRequest, reason: String) -> Error {
    Error::Fetch {
        source_name: request.source_name.clone(),
        category: request.category.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(category: Category, error: Option<&str>, articles: usize) -> LeafReport {
        LeafReport {
            source_name: "NewsApi".to_string(),
            category,
            endpoint: EndpointKind::Search,
            articles,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_served_categories_need_one_success() {
        let outcome = FetchOutcome {
            text: String::new(),
            leaves: vec![
                report(Category::Sports, Some("HTTP 500"), 0),
                report(Category::Sports, None, 0),
                report(Category::Health, Some("HTTP 500"), 0),
                report(Category::Business, None, 3),
            ],
        };
        let served: Vec<_> = outcome.served_categories().into_iter().collect();
        assert_eq!(served, vec![Category::Business, Category::Sports]);
        assert_eq!(outcome.article_count(), 3);
        assert_eq!(outcome.failed_leaves(), 2);
    }

    #[test]
    fn test_permits_are_clamped() {
        let config = |max_concurrency| FetchConfig {
            max_concurrency,
            ..FetchConfig::default()
        };
        assert_eq!(config(0).permits(), 1);
        assert_eq!(config(16).permits(), 16);
        assert_eq!(config(usize::MAX).permits(), Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn test_nothing_to_fetch() {
        let coordinator = FetchCoordinator::new(FetchConfig::default()).unwrap();
        let ctx = QueryContext {
            dates: nb_core::DateSpec::on(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            language: None,
            country: None,
            headline_intent: false,
            today: chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            page_size: None,
        };
        let outcome = coordinator
            .fetch(&[SourceDescriptor::newsapi(None)], &[], &ctx)
            .await;
        assert!(outcome.text.is_empty());
        assert!(outcome.leaves.is_empty());
    }
}
