use chrono::NaiveDate;
use nb_core::{Category, CategoryTerm, DateSpec, Error, Filter, Result, DATE_FORMAT};
use url::Url;

use crate::registry::{DateDialect, SourceDescriptor};

const HEADLINE_MARKERS: [&str; 2] = ["headline", "top stories"];

/// Whether the utterance explicitly asks for headlines / top stories.
pub fn detect_headline_intent(utterance: &str) -> bool {
    let lowered = utterance.to_lowercase();
    HEADLINE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Everything about a turn the query builder needs besides the source and the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub dates: DateSpec,
    pub language: Option<String>,
    pub country: Option<String>,
    pub headline_intent: bool,
    pub today: NaiveDate,
    pub page_size: Option<u32>,
}

impl QueryContext {
    pub fn from_filter(filter: &Filter, today: NaiveDate, headline_intent: bool) -> Self {
        Self {
            dates: filter.dates,
            language: filter.language.clone(),
            country: filter.country.clone(),
            headline_intent,
            today,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Headline,
    Search,
}

/// A fully built GET request for one (source, category) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub source_name: String,
    pub category: Category,
    pub kind: EndpointKind,
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    api_key_param: &'static str,
}

impl SourceRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn url(&self) -> Result<Url> {
        Url::parse_with_params(&self.endpoint, &self.params)
            .map_err(|e| Error::Config(format!("invalid endpoint '{}': {}", self.endpoint, e)))
    }

    /// The request URL with the API key masked, for logs.
    pub fn redacted_url(&self) -> String {
        let params = self.params.iter().map(|(key, value)| {
            if key == self.api_key_param {
                (key.as_str(), "***")
            } else {
                (key.as_str(), value.as_str())
            }
        });
        Url::parse_with_params(&self.endpoint, params)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| self.endpoint.clone())
    }
}

/// Headline endpoint only for same-day queries the source serves there.
pub fn select_endpoint(source: &SourceDescriptor, ctx: &QueryContext) -> EndpointKind {
    if ctx.dates.first() == ctx.today && (source.headline_always_for_today || ctx.headline_intent) {
        EndpointKind::Headline
    } else {
        EndpointKind::Search
    }
}

/// Translates one category term into `source`'s dialect. Missing capabilities are skipped.
pub fn build(source: &SourceDescriptor, term: &CategoryTerm, ctx: &QueryContext) -> SourceRequest {
    let kind = select_endpoint(source, ctx);
    let endpoint = match kind {
        EndpointKind::Headline => source.headline_endpoint.clone(),
        EndpointKind::Search => source.search_endpoint.clone(),
    };

    let mut params: Vec<(String, String)> = Vec::new();
    let mut set = |key: &str, value: String| params.push((key.to_string(), value));

    set(source.api_key_param, source.credential.clone().unwrap_or_default());

    let category = term.category();
    let native_category = kind == EndpointKind::Headline || source.search_accepts_category;
    let keywords = term.keywords();
    let dialect = source.keyword_dialect;

    match term {
        CategoryTerm::Plain(_) if native_category => set(source.category_param, category.to_string()),
        CategoryTerm::Plain(_) => set(source.query_param, category.to_string()),
        CategoryTerm::Compound { .. } if native_category => {
            set(source.category_param, category.to_string());
            if !keywords.is_empty() {
                set(source.query_param, dialect.join(&keywords));
            }
        }
        CategoryTerm::Compound { .. } => match (category, keywords.is_empty()) {
            // "general" is no use as a search term.
            (Category::General, true) => {}
            (Category::General, false) => set(source.query_param, dialect.join(&keywords)),
            (_, true) => set(source.query_param, category.to_string()),
            (_, false) => {
                let mut terms = vec![category.as_str()];
                terms.extend(keywords.iter().copied());
                set(source.query_param, dialect.join(&terms));
            }
        },
    }

    let from = ctx.dates.first().format(DATE_FORMAT).to_string();
    let to = ctx.dates.last().map(|d| d.format(DATE_FORMAT).to_string());
    match source.date_dialect {
        DateDialect::Range { from: from_param, to: to_param } => {
            set(from_param, from);
            if let (Some(to_param), Some(to)) = (to_param, to) {
                set(to_param, to);
            }
        }
        DateDialect::Combined { param } => match to {
            Some(to) => set(param, format!("{},{}", from, to)),
            None => set(param, from),
        },
    }

    if let (Some(param), Some(language)) = (source.language_param, ctx.language.as_deref()) {
        if !language.is_empty() {
            set(param, language.to_string());
        }
    }
    if let (Some(param), Some(country)) = (source.country_param, ctx.country.as_deref()) {
        if !country.is_empty() {
            set(param, country.to_string());
        }
    }
    if let (Some(param), Some(size)) = (source.page_size_param, ctx.page_size) {
        set(param, size.to_string());
    }

    SourceRequest {
        source_name: source.name.clone(),
        category,
        kind,
        endpoint,
        params,
        api_key_param: source.api_key_param,
    }
}
