use std::fmt;

use nb_core::{Error, Result};
use tracing::warn;
use url::Url;

use crate::providers::ProviderKind;

/// How a source expresses a date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDialect {
    /// Separate start and (optional) end parameters.
    Range {
        from: &'static str,
        to: Option<&'static str>,
    },
    /// A single parameter holding `start` or `start,end`.
    Combined { param: &'static str },
}

/// How a source joins several free-text keywords into one query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordDialect {
    /// Each keyword quoted, joined with ` OR `.
    QuotedOr,
    /// Bare keywords separated by commas.
    CommaList,
}

impl KeywordDialect {
    pub fn join(&self, keywords: &[&str]) -> String {
        match self {
            KeywordDialect::QuotedOr => keywords
                .iter()
                .map(|k| format!("\"{}\"", k))
                .collect::<Vec<_>>()
                .join(" OR "),
            KeywordDialect::CommaList => keywords.join(","),
        }
    }
}

/// Static description of one news API and the query dialect it speaks.
#[derive(Clone)]
pub struct SourceDescriptor {
    pub name: String,
    pub kind: ProviderKind,
    pub headline_endpoint: String,
    pub search_endpoint: String,
    /// The headline endpoint serves same-day content without an explicit headline request.
    pub headline_always_for_today: bool,
    /// The search endpoint honours the native category parameter.
    pub search_accepts_category: bool,
    pub category_param: &'static str,
    pub api_key_param: &'static str,
    pub query_param: &'static str,
    pub date_dialect: DateDialect,
    pub keyword_dialect: KeywordDialect,
    pub language_param: Option<&'static str>,
    pub country_param: Option<&'static str>,
    pub page_size_param: Option<&'static str>,
    pub credential: Option<String>,
}

impl SourceDescriptor {
    pub fn newsapi(credential: Option<String>) -> Self {
        Self {
            name: "NewsApi".to_string(),
            kind: ProviderKind::NewsApi,
            headline_endpoint: "https://newsapi.org/v2/top-headlines".to_string(),
            search_endpoint: "https://newsapi.org/v2/everything".to_string(),
            headline_always_for_today: true,
            search_accepts_category: false,
            category_param: "category",
            api_key_param: "apiKey",
            query_param: "q",
            date_dialect: DateDialect::Range { from: "from", to: Some("to") },
            keyword_dialect: KeywordDialect::QuotedOr,
            language_param: Some("language"),
            country_param: Some("country"),
            page_size_param: Some("pageSize"),
            credential,
        }
    }

    pub fn gnews(credential: Option<String>) -> Self {
        Self {
            name: "GNews".to_string(),
            kind: ProviderKind::GNews,
            headline_endpoint: "https://gnews.io/api/v4/top-headlines".to_string(),
            search_endpoint: "https://gnews.io/api/v4/search".to_string(),
            headline_always_for_today: false,
            search_accepts_category: false,
            category_param: "category",
            api_key_param: "apikey",
            query_param: "q",
            date_dialect: DateDialect::Range { from: "from", to: Some("to") },
            keyword_dialect: KeywordDialect::QuotedOr,
            language_param: Some("lang"),
            country_param: Some("country"),
            page_size_param: Some("max"),
            credential,
        }
    }

    pub fn mediastack(credential: Option<String>) -> Self {
        Self {
            name: "MediaStack".to_string(),
            kind: ProviderKind::MediaStack,
            headline_endpoint: "http://api.mediastack.com/v1/news".to_string(),
            search_endpoint: "http://api.mediastack.com/v1/news".to_string(),
            headline_always_for_today: true,
            search_accepts_category: true,
            category_param: "categories",
            api_key_param: "access_key",
            query_param: "keywords",
            date_dialect: DateDialect::Combined { param: "date" },
            keyword_dialect: KeywordDialect::CommaList,
            language_param: None,
            country_param: None,
            page_size_param: Some("limit"),
            credential,
        }
    }

    /// Points both endpoints somewhere else, keeping their paths relative to `base`.
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| Error::Config(format!("invalid base url '{}': {}", base, e)))?;
        self.headline_endpoint = rebase(&base, &self.headline_endpoint)?;
        self.search_endpoint = rebase(&base, &self.search_endpoint)?;
        Ok(self)
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        for endpoint in [&self.headline_endpoint, &self.search_endpoint] {
            Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("{}: invalid endpoint '{}': {}", self.name, endpoint, e)))?;
        }
        Ok(())
    }

    /// Short capability labels, used when listing sources.
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut caps = vec!["headlines", "search"];
        match self.date_dialect {
            DateDialect::Range { to: Some(_), .. } => caps.push("date-range"),
            DateDialect::Range { to: None, .. } => caps.push("since-date"),
            DateDialect::Combined { .. } => caps.push("combined-date"),
        }
        if self.language_param.is_some() {
            caps.push("language");
        }
        if self.country_param.is_some() {
            caps.push("country");
        }
        caps
    }
}

fn rebase(base: &Url, endpoint: &str) -> Result<String> {
    let original = Url::parse(endpoint).map_err(|e| Error::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
    let mut rebased = base.clone();
    rebased.set_path(original.path());
    Ok(rebased.to_string())
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("headline_endpoint", &self.headline_endpoint)
            .field("search_endpoint", &self.search_endpoint)
            .field("credential", &self.credential.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

/// API keys for the built-in sources.
#[derive(Debug, Clone, Default)]
pub struct SourceCredentials {
    pub newsapi: Option<String>,
    pub gnews: Option<String>,
    pub mediastack: Option<String>,
}

/// The catalog of sources every turn fans out to.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        Self { sources }
    }

    /// All built-in sources, without credentials.
    pub fn builtin() -> Self {
        Self::new(vec![
            SourceDescriptor::newsapi(None),
            SourceDescriptor::gnews(None),
            SourceDescriptor::mediastack(None),
        ])
    }

    /// Built-in sources that have a credential. Sources without one are skipped.
    pub fn configured(credentials: &SourceCredentials) -> Self {
        let candidates = [
            SourceDescriptor::newsapi(credentials.newsapi.clone()),
            SourceDescriptor::gnews(credentials.gnews.clone()),
            SourceDescriptor::mediastack(credentials.mediastack.clone()),
        ];
        let mut sources = Vec::new();
        for source in candidates {
            match source.credential.as_deref() {
                Some(key) if !key.trim().is_empty() => sources.push(source),
                _ => warn!("Skipping {}: no API key configured", source.name),
            }
        }
        Self::new(sources)
    }

    pub fn add(&mut self, source: SourceDescriptor) {
        self.sources.push(source);
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.sources.iter().try_for_each(SourceDescriptor::validate)
    }
}
