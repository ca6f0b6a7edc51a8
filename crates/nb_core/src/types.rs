use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The fixed category enumeration shared by every news source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Business,
    Entertainment,
    General,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Business,
        Category::Entertainment,
        Category::General,
        Category::Health,
        Category::Science,
        Category::Sports,
        Category::Technology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::General => "general",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| Error::InvalidFilter(format!("unknown category: {}", s)))
    }
}

/// A topic filter: either a bare category or a category refined by free-text keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryTerm {
    Plain(Category),
    Compound { category: Category, keywords: String },
}

impl CategoryTerm {
    pub fn compound(category: Category, keywords: impl Into<String>) -> Self {
        CategoryTerm::Compound {
            category,
            keywords: keywords.into(),
        }
    }

    /// The category this term is deduplicated by.
    pub fn category(&self) -> Category {
        match self {
            CategoryTerm::Plain(category) => *category,
            CategoryTerm::Compound { category, .. } => *category,
        }
    }

    /// Individual keywords of a compound term, trimmed, empties dropped.
    pub fn keywords(&self) -> Vec<&str> {
        match self {
            CategoryTerm::Plain(_) => Vec::new(),
            CategoryTerm::Compound { keywords, .. } => keywords
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl From<Category> for CategoryTerm {
    fn from(category: Category) -> Self {
        CategoryTerm::Plain(category)
    }
}

impl fmt::Display for CategoryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryTerm::Plain(category) => write!(f, "{}", category),
            CategoryTerm::Compound { category, keywords } => write!(f, "{} ({})", category, keywords),
        }
    }
}

/// Categories requested by a filter. `Unresolved` is the "no category found" sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySelection {
    Resolved(Vec<CategoryTerm>),
    Unresolved,
}

impl CategorySelection {
    /// An empty list collapses to `Unresolved` so `Resolved` is never empty.
    pub fn from_terms(terms: Vec<CategoryTerm>) -> Self {
        if terms.is_empty() {
            CategorySelection::Unresolved
        } else {
            CategorySelection::Resolved(terms)
        }
    }

    pub fn terms(&self) -> Option<&[CategoryTerm]> {
        match self {
            CategorySelection::Resolved(terms) => Some(terms),
            CategorySelection::Unresolved => None,
        }
    }
}

/// One reference date ("on or since") or an inclusive, chronologically ordered range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpec {
    from: NaiveDate,
    to: Option<NaiveDate>,
}

impl DateSpec {
    pub fn on(date: NaiveDate) -> Self {
        Self { from: date, to: None }
    }

    /// Builds a range, swapping the bounds if they arrive out of order.
    pub fn range(a: NaiveDate, b: NaiveDate) -> Self {
        let (from, to) = if a <= b { (a, b) } else { (b, a) };
        Self { from, to: Some(to) }
    }

    pub fn from_dates(dates: &[NaiveDate]) -> Result<Self> {
        match dates {
            [date] => Ok(Self::on(*date)),
            [a, b] => Ok(Self::range(*a, *b)),
            [] => Err(Error::InvalidFilter("date list is empty".to_string())),
            _ => Err(Error::InvalidFilter(format!(
                "expected one or two dates, got {}",
                dates.len()
            ))),
        }
    }

    pub fn parse<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        let dates = values
            .iter()
            .map(|v| {
                let v = v.as_ref().trim();
                NaiveDate::parse_from_str(v, DATE_FORMAT)
                    .map_err(|e| Error::InvalidFilter(format!("invalid date '{}': {}", v, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_dates(&dates)
    }

    pub fn first(&self) -> NaiveDate {
        self.from
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.to
    }

    pub fn len(&self) -> usize {
        if self.to.is_some() {
            2
        } else {
            1
        }
    }

    pub fn is_range(&self) -> bool {
        self.to.is_some()
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) => write!(f, "{}..{}", self.from.format(DATE_FORMAT), to.format(DATE_FORMAT)),
            None => write!(f, "{}", self.from.format(DATE_FORMAT)),
        }
    }
}

/// Structured query produced once per turn by the filter extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub categories: CategorySelection,
    pub dates: DateSpec,
    pub language: Option<String>,
    pub country: Option<String>,
}

impl Filter {
    pub fn new(categories: CategorySelection, dates: DateSpec) -> Self {
        Self {
            categories,
            dates,
            language: None,
            country: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = non_empty(language.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = non_empty(country.into());
        self
    }
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// A provider article normalized into the shape every source shares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub author: String,
    pub title: String,
    pub published_at: String,
    pub content: String,
    pub category: String,
    pub source_name: String,
}

impl ArticleRecord {
    /// Canonical text block fed to the generation step.
    pub fn render(&self) -> String {
        format!(
            "Author: {}\nTitle: {}\nPublished At: {}\nContent: {}\nCategory: {}\nApiSource: {}",
            self.author, self.title, self.published_at, self.content, self.category, self.source_name
        )
    }
}

/// Renders one source/category response, articles separated by a blank line.
pub fn render_articles(records: &[ArticleRecord]) -> String {
    records
        .iter()
        .map(ArticleRecord::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
