use nb_core::{ArticleRecord, Category, Result};

pub mod gnews;
pub mod mediastack;
pub mod newsapi;

/// Response shape spoken by a source. Each variant owns its extraction into [`ArticleRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    NewsApi,
    GNews,
    MediaStack,
}

impl ProviderKind {
    /// Parses a successful response body. A body without the expected article list is an error;
    /// missing fields on individual articles become empty strings.
    pub fn parse_articles(&self, body: &str, category: Category, source_name: &str) -> Result<Vec<ArticleRecord>> {
        let records = match self {
            ProviderKind::NewsApi => newsapi::parse(body)?,
            ProviderKind::GNews => gnews::parse(body)?,
            ProviderKind::MediaStack => mediastack::parse(body)?,
        };
        Ok(records
            .into_iter()
            .map(|mut record| {
                record.category = category.to_string();
                record.source_name = source_name.to_string();
                record
            })
            .collect())
    }
}

pub(crate) fn text(value: Option<String>) -> String {
    value.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stamps_category_and_source() {
        let body = r#"{"status":"ok","articles":[{"author":"A","title":"T","publishedAt":"2024-05-01T00:00:00Z","content":"C"}]}"#;
        let records = ProviderKind::NewsApi
            .parse_articles(body, Category::Sports, "NewsApi")
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "sports");
        assert_eq!(records[0].source_name, "NewsApi");
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        for kind in [ProviderKind::NewsApi, ProviderKind::GNews, ProviderKind::MediaStack] {
            assert!(kind.parse_articles("<html>", Category::General, "x").is_err());
            assert!(kind.parse_articles("{}", Category::General, "x").is_err());
        }
    }
}
