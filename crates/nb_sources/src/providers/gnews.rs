use nb_core::{ArticleRecord, Error, Result};
use serde::Deserialize;

use super::text;

#[derive(Deserialize)]
struct Response {
    articles: Option<Vec<Article>>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
    source: Option<Publisher>,
}

#[derive(Deserialize)]
struct Publisher {
    name: Option<String>,
}

/// GNews has no per-article author, the publisher name stands in for it.
pub(crate) fn parse(body: &str) -> Result<Vec<ArticleRecord>> {
    let response: Response = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        let errors = response
            .errors
            .iter()
            .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::Payload(format!("GNews error: {}", errors)));
    }
    let articles = response
        .articles
        .ok_or_else(|| Error::Payload("GNews response has no articles".to_string()))?;

    Ok(articles
        .into_iter()
        .map(|a| ArticleRecord {
            author: text(a.source.and_then(|s| s.name)),
            title: text(a.title),
            published_at: text(a.published_at),
            content: text(a.content),
            ..Default::default()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_is_author() {
        let body = r#"{
            "totalArticles": 1,
            "articles": [{
                "title": "Final score",
                "description": "d",
                "content": "The match ended...",
                "url": "https://example.com/a",
                "publishedAt": "2024-05-01T12:00:00Z",
                "source": {"name": "ESPN", "url": "https://espn.com"}
            }]
        }"#;
        let records = parse(body).unwrap();
        assert_eq!(records[0].author, "ESPN");
        assert_eq!(records[0].title, "Final score");
    }

    #[test]
    fn test_missing_source_is_tolerated() {
        let records = parse(r#"{"articles":[{"title":"x"}]}"#).unwrap();
        assert_eq!(records[0].author, "");
        assert_eq!(records[0].content, "");
    }

    #[test]
    fn test_errors_field() {
        let err = parse(r#"{"errors":["You did not provide an API key."]}"#).unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
