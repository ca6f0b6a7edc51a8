use nb_core::{ArticleRecord, Error, Result};
use serde::Deserialize;

use super::text;

#[derive(Deserialize)]
struct Response {
    status: Option<String>,
    message: Option<String>,
    articles: Option<Vec<Article>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    author: Option<String>,
    title: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

pub(crate) fn parse(body: &str) -> Result<Vec<ArticleRecord>> {
    let response: Response = serde_json::from_str(body)?;
    if response.status.as_deref() == Some("error") {
        return Err(Error::Payload(format!(
            "NewsApi error: {}",
            response.message.unwrap_or_default()
        )));
    }
    let articles = response
        .articles
        .ok_or_else(|| Error::Payload("NewsApi response has no articles".to_string()))?;

    Ok(articles
        .into_iter()
        .map(|a| ArticleRecord {
            author: text(a.author),
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
    fn test_null_author_becomes_empty() {
        let body = r#"{
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {"source": {"id": null, "name": "BBC"}, "author": null, "title": "One",
                 "publishedAt": "2024-05-01T08:00:00Z", "content": "First"},
                {"author": "Jane", "title": "Two"}
            ]
        }"#;
        let records = parse(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].author, "");
        assert_eq!(records[0].content, "First");
        assert_eq!(records[1].author, "Jane");
        assert_eq!(records[1].published_at, "");
    }

    #[test]
    fn test_error_status() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"bad key"}"#;
        let err = parse(body).unwrap_err();
        assert!(err.to_string().contains("bad key"));
    }
}
