use nb_core::{ArticleRecord, Error, Result};
use serde::Deserialize;

use super::text;

#[derive(Deserialize)]
struct Response {
    data: Option<Vec<Article>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct Article {
    author: Option<String>,
    title: Option<String>,
    published_at: Option<String>,
    description: Option<String>,
}

/// MediaStack only ships a description, which is used as the content.
pub(crate) fn parse(body: &str) -> Result<Vec<ArticleRecord>> {
    let response: Response = serde_json::from_str(body)?;
    // Errors can arrive with a 200 status.
    if let Some(error) = response.error {
        return Err(Error::Payload(format!(
            "MediaStack error {}: {}",
            text(error.code),
            text(error.message)
        )));
    }
    let articles = response
        .data
        .ok_or_else(|| Error::Payload("MediaStack response has no data".to_string()))?;

    Ok(articles
        .into_iter()
        .map(|a| ArticleRecord {
            author: text(a.author),
            title: text(a.title),
            published_at: text(a.published_at),
            content: text(a.description),
            ..Default::default()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_is_content() {
        let body = r#"{
            "pagination": {"limit": 25, "offset": 0, "count": 1, "total": 1},
            "data": [{
                "author": null,
                "title": "Rates held",
                "description": "The central bank held rates.",
                "url": "https://example.com",
                "source": "CNN",
                "category": "business",
                "published_at": "2024-05-01T10:00:00+00:00"
            }]
        }"#;
        let records = parse(body).unwrap();
        assert_eq!(records[0].author, "");
        assert_eq!(records[0].content, "The central bank held rates.");
        assert_eq!(records[0].published_at, "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_error_object() {
        let body = r#"{"error":{"code":"invalid_access_key","message":"You have not supplied a valid API Access Key."}}"#;
        let err = parse(body).unwrap_err();
        assert!(err.to_string().contains("invalid_access_key"));
    }
}
