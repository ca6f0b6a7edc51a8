use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use nb_core::{
    Category, CategorySelection, CategoryTerm, DateSpec, Error, Filter, FilterExtractor, GenerationModel, Message,
    Result, DATE_FORMAT,
};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Marker a model returns when no category applies.
pub const NONE_FOUND: &str = "None Found";

/// Asks a chat model to turn the utterance into filter JSON.
pub struct LlmFilterExtractor<M> {
    model: M,
}

impl<M: GenerationModel> LlmFilterExtractor<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

#[async_trait]
impl<M: GenerationModel> FilterExtractor for LlmFilterExtractor<M> {
    async fn extract(&self, utterance: &str, today: NaiveDate) -> Result<Filter> {
        let started = Instant::now();
        let messages = [Message::user(extraction_prompt(utterance, today))];
        let raw = self
            .model
            .generate(&messages)
            .await
            .map_err(|e| Error::Extraction(format!("{} failed: {}", self.model.name(), e)))?;
        debug!("Filter reply: {}", raw);

        let filter = parse_filter(&raw, today)?;
        info!("🧭 {} extracted a filter in {}ms", self.model.name(), started.elapsed().as_millis());
        Ok(filter)
    }
}

/// Few-shot prompt. Example dates are relative to `today` so the model sees the real calendar.
pub fn extraction_prompt(utterance: &str, today: NaiveDate) -> String {
    let day = |offset: i64| (today - Duration::days(offset)).format(DATE_FORMAT).to_string();
    let categories = Category::ALL.map(|c| format!("  - {}", c)).join("\n");
    format!(
        r#"You turn a news question into search parameters.
Return only a JSON object with the keys "categories" (list), "dates" (list), "language" and "country".
Rules:
1. Allowed categories:
{categories}
2. "categories" is always a list, even with a single entry.
3. If no category is named, infer one from the keywords.
4. When keywords were used to pick a category, keep both as {{"<category>": "<keywords>"}}.
5. If nothing fits, set "categories" to "{none}".
6. Dates use YYYY-MM-DD, always in a list, sorted older to newer, at most two.
7. If no date is mentioned, use {today}.
8. "language" is an ISO language code, default "".
9. "country" is an ISO country code, default "".
Examples:
User: Summarize headline technology articles from 5 days ago.
{{"categories": ["technology"], "dates": ["{five_days_ago}"], "language": "", "country": ""}}
User: Were there any volleyball incidents in Russia?
{{"categories": [{{"sports": "volleyball"}}], "dates": ["{today}"], "language": "", "country": "ru"}}
User: What's happening with video game, AI and football news? english
{{"categories": [{{"technology": "video game, AI"}}, {{"sports": "football"}}], "dates": ["{today}"], "language": "en", "country": ""}}
User: What is Elon Musk doing and how's business news since last week?
{{"categories": [{{"general": "Elon Musk"}}, "business"], "dates": ["{week_ago}", "{today}"], "language": "en", "country": ""}}
Input: {utterance}"#,
        categories = categories,
        none = NONE_FOUND,
        today = day(0),
        five_days_ago = day(5),
        week_ago = day(7),
        utterance = utterance,
    )
}

/// Parses a model's filter reply. Tolerates code fences, prose around the JSON object,
/// singular key names and scalar values where lists are expected.
pub fn parse_filter(raw: &str, today: NaiveDate) -> Result<Filter> {
    let json = json_object(raw).ok_or_else(|| Error::Extraction(format!("no JSON object in reply: {}", raw.trim())))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| Error::Extraction(format!("malformed filter JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::Extraction("filter is not a JSON object".to_string()))?;

    let categories = parse_categories(field(object, &["categories", "category"]))?;
    let dates = parse_dates(field(object, &["dates", "date"]), today)?;

    let mut filter = Filter::new(categories, dates);
    if let Some(language) = field(object, &["language", "lang"]).and_then(Value::as_str) {
        filter = filter.with_language(language);
    }
    if let Some(country) = field(object, &["country"]).and_then(Value::as_str) {
        filter = filter.with_country(country);
    }
    Ok(filter)
}

fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name)).filter(|v| !v.is_null())
}

fn parse_categories(value: Option<&Value>) -> Result<CategorySelection> {
    let mut terms = Vec::new();
    match value {
        None => {}
        Some(Value::Array(items)) => {
            for item in items {
                collect_terms(item, &mut terms)?;
            }
        }
        Some(other) => collect_terms(other, &mut terms)?,
    }
    Ok(CategorySelection::from_terms(terms))
}

fn collect_terms(value: &Value, terms: &mut Vec<CategoryTerm>) -> Result<()> {
    match value {
        Value::String(name) => {
            if let Some(term) = plain_term(name) {
                terms.push(term);
            }
        }
        Value::Object(object) if object.contains_key("category") => {
            let name = object.get("category").and_then(Value::as_str).unwrap_or_default();
            let keywords = object.get("keywords").map(keywords_text).unwrap_or_default();
            terms.extend(compound_term(name, &keywords));
        }
        Value::Object(object) => {
            for (name, keywords) in object {
                terms.extend(compound_term(name, &keywords_text(keywords)));
            }
        }
        Value::Null => {}
        other => return Err(Error::Extraction(format!("unexpected category entry: {}", other))),
    }
    Ok(())
}

fn plain_term(name: &str) -> Option<CategoryTerm> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(NONE_FOUND) {
        return None;
    }
    Some(match Category::from_str(name) {
        Ok(category) => CategoryTerm::Plain(category),
        Err(_) => CategoryTerm::compound(Category::General, name),
    })
}

fn compound_term(name: &str, keywords: &str) -> Option<CategoryTerm> {
    let keywords = keywords.trim();
    match Category::from_str(name) {
        Ok(category) if keywords.is_empty() => Some(CategoryTerm::Plain(category)),
        Ok(category) => Some(CategoryTerm::compound(category, keywords)),
        Err(_) if keywords.is_empty() => plain_term(name),
        Err(_) => Some(CategoryTerm::compound(Category::General, format!("{}, {}", name.trim(), keywords))),
    }
}

fn keywords_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_dates(value: Option<&Value>, today: NaiveDate) -> Result<DateSpec> {
    let values: Vec<&str> = match value {
        None => Vec::new(),
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| Error::Extraction(format!("date is not a string: {}", item)))
            })
            .collect::<Result<_>>()?,
        Some(other) => return Err(Error::Extraction(format!("unexpected dates value: {}", other))),
    };
    let values: Vec<&str> = values.into_iter().map(str::trim).filter(|v| !v.is_empty()).collect();

    if values.is_empty() {
        return Ok(DateSpec::on(today));
    }
    DateSpec::parse(&values).map_err(|e| Error::Extraction(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dummy::DummyModel;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 9).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_prompt_mentions_relative_dates() {
        let prompt = extraction_prompt("sports today", today());
        assert!(prompt.contains("2024-05-04"));
        assert!(prompt.contains("\"dates\": [\"2024-05-02\", \"2024-05-09\"]"));
        assert!(prompt.contains("  - technology"));
        assert!(prompt.ends_with("Input: sports today"));
    }

    #[test]
    fn test_parse_plain_and_compound() {
        let raw = r#"{"categories": [{"general": "Elon Musk"}, "business"], "dates": ["2024-05-09"], "language": "en", "country": ""}"#;
        let filter = parse_filter(raw, today()).unwrap();
        assert_eq!(
            filter.categories,
            CategorySelection::Resolved(vec![
                CategoryTerm::compound(Category::General, "Elon Musk"),
                CategoryTerm::Plain(Category::Business),
            ])
        );
        assert_eq!(filter.dates, DateSpec::on(today()));
        assert_eq!(filter.language.as_deref(), Some("en"));
        assert_eq!(filter.country, None);
    }

    #[test]
    fn test_parse_fenced_reply_with_singular_keys() {
        let raw = "Here you go:\n```json\n{\"category\": \"sports\", \"date\": [\"2024-05-08\", \"2024-05-01\"]}\n```";
        let filter = parse_filter(raw, today()).unwrap();
        assert_eq!(filter.categories, CategorySelection::Resolved(vec![CategoryTerm::Plain(Category::Sports)]));
        assert_eq!(filter.dates, DateSpec::range(date("2024-05-01"), date("2024-05-08")));
    }

    #[test]
    fn test_none_found_and_missing_dates() {
        let filter = parse_filter(r#"{"categories": "None Found"}"#, today()).unwrap();
        assert_eq!(filter.categories, CategorySelection::Unresolved);
        assert_eq!(filter.dates, DateSpec::on(today()));

        let filter = parse_filter(r#"{"categories": [], "dates": []}"#, today()).unwrap();
        assert_eq!(filter.categories, CategorySelection::Unresolved);
        assert_eq!(filter.dates, DateSpec::on(today()));
    }

    #[test]
    fn test_explicit_compound_shape_and_unknown_names() {
        let raw = r#"{"categories": [{"category": "technology", "keywords": ["AI", "chips"]}, "politics", {"crypto": "bitcoin"}]}"#;
        let filter = parse_filter(raw, today()).unwrap();
        assert_eq!(
            filter.categories,
            CategorySelection::Resolved(vec![
                CategoryTerm::compound(Category::Technology, "AI, chips"),
                CategoryTerm::compound(Category::General, "politics"),
                CategoryTerm::compound(Category::General, "crypto, bitcoin"),
            ])
        );
    }

    #[test]
    fn test_bad_dates_are_extraction_errors() {
        let raw = r#"{"categories": ["science"], "dates": ["2024-05-01", "2024-05-02", "2024-05-03"]}"#;
        assert!(matches!(parse_filter(raw, today()), Err(Error::Extraction(_))));

        let raw = r#"{"categories": ["science"], "dates": ["May 1st"]}"#;
        assert!(matches!(parse_filter(raw, today()), Err(Error::Extraction(_))));

        assert!(matches!(parse_filter("no idea", today()), Err(Error::Extraction(_))));
        assert!(matches!(parse_filter("{\"categories\": [", today()), Err(Error::Extraction(_))));
    }

    #[tokio::test]
    async fn test_extract_with_canned_model() {
        let extractor = LlmFilterExtractor::new(DummyModel::with_reply(
            r#"{"categories": [{"sports": "volleyball"}], "dates": ["2024-05-09"], "language": "", "country": "ru"}"#,
        ));
        let filter = extractor.extract("volleyball in Russia?", today()).await.unwrap();
        assert_eq!(
            filter.categories,
            CategorySelection::Resolved(vec![CategoryTerm::compound(Category::Sports, "volleyball")])
        );
        assert_eq!(filter.country.as_deref(), Some("ru"));
        assert_eq!(extractor.model().name(), "Dummy");
    }
}
