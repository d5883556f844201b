//! Mapping of upstream article records onto [`Article`].
//!
//! Upstream producers disagree on field names and value types. Everything
//! here is lenient: wrong-typed fields fall back to their defaults instead
//! of rejecting the record. Only a non-object record is an error.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use super::model::{infer_region, Article, Category, ContentQuality, KeyEntities, SourceType};

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_LANGUAGE: &str = "en";
const UNKNOWN_SOURCE: &str = "unknown";

const SUMMARY_FIELDS: [&str; 4] = ["summary", "body", "content", "description"];
const DATE_FIELDS: [&str; 3] = ["publish_date", "published_at", "publishedAt"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("article record must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Normalize one upstream record. `source_type` always wins over any
/// `source_type` field present in the record.
pub fn normalize_article(
    raw: &Value,
    source_type: SourceType,
    origin_key: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Article, NormalizeError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| NormalizeError::NotAnObject(json_type_name(raw)))?;

    let upstream_id = first_str(obj, &["article_id", "id"]);
    let url = first_str(obj, &["original_url", "url"]);
    let title = first_str(obj, &["title"]);
    let summary = first_str(obj, &SUMMARY_FIELDS).unwrap_or_default();

    let (article_id, id_synthesized) = match &upstream_id {
        Some(id) => (id.clone(), false),
        None => (synthesize_id(url.as_deref(), title.as_deref(), &summary, now), true),
    };

    let original_url = url.clone().or(upstream_id).unwrap_or_default();

    let source = source_name(obj)
        .or_else(|| url.as_deref().and_then(site_name))
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let publish_date = first_str(obj, &DATE_FIELDS)
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, true));

    let language = first_str(obj, &["language"]).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let region = first_str(obj, &["region"]).unwrap_or_else(|| infer_region(&language).to_string());

    let content_quality = obj
        .get("content_quality")
        .and_then(Value::as_str)
        .map(ContentQuality::parse_lenient)
        .unwrap_or_default();

    let confidence = obj
        .get("confidence")
        .and_then(as_f64_lenient)
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or_else(|| source_type.default_confidence());

    Ok(Article {
        article_id,
        original_url,
        title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        summary,
        source,
        publish_date,
        categories: categories(obj.get("categories")),
        key_entities: key_entities(obj.get("key_entities")),
        content_quality,
        confidence,
        language,
        region,
        source_type,
        summary_translation: first_str(obj, &["summary_translation"]),
        x_post: first_str(obj, &["x_post"]),
        merged_from_urls: obj.get("merged_from_urls").and_then(Value::as_array).map(|urls| {
            urls.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }),
        grouping_metadata: passthrough(obj, "_grouping_metadata"),
        merge_metadata: passthrough(obj, "_merge_metadata"),
        processing_metadata: passthrough(obj, "_processing_metadata"),
        id_synthesized,
        origin_key: origin_key.map(str::to_string),
    })
}

/// Derive a stable id from the record's content so that re-extracting the
/// same blob yields the same id. Records with nothing to hash get a
/// time+random id.
fn synthesize_id(url: Option<&str>, title: Option<&str>, summary: &str, now: DateTime<Utc>) -> String {
    let seed = match (url, title) {
        (Some(url), _) => url.to_string(),
        (None, Some(title)) => format!("{title}\n{summary}"),
        (None, None) if !summary.is_empty() => format!("\n{summary}"),
        (None, None) => {
            let random = Uuid::new_v4().simple().to_string();
            return format!("art-{}-{}", now.timestamp_millis(), &random[..8]);
        }
    };
    let digest = Sha256::digest(seed.as_bytes());
    format!("art-{}", &hex::encode(digest)[..16])
}

/// `www.lequipe.fr` -> `lequipe.fr`
pub fn site_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// `source` is a string in scraped data and `{id, name}` in news-API data.
fn source_name(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("source")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(inner) => first_str(inner, &["name", "id"]),
        _ => None,
    }
}

fn categories(value: Option<&Value>) -> Vec<Category> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(tag) => Some(Category::Tag(tag.clone())),
            Value::Object(obj) => {
                let tag = first_str(obj, &["tag", "name"])?;
                match obj.get("confidence").and_then(as_f64_lenient) {
                    Some(confidence) => Some(Category::Scored { tag, confidence }),
                    None => Some(Category::Tag(tag)),
                }
            }
            _ => None,
        })
        .collect()
}

fn key_entities(value: Option<&Value>) -> KeyEntities {
    let Some(obj) = value.and_then(Value::as_object) else {
        return KeyEntities::default();
    };
    let list = |key: &str| -> Vec<String> {
        obj.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    KeyEntities {
        teams: list("teams"),
        players: list("players"),
        amounts: list("amounts"),
        dates: list("dates"),
        competitions: list("competitions"),
        locations: list("locations"),
    }
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn passthrough(obj: &Map<String, Value>, key: &str) -> Option<Value> {
    obj.get(key).filter(|v| !v.is_null()).cloned()
}

fn as_f64_lenient(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 28, 12, 0, 0).unwrap()
    }

    #[test]
    fn full_record_maps_fields() {
        let raw = json!({
            "article_id": "test-article-1",
            "url": "https://www.example.com/article-1",
            "title": "Transfer News",
            "body": "Long body text.",
            "summary": "Short summary.",
            "publish_date": "2025-12-28T10:00:00",
            "language": "en",
            "region": "eu",
            "categories": ["transfer", {"tag": "football", "confidence": 0.7}],
            "key_entities": {"teams": ["Team A"], "players": null},
            "content_quality": "high",
            "confidence": 0.85,
            "x_post": "Breaking!",
            "merged_from_urls": ["https://othernews.com/same-story"],
            "source_type": "api"
        });

        let article = normalize_article(&raw, SourceType::Scraped, Some("k.jsonl"), now()).unwrap();
        assert_eq!(article.article_id, "test-article-1");
        assert!(!article.id_synthesized);
        assert_eq!(article.original_url, "https://www.example.com/article-1");
        assert_eq!(article.summary, "Short summary.");
        assert_eq!(article.source, "example.com");
        assert_eq!(article.categories.len(), 2);
        assert_eq!(article.key_entities.teams, vec!["Team A"]);
        assert!(article.key_entities.players.is_empty());
        assert_eq!(article.content_quality, ContentQuality::High);
        assert_eq!(article.source_type, SourceType::Scraped);
        assert_eq!(article.origin_key.as_deref(), Some("k.jsonl"));
        assert_eq!(article.merged_from_urls.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn sparse_record_gets_defaults() {
        let raw = json!({"url": "https://fanatik.com.tr/x", "language": "tr"});
        let article = normalize_article(&raw, SourceType::Api, None, now()).unwrap();

        assert_eq!(article.title, "Untitled");
        assert_eq!(article.summary, "");
        assert_eq!(article.source, "fanatik.com.tr");
        assert_eq!(article.publish_date, "2025-12-28T12:00:00Z");
        assert_eq!(article.content_quality, ContentQuality::Medium);
        assert_eq!(article.confidence, 0.5);
        assert_eq!(article.region, "tr");
        assert!(article.id_synthesized);
        assert!(article.article_id.starts_with("art-"));
        assert_eq!(article.key_entities, KeyEntities::default());
    }

    #[test]
    fn summary_falls_back_in_priority_order() {
        let raw = json!({"title": "t", "content": "from content", "description": "from description"});
        let article = normalize_article(&raw, SourceType::Api, None, now()).unwrap();
        assert_eq!(article.summary, "from content");

        let raw = json!({"title": "t", "description": "from description"});
        let article = normalize_article(&raw, SourceType::Api, None, now()).unwrap();
        assert_eq!(article.summary, "from description");
    }

    #[test]
    fn news_api_source_object_uses_name() {
        let raw = json!({"url": "https://bbc.co.uk/a", "source": {"id": "bbc", "name": "BBC Sport"}});
        let article = normalize_article(&raw, SourceType::Api, None, now()).unwrap();
        assert_eq!(article.source, "BBC Sport");
    }

    #[test]
    fn original_url_falls_back_to_upstream_id() {
        let raw = json!({"article_id": "abc", "title": "t"});
        let article = normalize_article(&raw, SourceType::Processed, None, now()).unwrap();
        assert_eq!(article.original_url, "abc");
        assert_eq!(article.confidence, 0.7);
    }

    #[test]
    fn synthesized_id_is_stable() {
        let raw = json!({"url": "https://example.com/a", "title": "t"});
        let a = normalize_article(&raw, SourceType::Api, None, now()).unwrap();
        let b = normalize_article(&raw, SourceType::Api, None, now()).unwrap();
        assert_eq!(a.article_id, b.article_id);
    }

    #[test]
    fn confidence_is_clamped() {
        let raw = json!({"title": "t", "confidence": "1.7"});
        let article = normalize_article(&raw, SourceType::Api, None, now()).unwrap();
        assert_eq!(article.confidence, 1.0);
    }

    #[test]
    fn non_object_is_rejected() {
        let err = normalize_article(&json!("nope"), SourceType::Api, None, now()).unwrap_err();
        assert_eq!(err, NormalizeError::NotAnObject("string"));
    }
}
