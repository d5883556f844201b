//! Known layouts of a single JSONL line.
//!
//! Shapes are tried in [`RecordShape::PRIORITY`] order and the first
//! match wins. The order is load-bearing: a model-response line also looks
//! like a plain object, and a prediction wrapper is only recognised once
//! the line failed to look like an article.

use serde_json::Value;
use thiserror::Error;

const ARTICLE_MARKERS: [&str; 4] = ["article_id", "url", "original_url", "title"];
const ARTICLE_LIST_FIELDS: [&str; 2] = ["articles", "processed_articles"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("model response carries no text part")]
    EmptyModelResponse,
    #[error("embedded JSON in model response is invalid: {0}")]
    EmbeddedJson(String),
    #[error("line matches no known record shape")]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// `{response: {candidates: [{content: {parts: [{text}]}}]}}` where the
    /// text is JSON, possibly inside a markdown fence.
    ModelResponse,
    /// A single article object.
    DirectArticle,
    /// A bare array of articles.
    ArticleArray,
    /// `{prediction: article | [article]}`.
    PredictionWrapper,
}

impl RecordShape {
    pub const PRIORITY: [RecordShape; 4] = [
        RecordShape::ModelResponse,
        RecordShape::DirectArticle,
        RecordShape::ArticleArray,
        RecordShape::PredictionWrapper,
    ];

    pub fn matches(self, value: &Value) -> bool {
        match self {
            RecordShape::ModelResponse => value
                .pointer("/response/candidates")
                .is_some_and(Value::is_array),
            RecordShape::DirectArticle => value
                .as_object()
                .is_some_and(|obj| ARTICLE_MARKERS.iter().any(|k| obj.contains_key(*k))),
            RecordShape::ArticleArray => value.is_array(),
            RecordShape::PredictionWrapper => value
                .get("prediction")
                .is_some_and(|p| !p.is_null()),
        }
    }

    /// Pull the raw article records out of a value of this shape.
    pub fn records(self, value: Value) -> Result<Vec<Value>, ShapeError> {
        match self {
            RecordShape::ModelResponse => {
                let text = model_response_text(&value).ok_or(ShapeError::EmptyModelResponse)?;
                parse_embedded(&text)
            }
            RecordShape::DirectArticle => Ok(vec![value]),
            RecordShape::ArticleArray => Ok(into_array(value)),
            RecordShape::PredictionWrapper => {
                let Value::Object(mut obj) = value else {
                    return Err(ShapeError::Unrecognized);
                };
                match obj.remove("prediction") {
                    Some(Value::String(text)) => parse_embedded(&text),
                    Some(other) => Ok(payload_records(other)),
                    None => Err(ShapeError::Unrecognized),
                }
            }
        }
    }
}

/// Classify a parsed line and return its article records.
pub fn line_records(value: Value) -> Result<(RecordShape, Vec<Value>), ShapeError> {
    let shape = RecordShape::PRIORITY
        .into_iter()
        .find(|shape| shape.matches(&value))
        .ok_or(ShapeError::Unrecognized)?;
    Ok((shape, shape.records(value)?))
}

/// Concatenated text parts of the first candidate.
fn model_response_text(value: &Value) -> Option<String> {
    let parts = value
        .pointer("/response/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

fn parse_embedded(text: &str) -> Result<Vec<Value>, ShapeError> {
    let body = strip_markdown_fence(text);
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| ShapeError::EmbeddedJson(e.to_string()))?;
    Ok(payload_records(parsed))
}

/// Records held by a decoded payload: an array, an object wrapping an
/// article list, or a single article.
pub fn payload_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            let list = ARTICLE_LIST_FIELDS
                .iter()
                .find(|field| obj.get(**field).is_some_and(Value::is_array))
                .and_then(|field| obj.remove(*field));
            match list {
                Some(list) => into_array(list),
                None => vec![Value::Object(obj)],
            }
        }
        _ => Vec::new(),
    }
}

/// Remove a surrounding ```` ```json ... ``` ```` fence, if any.
pub fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn into_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}
