use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which pipeline produced an article. Always assigned by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Scraped,
    Api,
    Processed,
}

impl SourceType {
    /// Confidence assigned when the upstream record carries none.
    pub fn default_confidence(self) -> f64 {
        match self {
            SourceType::Scraped => 0.8,
            SourceType::Processed => 0.7,
            SourceType::Api => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentQuality {
    High,
    #[default]
    Medium,
    Low,
}

impl ContentQuality {
    /// Lenient parse; anything unrecognised is `Medium`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => ContentQuality::High,
            "low" => ContentQuality::Low,
            _ => ContentQuality::Medium,
        }
    }
}

/// A category tag. Classifier output carries a confidence, older
/// records are plain strings; both shapes round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Category {
    Scored { tag: String, confidence: f64 },
    Tag(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntities {
    pub teams: Vec<String>,
    pub players: Vec<String>,
    pub amounts: Vec<String>,
    pub dates: Vec<String>,
    pub competitions: Vec<String>,
    pub locations: Vec<String>,
}

/// Normalized news article as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub article_id: String,
    pub original_url: String,
    pub title: String,
    pub summary: String,
    pub source: String,
    pub publish_date: String,
    pub categories: Vec<Category>,
    pub key_entities: KeyEntities,
    pub content_quality: ContentQuality,
    pub confidence: f64,
    pub language: String,
    pub region: String,
    pub source_type: SourceType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_post: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_from_urls: Option<Vec<String>>,
    #[serde(rename = "_grouping_metadata", skip_serializing_if = "Option::is_none")]
    pub grouping_metadata: Option<Value>,
    #[serde(rename = "_merge_metadata", skip_serializing_if = "Option::is_none")]
    pub merge_metadata: Option<Value>,
    #[serde(rename = "_processing_metadata", skip_serializing_if = "Option::is_none")]
    pub processing_metadata: Option<Value>,

    /// `article_id` was generated locally rather than read from upstream.
    #[serde(skip)]
    pub id_synthesized: bool,
    /// Object key of the file this article was read from.
    #[serde(skip)]
    pub origin_key: Option<String>,
}

impl Article {
    /// Canonical identity used for cross-source deduplication.
    ///
    /// Synthesized ids are not a key: two records that only share a
    /// locally generated id are not known to be the same story.
    pub fn dedup_key(&self) -> Option<&str> {
        if !self.original_url.is_empty() {
            return Some(&self.original_url);
        }
        if !self.id_synthesized && !self.article_id.is_empty() {
            return Some(&self.article_id);
        }
        None
    }
}

/// Region fallback for records that carry a language but no region.
pub fn infer_region(language: &str) -> &'static str {
    if language.trim().eq_ignore_ascii_case("tr") {
        "tr"
    } else {
        "eu"
    }
}
