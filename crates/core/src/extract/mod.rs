//! Record extraction: one object-store blob in, normalized articles out.
//!
//! Extraction never fails as a whole. Bad lines, bad elements, and bad
//! files become [`ExtractionIssue`]s and the rest of the blob still counts.

pub mod shapes;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::article::{normalize_article, Article, SourceType};
use crate::source::Namespace;

pub use shapes::{line_records, strip_markdown_fence, RecordShape, ShapeError};

/// Name of the companion run-metadata file, never an article file.
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// One JSON value per line.
    JsonLines,
    /// A single JSON object holding an article list.
    JsonDocument,
}

impl FileFormat {
    /// Format of an article file, or `None` when the key is not one.
    pub fn from_key(key: &str) -> Option<Self> {
        let name = key.rsplit('/').next().unwrap_or(key);
        if name == METADATA_FILE {
            return None;
        }
        if name.ends_with(".jsonl") {
            Some(FileFormat::JsonLines)
        } else if name.ends_with(".json") {
            Some(FileFormat::JsonDocument)
        } else {
            None
        }
    }
}

/// A non-fatal problem found while extracting a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionIssue {
    pub key: String,
    /// 1-based line number for JSONL input.
    pub line: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub articles: Vec<Article>,
    pub issues: Vec<ExtractionIssue>,
}

impl Extraction {
    fn issue(&mut self, key: &str, line: Option<usize>, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(key, line, reason = reason.as_str(), "Skipping unreadable record");
        self.issues.push(ExtractionIssue {
            key: key.to_string(),
            line,
            reason,
        });
    }

    fn push_records(
        &mut self,
        records: Vec<Value>,
        key: &str,
        line: Option<usize>,
        source_type: SourceType,
        now: DateTime<Utc>,
    ) {
        for record in records {
            match normalize_article(&record, source_type, Some(key), now) {
                Ok(article) => self.articles.push(article),
                Err(e) => self.issue(key, line, e.to_string()),
            }
        }
    }
}

/// Extract every article in `bytes`, stamping provenance from `namespace`.
///
/// Returns an empty extraction for keys that are not article files.
pub fn extract_blob(bytes: &[u8], key: &str, namespace: Namespace, now: DateTime<Utc>) -> Extraction {
    match FileFormat::from_key(key) {
        Some(FileFormat::JsonLines) => extract_jsonl(bytes, key, namespace.source_type(), now),
        Some(FileFormat::JsonDocument) => extract_document(bytes, key, namespace.source_type(), now),
        None => Extraction::default(),
    }
}

pub fn extract_jsonl(bytes: &[u8], key: &str, source_type: SourceType, now: DateTime<Utc>) -> Extraction {
    let mut out = Extraction::default();
    let text = String::from_utf8_lossy(bytes);

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                out.issue(key, Some(line_no), format!("invalid JSON: {e}"));
                continue;
            }
        };
        match line_records(value) {
            Ok((shape, records)) => {
                tracing::trace!(key, line = line_no, ?shape, count = records.len(), "Matched line shape");
                out.push_records(records, key, Some(line_no), source_type, now);
            }
            Err(e) => out.issue(key, Some(line_no), e.to_string()),
        }
    }

    out
}

pub fn extract_document(bytes: &[u8], key: &str, source_type: SourceType, now: DateTime<Utc>) -> Extraction {
    let mut out = Extraction::default();

    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            out.issue(key, None, format!("invalid JSON: {e}"));
            return out;
        }
    };

    let list = ["articles", "processed_articles"]
        .into_iter()
        .find_map(|field| value.get(field).and_then(Value::as_array));

    match list {
        Some(items) => out.push_records(items.clone(), key, None, source_type, now),
        None => out.issue(key, None, "document has no articles or processed_articles array"),
    }

    out
}
