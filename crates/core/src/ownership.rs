//! `triggered_by` filtering: keep only articles from runs a given user
//! started, as recorded in each batch's companion `metadata.json`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Deserialize;
use thiserror::Error;

use crate::access::normalize_email;
use crate::article::Article;
use crate::extract::METADATA_FILE;
use crate::source::dates::DATE_FORMAT;
use crate::storage::ObjectStore;

/// Owner recorded for runs whose metadata file does not exist.
pub const SYSTEM_IDENTITY: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnershipFilter {
    #[default]
    All,
    /// The caller's own runs.
    Mine,
    /// Runs triggered by a specific email.
    User(String),
}

impl FromStr for OwnershipFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "all" => OwnershipFilter::All,
            "me" | "my" => OwnershipFilter::Mine,
            other => OwnershipFilter::User(normalize_email(other)),
        })
    }
}

impl fmt::Display for OwnershipFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipFilter::All => f.write_str("all"),
            OwnershipFilter::Mine => f.write_str("me"),
            OwnershipFilter::User(email) => f.write_str(email),
        }
    }
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("filtering by owner requires a signed-in user")]
    Unauthenticated,
    #[error("only admins may view feeds triggered by {0}")]
    Forbidden(String),
}

/// Resolve the filter into the identity to match, or `None` for no filter.
pub fn resolve_target(
    filter: &OwnershipFilter,
    caller: Option<&Caller>,
) -> Result<Option<String>, OwnershipError> {
    match filter {
        OwnershipFilter::All => Ok(None),
        OwnershipFilter::Mine => caller
            .map(|c| Some(normalize_email(&c.email)))
            .ok_or(OwnershipError::Unauthenticated),
        OwnershipFilter::User(target) => {
            let caller = caller.ok_or(OwnershipError::Unauthenticated)?;
            if caller.is_admin || normalize_email(&caller.email) == *target {
                Ok(Some(target.clone()))
            } else {
                Err(OwnershipError::Forbidden(target.clone()))
            }
        }
    }
}

/// Directory prefix identifying the run an object belongs to.
///
/// The batch is the first path segment below the date segment; files
/// stored directly under the date directory share the date directory as
/// their batch.
pub fn batch_prefix(object_key: &str) -> Option<String> {
    let segments: Vec<&str> = object_key.split('/').collect();
    let date_idx = segments
        .iter()
        .position(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok())?;

    // segments after the date: [batch, ..., file] or [file]
    let depth = if segments.len() - date_idx > 2 {
        date_idx + 2
    } else {
        date_idx + 1
    };
    Some(format!("{}/", segments[..depth].join("/")))
}

pub fn metadata_key(batch_prefix: &str) -> String {
    format!("{batch_prefix}{METADATA_FILE}")
}

#[derive(Debug, Deserialize)]
struct RunMetadata {
    #[serde(alias = "triggeredBy")]
    triggered_by: Option<String>,
}

/// Outcome of reading one batch's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOwner {
    Known(String),
    /// The lookup itself failed; the batch is kept.
    Unavailable,
}

pub async fn lookup_owner(store: &dyn ObjectStore, batch_prefix: &str) -> RunOwner {
    let key = metadata_key(batch_prefix);
    let bytes = match store.read(&key).await {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return RunOwner::Known(SYSTEM_IDENTITY.to_string()),
        Err(e) => {
            tracing::warn!(key = key.as_str(), error = %e, "Run metadata lookup failed, keeping batch");
            return RunOwner::Unavailable;
        }
    };
    match serde_json::from_slice::<RunMetadata>(&bytes) {
        Ok(meta) => RunOwner::Known(
            meta.triggered_by
                .filter(|t| !t.trim().is_empty())
                .map(|t| normalize_email(&t))
                .unwrap_or_else(|| SYSTEM_IDENTITY.to_string()),
        ),
        Err(e) => {
            tracing::warn!(key = key.as_str(), error = %e, "Run metadata unreadable, keeping batch");
            RunOwner::Unavailable
        }
    }
}

/// Keep articles whose batch was triggered by `target`.
///
/// A batch whose metadata cannot be read is kept: older runs predate
/// ownership tagging. Metadata is read once per batch.
pub async fn filter_by_owner(store: &dyn ObjectStore, articles: Vec<Article>, target: &str) -> Vec<Article> {
    let mut batches: Vec<String> = articles
        .iter()
        .filter_map(|a| a.origin_key.as_deref().and_then(batch_prefix))
        .collect();
    batches.sort();
    batches.dedup();

    let owners: HashMap<String, RunOwner> = join_all(batches.into_iter().map(|batch| async move {
        let owner = lookup_owner(store, &batch).await;
        (batch, owner)
    }))
    .await
    .into_iter()
    .collect();

    let before = articles.len();
    let kept: Vec<Article> = articles
        .into_iter()
        .filter(|article| {
            let batch = article.origin_key.as_deref().and_then(batch_prefix);
            match batch.and_then(|b| owners.get(&b)) {
                Some(RunOwner::Known(owner)) => owner == target,
                Some(RunOwner::Unavailable) | None => true,
            }
        })
        .collect();

    tracing::debug!(owner = target, before, after = kept.len(), "Applied ownership filter");
    kept
}
