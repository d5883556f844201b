//! Per-user preferences stored as one JSON blob per user.

pub mod scraper_config;

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::access::normalize_email;
use crate::clock::Clock;
use crate::source::{Region, UnknownRegion};
use crate::storage::{ObjectStore, StoreError};

pub use scraper_config::{ScraperRegionConfig, ScraperSource, UserScraperConfig};

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid default region: {0}")]
    InvalidRegion(#[from] UnknownRegion),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_filter: Option<String>,
}

impl FeedSettings {
    /// Fields present in `update` replace ours.
    fn merge(&mut self, update: FeedSettings) {
        if update.default_region.is_some() {
            self.default_region = update.default_region;
        }
        if update.auto_refresh.is_some() {
            self.auto_refresh = update.auto_refresh;
        }
        if update.feed_filter.is_some() {
            self.feed_filter = update.feed_filter;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub scraper_config: Option<UserScraperConfig>,
    #[serde(default)]
    pub feed_settings: FeedSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Partial update. An explicit `"scraperConfig": null` clears the stored
/// config; an absent field leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(default, deserialize_with = "present")]
    pub scraper_config: Option<Option<UserScraperConfig>>,
    #[serde(default)]
    pub feed_settings: Option<FeedSettings>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Object key for a user's preferences. The email is hashed so keys do
/// not leak addresses.
pub fn preferences_key(email: &str) -> String {
    let digest = Sha256::digest(normalize_email(email).as_bytes());
    format!("users/{}/preferences.json", hex::encode(digest))
}

#[derive(Clone)]
pub struct PreferencesStore {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl PreferencesStore {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Stored preferences, or defaults when the user has none yet.
    pub async fn get(&self, email: &str) -> Result<UserPreferences, PreferencesError> {
        let key = preferences_key(email);
        let bytes = match self.store.read(&key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(self.defaults(email)),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<UserPreferences>(&bytes) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "Stored preferences unreadable, serving defaults");
                Ok(self.defaults(email))
            }
        }
    }

    /// Merge `update` over the current preferences and persist the result.
    /// A `defaultRegion` that is not a known region is rejected before
    /// anything is written.
    pub async fn put(&self, email: &str, update: PreferencesUpdate) -> Result<UserPreferences, PreferencesError> {
        let mut prefs = self.get(email).await?;
        let now = timestamp(self.clock.now());

        if let Some(scraper_config) = update.scraper_config {
            prefs.scraper_config = scraper_config;
        }
        if let Some(mut feed_settings) = update.feed_settings {
            if let Some(region) = feed_settings.default_region.take() {
                feed_settings.default_region = Some(region.parse::<Region>()?.to_string());
            }
            prefs.feed_settings.merge(feed_settings);
        }
        prefs.email = Some(normalize_email(email));
        prefs.created_at.get_or_insert_with(|| now.clone());
        prefs.last_updated = Some(now);

        let body = serde_json::to_vec_pretty(&prefs)?;
        self.store
            .write(&preferences_key(email), body, "application/json")
            .await?;
        tracing::info!(email, "Saved user preferences");
        Ok(prefs)
    }

    /// Region the user's feed defaults to, if they picked a valid one.
    pub async fn default_region(&self, email: &str) -> Option<String> {
        let stored = match self.get(email).await {
            Ok(prefs) => prefs.feed_settings.default_region?,
            Err(e) => {
                tracing::warn!(email, error = %e, "Could not load preferences for default region");
                return None;
            }
        };
        match stored.parse::<Region>() {
            Ok(region) => Some(region.to_string()),
            Err(e) => {
                tracing::warn!(email, error = %e, "Ignoring stored default region");
                None
            }
        }
    }

    /// The user's scraper config, falling back to the built-in defaults.
    pub async fn scraper_config(&self, email: &str) -> UserScraperConfig {
        match self.get(email).await {
            Ok(prefs) => prefs.scraper_config.unwrap_or_default(),
            Err(_) => UserScraperConfig::default(),
        }
    }

    fn defaults(&self, email: &str) -> UserPreferences {
        UserPreferences {
            email: Some(normalize_email(email)),
            ..UserPreferences::default()
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
