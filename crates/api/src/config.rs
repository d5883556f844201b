use std::env;
use std::str::FromStr;

use newsroom_core::cache::{ACCESS_LIST_CACHE_TTL_SECS, ARTICLE_CACHE_TTL_SECS};

#[derive(Debug, thiserror::Error)]
#[error("{var} has an invalid value '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
    /// Bucket holding article files. Unset runs against an in-memory store.
    pub gcs_bucket: Option<String>,
    /// Static OAuth token for the object store; otherwise the metadata server is asked.
    pub gcs_access_token: Option<String>,
    /// Project owning the job topics. Unset records jobs in memory.
    pub pubsub_project: Option<String>,
    pub scraper_topic: String,
    pub news_api_topic: String,
    /// OAuth client id that ID tokens must be issued for.
    pub google_client_id: Option<String>,
    /// Shared key accepted on `/articles` via `X-API-Key`.
    pub api_key: Option<String>,
    pub article_cache_ttl_secs: i64,
    pub access_cache_ttl_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&var, "PORT", 8080)?,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            gcs_bucket: var("GCS_BUCKET"),
            gcs_access_token: var("GCS_ACCESS_TOKEN"),
            pubsub_project: var("PUBSUB_PROJECT"),
            scraper_topic: var("SCRAPER_TOPIC").unwrap_or_else(|| "scraper-jobs".to_string()),
            news_api_topic: var("NEWS_API_TOPIC").unwrap_or_else(|| "news-api-jobs".to_string()),
            google_client_id: var("GOOGLE_CLIENT_ID"),
            api_key: var("API_KEY"),
            article_cache_ttl_secs: parsed(&var, "ARTICLE_CACHE_TTL_SECS", ARTICLE_CACHE_TTL_SECS)?,
            access_cache_ttl_secs: parsed(&var, "ACCESS_CACHE_TTL_SECS", ACCESS_LIST_CACHE_TTL_SECS)?,
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError { var: name, value: raw }),
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self::from_lookup(|_| None).unwrap()
    }
}
