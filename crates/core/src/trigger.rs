//! Validates job-trigger requests and publishes them to the job queue.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::clock::Clock;
use crate::preferences::UserScraperConfig;
use crate::queue::{MessageQueue, QueueError};
use crate::source::Region;

pub const MIN_SCRAPE_DEPTH: u8 = 1;
pub const MAX_SCRAPE_DEPTH: u8 = 3;
pub const MAX_NEWS_API_RESULTS: u32 = 100;
pub const DEFAULT_TIME_RANGE: &str = "last_24_hours";
pub const DEFAULT_MAX_RESULTS: u32 = 50;
pub const TIME_RANGES: [&str; 4] = ["last_hour", "last_24_hours", "last_week", "last_month"];

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("failed to encode job payload: {0}")]
    Encode(#[from] serde_json::Error),
}

fn invalid(message: impl Into<String>) -> TriggerError {
    TriggerError::Validation(message.into())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperTriggerRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub region: String,
    pub scrape_depth: Option<u8>,
    pub persist: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewsApiTriggerRequest {
    #[serde(default)]
    pub keywords: Vec<String>,
    pub time_range: Option<String>,
    pub max_results: Option<u32>,
}

/// Defaults the dashboard uses to prefill the news-API fetcher form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsApiConfig {
    pub default_keywords: Vec<String>,
    pub default_time_range: String,
    pub default_max_results: u32,
    pub available_time_ranges: Vec<String>,
}

impl NewsApiConfig {
    /// Keywords of every region in `scraper`, merged without duplicates.
    pub fn for_scraper_config(scraper: &UserScraperConfig) -> Self {
        let mut default_keywords: Vec<String> = Vec::new();
        for keyword in scraper.eu.keywords.iter().chain(&scraper.tr.keywords) {
            let keyword = keyword.trim();
            if !keyword.is_empty() && !default_keywords.iter().any(|k| k == keyword) {
                default_keywords.push(keyword.to_string());
            }
        }
        Self {
            default_keywords,
            default_time_range: DEFAULT_TIME_RANGE.to_string(),
            default_max_results: DEFAULT_MAX_RESULTS,
            available_time_ranges: TIME_RANGES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self::for_scraper_config(&UserScraperConfig::default())
    }
}

#[derive(Debug, Serialize)]
struct ScraperJob<'a> {
    urls: &'a [String],
    keywords: &'a [String],
    region: &'a str,
    scrape_depth: u8,
    persist: bool,
    triggered_by: &'a str,
    triggered_at: String,
}

#[derive(Debug, Serialize)]
struct NewsApiJob<'a> {
    keywords: &'a [String],
    time_range: &'a str,
    max_results: u32,
    triggered_by: &'a str,
    triggered_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse<T> {
    pub success: bool,
    pub message_id: String,
    pub triggered_by: String,
    #[serde(flatten)]
    pub details: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperTriggered {
    pub region: String,
    pub sources_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsApiTriggered {
    pub keywords: Vec<String>,
}

/// Topic names the two job kinds are published to.
#[derive(Debug, Clone)]
pub struct JobTopics {
    pub scraper: String,
    pub news_api: String,
}

#[derive(Clone)]
pub struct JobTrigger {
    queue: Arc<dyn MessageQueue>,
    topics: JobTopics,
    clock: Arc<dyn Clock>,
}

impl JobTrigger {
    pub fn new(queue: Arc<dyn MessageQueue>, topics: JobTopics, clock: Arc<dyn Clock>) -> Self {
        Self { queue, topics, clock }
    }

    pub async fn trigger_scraper(
        &self,
        request: ScraperTriggerRequest,
        triggered_by: &str,
    ) -> Result<TriggerResponse<ScraperTriggered>, TriggerError> {
        let urls = validate_urls(&request.urls)?;
        let keywords = clean_keywords(&request.keywords);
        let region = match request.region.parse::<Region>() {
            Ok(Region::Named(name)) => name,
            _ => return Err(invalid(format!("region must be one of eu, tr (got '{}')", request.region))),
        };
        let scrape_depth = request.scrape_depth.unwrap_or(MIN_SCRAPE_DEPTH);
        if !(MIN_SCRAPE_DEPTH..=MAX_SCRAPE_DEPTH).contains(&scrape_depth) {
            return Err(invalid(format!(
                "scrape_depth must be between {MIN_SCRAPE_DEPTH} and {MAX_SCRAPE_DEPTH}"
            )));
        }

        let job = ScraperJob {
            urls: &urls,
            keywords: &keywords,
            region: &region,
            scrape_depth,
            persist: request.persist.unwrap_or(true),
            triggered_by,
            triggered_at: self.timestamp(),
        };
        let message_id = self.publish(&self.topics.scraper, "scraper", &job, triggered_by).await?;

        tracing::info!(
            message_id = message_id.as_str(),
            region = region.as_str(),
            sources = urls.len(),
            triggered_by,
            "Triggered scraper job"
        );

        Ok(TriggerResponse {
            success: true,
            message_id,
            triggered_by: triggered_by.to_string(),
            details: ScraperTriggered {
                region,
                sources_count: urls.len(),
            },
        })
    }

    pub async fn trigger_news_api(
        &self,
        request: NewsApiTriggerRequest,
        triggered_by: &str,
    ) -> Result<TriggerResponse<NewsApiTriggered>, TriggerError> {
        let keywords = clean_keywords(&request.keywords);
        if keywords.is_empty() {
            return Err(invalid("at least one keyword is required"));
        }
        let time_range = request.time_range.as_deref().unwrap_or(DEFAULT_TIME_RANGE);
        if !TIME_RANGES.contains(&time_range) {
            return Err(invalid(format!(
                "time_range must be one of {} (got '{time_range}')",
                TIME_RANGES.join(", ")
            )));
        }
        let max_results = request.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if !(1..=MAX_NEWS_API_RESULTS).contains(&max_results) {
            return Err(invalid(format!("max_results must be between 1 and {MAX_NEWS_API_RESULTS}")));
        }

        let job = NewsApiJob {
            keywords: &keywords,
            time_range,
            max_results,
            triggered_by,
            triggered_at: self.timestamp(),
        };
        let message_id = self.publish(&self.topics.news_api, "news_api", &job, triggered_by).await?;

        tracing::info!(
            message_id = message_id.as_str(),
            keywords = keywords.len(),
            triggered_by,
            "Triggered news-API fetch"
        );

        Ok(TriggerResponse {
            success: true,
            message_id,
            triggered_by: triggered_by.to_string(),
            details: NewsApiTriggered { keywords },
        })
    }

    async fn publish<T: Serialize>(
        &self,
        topic: &str,
        job_kind: &str,
        job: &T,
        triggered_by: &str,
    ) -> Result<String, TriggerError> {
        let payload = serde_json::to_vec(job)?;
        let attributes = HashMap::from([
            ("job".to_string(), job_kind.to_string()),
            ("triggered_by".to_string(), triggered_by.to_string()),
        ]);
        Ok(self.queue.publish(topic, &payload, attributes).await?)
    }

    fn timestamp(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

fn validate_urls(urls: &[String]) -> Result<Vec<String>, TriggerError> {
    let urls: Vec<String> = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        return Err(invalid("at least one source url is required"));
    }
    for raw in &urls {
        let parsed = Url::parse(raw).map_err(|e| invalid(format!("invalid url '{raw}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("url '{raw}' must use http or https")));
        }
    }
    Ok(urls)
}

fn clean_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
