//! The article query pipeline: per-date cache, fetch and extract on miss,
//! then dedupe and filter.

pub mod error;

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::article::Article;
use crate::cache::{DateCache, DateKey};
use crate::clock::Clock;
use crate::dedup::{dedupe, filter_region, filter_search};
use crate::extract::{extract_blob, FileFormat};
use crate::ownership::{filter_by_owner, resolve_target, Caller, OwnershipFilter};
use crate::source::{expand_dates, DateSelector, Namespace, Region};
use crate::storage::{ObjectStore, StoreError};

pub use error::ReconcileError;

/// Dates fetched from the store at the same time on a cache miss.
pub const MAX_CONCURRENT_DATE_FETCHES: usize = 8;

/// One article query, as parsed from the request.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Raw region selector; validated by [`ReconciliationService::get_articles`].
    pub region: String,
    pub dates: DateSelector,
    pub ownership: OwnershipFilter,
    pub search: Option<String>,
    /// Skip cache reads. Fresh results are still written back.
    pub bypass_cache: bool,
}

#[derive(Clone)]
pub struct ReconciliationService {
    store: Arc<dyn ObjectStore>,
    cache: DateCache,
    clock: Arc<dyn Clock>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn ObjectStore>, cache: DateCache, clock: Arc<dyn Clock>) -> Self {
        Self { store, cache, clock }
    }

    pub fn cache(&self) -> &DateCache {
        &self.cache
    }

    pub async fn get_articles(
        &self,
        query: &ArticleQuery,
        caller: Option<&Caller>,
    ) -> Result<Vec<Article>, ReconcileError> {
        let region: Region = query.region.parse()?;
        let owner = resolve_target(&query.ownership, caller)?;
        let dates = expand_dates(query.dates, self.clock.today())?;

        let articles = self
            .resolve(&region, &dates, query.bypass_cache)
            .await
            .map_err(|source| ReconcileError::Upstream {
                region: region.to_string(),
                dates: dates.clone(),
                source,
            })?;

        let fetched = articles.len();
        let mut articles = filter_region(dedupe(articles), region.as_str());
        if let Some(owner) = owner.as_deref() {
            articles = filter_by_owner(self.store.as_ref(), articles, owner).await;
        }
        if let Some(search) = query.search.as_deref() {
            articles = filter_search(articles, search);
        }

        tracing::info!(
            region = region.as_str(),
            days = dates.len(),
            fetched,
            returned = articles.len(),
            ownership = %query.ownership,
            "Served article query"
        );

        if articles.is_empty() {
            return Err(ReconcileError::NotFound {
                region: region.to_string(),
                dates,
            });
        }
        Ok(articles)
    }

    /// Articles for every date, in date order. Cached dates are served from
    /// the cache; missed dates are fetched concurrently and written back.
    pub async fn resolve(
        &self,
        region: &Region,
        dates: &[NaiveDate],
        bypass_cache: bool,
    ) -> Result<Vec<Article>, StoreError> {
        let mut per_date: Vec<Option<Vec<Article>>> = Vec::with_capacity(dates.len());
        let mut missed: Vec<(usize, NaiveDate)> = Vec::new();

        for (idx, date) in dates.iter().enumerate() {
            let cached = if bypass_cache {
                None
            } else {
                self.cache.get(&DateKey::new(region.as_str(), *date)).await
            };
            if cached.is_none() {
                missed.push((idx, *date));
            }
            per_date.push(cached);
        }

        tracing::debug!(
            region = region.as_str(),
            hits = dates.len() - missed.len(),
            misses = missed.len(),
            "Resolved article cache"
        );

        let missed_dates: Vec<NaiveDate> = missed.iter().map(|(_, date)| *date).collect();
        let fetched: Vec<Vec<Article>> = stream::iter(missed_dates.into_iter().map(|date| self.fetch_date(region, date)))
            .buffered(MAX_CONCURRENT_DATE_FETCHES)
            .try_collect()
            .await?;

        for ((idx, date), articles) in missed.into_iter().zip(fetched) {
            self.cache
                .insert(DateKey::new(region.as_str(), date), articles.clone())
                .await;
            per_date[idx] = Some(articles);
        }

        Ok(per_date.into_iter().flatten().flatten().collect())
    }

    /// List every namespace prefix for `date` and extract each article file
    /// in key order.
    async fn fetch_date(&self, region: &Region, date: NaiveDate) -> Result<Vec<Article>, StoreError> {
        let mut articles = Vec::new();
        let mut files = 0usize;
        let mut issues = 0usize;

        for namespace in Namespace::ALL {
            for prefix in namespace.prefixes(region, date) {
                let keys = self.store.list(&prefix).await?;
                for key in keys.iter().filter(|k| FileFormat::from_key(k).is_some()) {
                    let bytes = match self.store.read(key).await {
                        Ok(bytes) => bytes,
                        // Deleted between list and read.
                        Err(e) if e.is_not_found() => continue,
                        Err(e) => return Err(e),
                    };
                    let extraction = extract_blob(&bytes, key, namespace, self.clock.now());
                    files += 1;
                    issues += extraction.issues.len();
                    articles.extend(extraction.articles);
                }
            }
        }

        tracing::debug!(
            region = region.as_str(),
            date = %date,
            files,
            issues,
            articles = articles.len(),
            "Fetched articles for date"
        );
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::SourceType;
    use crate::clock::ManualClock;
    use crate::ownership::{metadata_key, OwnershipError};
    use crate::source::DateRangeError;
    use crate::storage::InMemoryObjectStore;
    use chrono::Duration;
    use serde_json::json;

    const EU_RUN: &str = "batch_processing/eu/2025-06/2025-06-10/run-1/";
    const EU_RUN_2: &str = "batch_processing/eu/2025-06/2025-06-10/run-2/";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    struct Harness {
        store: InMemoryObjectStore,
        clock: ManualClock,
        service: ReconciliationService,
    }

    fn harness() -> Harness {
        let store = InMemoryObjectStore::new();
        let clock = ManualClock::at_date(day(10));
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let service = ReconciliationService::new(
            Arc::new(store.clone()),
            DateCache::with_default_ttl(clock_arc.clone()),
            clock_arc,
        );
        Harness { store, clock, service }
    }

    fn line(url: &str, title: &str, language: &str) -> String {
        json!({"url": url, "title": title, "language": language}).to_string()
    }

    fn query(region: &str) -> ArticleQuery {
        ArticleQuery {
            region: region.into(),
            ..ArticleQuery::default()
        }
    }

    fn ana() -> Caller {
        Caller {
            email: "ana@example.com".into(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn mixed_sources_same_url_yield_one_article() {
        let h = harness();
        h.store
            .put(
                format!("{EU_RUN}predictions.jsonl"),
                line("https://example.com/a", "Scraped A", "en"),
            )
            .await;
        h.store
            .put(
                "ingestion/api/2025-06-10/fetch.json",
                json!({"articles": [{"url": "https://example.com/a", "title": "Api A"}]}).to_string(),
            )
            .await;
        h.store
            .put(
                "ingestion/2025-06-10/enriched.json",
                json!({"processed_articles": [
                    {"original_url": "https://example.com/a", "title": "Processed A"},
                    {"original_url": "https://example.com/b", "title": "Processed B"}
                ]})
                .to_string(),
            )
            .await;

        let articles = h.service.get_articles(&query("eu"), None).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Scraped A", "Processed B"]);
        assert_eq!(articles[0].source_type, SourceType::Scraped);
        assert_eq!(articles[1].source_type, SourceType::Processed);
    }

    #[tokio::test]
    async fn cache_hit_does_no_io_and_returns_equal_result() {
        let h = harness();
        h.store
            .put(format!("{EU_RUN}p.jsonl"), line("https://example.com/a", "A", "en"))
            .await;

        let first = h.service.get_articles(&query("eu"), None).await.unwrap();
        let (lists, reads) = (h.store.list_calls(), h.store.read_calls());
        assert_eq!(lists, 3);

        let second = h.service.get_articles(&query("eu"), None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(h.store.list_calls(), lists);
        assert_eq!(h.store.read_calls(), reads);
    }

    #[tokio::test]
    async fn partial_hit_fetches_only_missing_dates_in_date_order() {
        let h = harness();
        h.store
            .put(
                "batch_processing/eu/2025-06/2025-06-09/run/p.jsonl",
                line("https://example.com/d9", "Nine", "en"),
            )
            .await;
        h.store
            .put(format!("{EU_RUN}p.jsonl"), line("https://example.com/d10", "Ten", "en"))
            .await;

        let eu = Region::Named("eu".into());
        h.service.resolve(&eu, &[day(10)], false).await.unwrap();
        let lists = h.store.list_calls();

        let articles = h.service.resolve(&eu, &[day(9), day(10)], false).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Nine", "Ten"]);
        // Only 2025-06-09 was listed.
        assert_eq!(h.store.list_calls(), lists + 3);
        assert_eq!(h.service.cache().len().await, 2);
    }

    #[tokio::test]
    async fn many_missed_dates_keep_date_order() {
        let h = harness();
        let start = day(1);
        let dates: Vec<NaiveDate> = start.iter_days().take(20).collect();
        for (n, date) in dates.iter().enumerate() {
            let prefix = format!("batch_processing/eu/{}/{}/run/", date.format("%Y-%m"), date);
            h.store
                .put(
                    format!("{prefix}p.jsonl"),
                    line(&format!("https://example.com/{n}"), &format!("Day {n}"), "en"),
                )
                .await;
        }

        let eu = Region::Named("eu".into());
        let articles = h.service.resolve(&eu, &dates, false).await.unwrap();
        let titles: Vec<String> = articles.into_iter().map(|a| a.title).collect();
        let expected: Vec<String> = (0..20).map(|n| format!("Day {n}")).collect();
        assert_eq!(titles, expected);
        assert_eq!(h.store.list_calls(), 20 * 3);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let h = harness();
        h.store
            .put(format!("{EU_RUN}p.jsonl"), line("https://example.com/a", "A", "en"))
            .await;
        h.service.get_articles(&query("eu"), None).await.unwrap();

        h.store
            .put(format!("{EU_RUN_2}p.jsonl"), line("https://example.com/b", "B", "en"))
            .await;
        assert_eq!(h.service.get_articles(&query("eu"), None).await.unwrap().len(), 1);

        h.clock.advance(Duration::minutes(10));
        assert_eq!(h.service.get_articles(&query("eu"), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bypass_skips_reads_but_refreshes_cache() {
        let h = harness();
        h.store
            .put(format!("{EU_RUN}p.jsonl"), line("https://example.com/a", "A", "en"))
            .await;
        h.service.get_articles(&query("eu"), None).await.unwrap();
        h.store
            .put(format!("{EU_RUN_2}p.jsonl"), line("https://example.com/b", "B", "en"))
            .await;

        let fresh = ArticleQuery {
            bypass_cache: true,
            ..query("eu")
        };
        assert_eq!(h.service.get_articles(&fresh, None).await.unwrap().len(), 2);
        let lists = h.store.list_calls();
        assert_eq!(h.service.get_articles(&query("eu"), None).await.unwrap().len(), 2);
        assert_eq!(h.store.list_calls(), lists);
    }

    #[tokio::test]
    async fn region_filter_applies_after_merge() {
        let h = harness();
        h.store
            .put(
                "ingestion/api/2025-06-10/fetch.jsonl",
                [
                    line("https://example.com/en", "English", "en"),
                    line("https://example.com/tr", "Turkish", "tr"),
                ]
                .join("\n"),
            )
            .await;

        let tr = h.service.get_articles(&query("tr"), None).await.unwrap();
        assert_eq!(tr.len(), 1);
        assert_eq!(tr[0].region, "tr");
        assert_eq!(h.service.get_articles(&query("all"), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_without_metadata_is_excluded_for_me() {
        let h = harness();
        h.store
            .put(format!("{EU_RUN}p.jsonl"), line("https://example.com/a", "Mine", "en"))
            .await;
        h.store
            .put(metadata_key(EU_RUN), json!({"triggered_by": "ana@example.com"}).to_string())
            .await;
        h.store
            .put(format!("{EU_RUN_2}p.jsonl"), line("https://example.com/b", "Unowned", "en"))
            .await;

        let mine = ArticleQuery {
            ownership: OwnershipFilter::Mine,
            ..query("eu")
        };
        let articles = h.service.get_articles(&mine, Some(&ana())).await.unwrap();
        let titles: Vec<_> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Mine"]);
    }

    #[tokio::test]
    async fn unauthorized_filter_fails_before_any_fetch() {
        let h = harness();
        let other = ArticleQuery {
            ownership: OwnershipFilter::User("bob@example.com".into()),
            ..query("eu")
        };
        let err = h.service.get_articles(&other, Some(&ana())).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Unauthorized(OwnershipError::Forbidden(_))));

        let mine = ArticleQuery {
            ownership: OwnershipFilter::Mine,
            ..query("eu")
        };
        let err = h.service.get_articles(&mine, None).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Unauthorized(OwnershipError::Unauthenticated)));
        assert_eq!(h.store.list_calls(), 0);
    }

    #[tokio::test]
    async fn bad_inputs_are_rejected() {
        let h = harness();
        let err = h.service.get_articles(&query("us"), None).await.unwrap_err();
        assert!(matches!(err, ReconcileError::BadRegion(_)));

        let reversed = ArticleQuery {
            dates: DateSelector::Range {
                start: day(10),
                end: day(1),
            },
            ..query("eu")
        };
        let err = h.service.get_articles(&reversed, None).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::InvalidDateRange(DateRangeError::StartAfterEnd { .. })
        ));
        assert_eq!(h.store.list_calls(), 0);
    }

    #[tokio::test]
    async fn oversized_window_fails_before_any_fetch() {
        let h = harness();
        let q = ArticleQuery {
            dates: DateSelector::LastNDays(u32::MAX),
            ..query("eu")
        };
        let err = h.service.get_articles(&q, None).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::InvalidDateRange(DateRangeError::TooManyDays { .. })
        ));
        assert_eq!(h.store.list_calls(), 0);
    }

    #[tokio::test]
    async fn empty_result_is_not_found() {
        let h = harness();
        let q = ArticleQuery {
            dates: DateSelector::LastNDays(3),
            ..query("eu")
        };
        match h.service.get_articles(&q, None).await.unwrap_err() {
            ReconcileError::NotFound { region, dates } => {
                assert_eq!(region, "eu");
                assert_eq!(dates, vec![day(8), day(9), day(10)]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_file_is_upstream_error() {
        let h = harness();
        let key = format!("{EU_RUN}p.jsonl");
        h.store.put(key.clone(), line("https://example.com/a", "A", "en")).await;
        h.store.fail_reads_of(key).await;

        let err = h.service.get_articles(&query("eu"), None).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Upstream { .. }));
        assert!(h.service.cache().is_empty().await);
    }

    #[tokio::test]
    async fn search_filters_results() {
        let h = harness();
        h.store
            .put(
                format!("{EU_RUN}p.jsonl"),
                [
                    line("https://example.com/a", "Tedesco signs", "en"),
                    line("https://example.com/b", "Weather", "en"),
                ]
                .join("\n"),
            )
            .await;
        let q = ArticleQuery {
            search: Some("TEDESCO".into()),
            ..query("eu")
        };
        let articles = h.service.get_articles(&q, None).await.unwrap();
        assert_eq!(articles.len(), 1);
    }
}
