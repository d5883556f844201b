use std::sync::Arc;

use chrono::Duration;
use newsroom_core::access::AccessLists;
use newsroom_core::cache::DateCache;
use newsroom_core::clock::Clock;
use newsroom_core::identity::IdentityVerifier;
use newsroom_core::preferences::PreferencesStore;
use newsroom_core::queue::MessageQueue;
use newsroom_core::storage::ObjectStore;
use newsroom_core::trigger::{JobTopics, JobTrigger};
use newsroom_core::ReconciliationService;

use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: AppConfig,
    articles: ReconciliationService,
    access: AccessLists,
    verifier: Arc<dyn IdentityVerifier>,
    preferences: PreferencesStore,
    trigger: JobTrigger,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn MessageQueue>,
        verifier: Arc<dyn IdentityVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = DateCache::new(Duration::seconds(config.article_cache_ttl_secs), clock.clone());
        let articles = ReconciliationService::new(store.clone(), cache, clock.clone());
        let access = AccessLists::with_ttl(
            store.clone(),
            clock.clone(),
            Duration::seconds(config.access_cache_ttl_secs),
        );
        let preferences = PreferencesStore::new(store, clock.clone());
        let topics = JobTopics {
            scraper: config.scraper_topic.clone(),
            news_api: config.news_api_topic.clone(),
        };
        let trigger = JobTrigger::new(queue, topics, clock);

        Self {
            inner: Arc::new(InnerState {
                config,
                articles,
                access,
                verifier,
                preferences,
                trigger,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn articles(&self) -> &ReconciliationService {
        &self.inner.articles
    }

    pub fn access(&self) -> &AccessLists {
        &self.inner.access
    }

    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.inner.verifier.as_ref()
    }

    pub fn preferences(&self) -> &PreferencesStore {
        &self.inner.preferences
    }

    pub fn trigger(&self) -> &JobTrigger {
        &self.inner.trigger
    }
}
