//! Process-local TTL caches.
//!
//! Entries expire once `now - stored_at >= ttl`. Expired entries are only
//! evicted when looked up again; nothing sweeps the map in the background.
//! Writes overwrite unconditionally, so concurrent fills of the same key
//! resolve as last-writer-wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::article::Article;
use crate::clock::Clock;

pub const ARTICLE_CACHE_TTL_SECS: i64 = 10 * 60;
pub const ACCESS_LIST_CACHE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Cache keyed by `K` with a single TTL for every entry.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    entries: Arc<RwLock<HashMap<K, Entry<V>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, evicting it if it has expired.
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if now - entry.stored_at < self.ttl => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Re-check: another writer may have refreshed the entry meanwhile.
        if let Some(entry) = entries.get(key) {
            if now - entry.stored_at < self.ttl {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Store `value` under `key` with a fresh timestamp, replacing any
    /// previous entry.
    pub async fn insert(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries
            .write()
            .await
            .insert(key, Entry { value, stored_at });
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Key of the per-day article cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateKey {
    pub region: String,
    pub date: NaiveDate,
}

impl DateKey {
    pub fn new(region: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            region: region.into(),
            date,
        }
    }
}

/// Articles fetched for one `(region, date)`.
pub type DateCache = TtlCache<DateKey, Vec<Article>>;

impl DateCache {
    pub fn with_default_ttl(clock: Arc<dyn Clock>) -> Self {
        Self::new(Duration::seconds(ARTICLE_CACHE_TTL_SECS), clock)
    }
}
