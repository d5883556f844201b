//! Allow-list and admin-list, loaded from a config blob in the object store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;

use crate::cache::{TtlCache, ACCESS_LIST_CACHE_TTL_SECS};
use crate::clock::Clock;
use crate::storage::ObjectStore;

pub const ACCESS_LIST_KEY: &str = "config/allowed_users.json";

/// Used when the config blob is missing or unreadable so operators are
/// never locked out.
pub const EMERGENCY_ALLOWLIST: [&str; 1] = ["admin@newsroom.local"];

#[derive(Debug, Default, Deserialize)]
struct AccessListFile {
    #[serde(default)]
    allowed_users: Vec<String>,
    #[serde(default)]
    admin_users: Vec<String>,
}

/// Resolved allow/admin sets. Emails are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSets {
    pub allowed: HashSet<String>,
    pub admins: HashSet<String>,
}

impl AccessSets {
    fn from_file(file: AccessListFile) -> Self {
        let admins: HashSet<String> = file.admin_users.iter().map(|e| normalize_email(e)).collect();
        let mut allowed: HashSet<String> =
            file.allowed_users.iter().map(|e| normalize_email(e)).collect();
        // Every admin is implicitly allowed.
        allowed.extend(admins.iter().cloned());
        Self { allowed, admins }
    }

    pub fn emergency() -> Self {
        let emails: HashSet<String> = EMERGENCY_ALLOWLIST.iter().map(|e| normalize_email(e)).collect();
        Self {
            allowed: emails.clone(),
            admins: emails,
        }
    }

    pub fn is_allowed(&self, email: &str) -> bool {
        self.allowed.contains(&normalize_email(email))
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admins.contains(&normalize_email(email))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cached view of the access lists.
#[derive(Clone)]
pub struct AccessLists {
    store: Arc<dyn ObjectStore>,
    cache: TtlCache<(), AccessSets>,
}

impl AccessLists {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(store, clock, Duration::seconds(ACCESS_LIST_CACHE_TTL_SECS))
    }

    pub fn with_ttl(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(ttl, clock),
        }
    }

    pub async fn sets(&self) -> AccessSets {
        if let Some(sets) = self.cache.get(&()).await {
            return sets;
        }
        let sets = self.load().await;
        self.cache.insert((), sets.clone()).await;
        sets
    }

    pub async fn is_allowed(&self, email: &str) -> bool {
        self.sets().await.is_allowed(email)
    }

    pub async fn is_admin(&self, email: &str) -> bool {
        self.sets().await.is_admin(email)
    }

    async fn load(&self) -> AccessSets {
        let bytes = match self.store.read(ACCESS_LIST_KEY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = ACCESS_LIST_KEY, error = %e, "Access list unavailable, using emergency allowlist");
                return AccessSets::emergency();
            }
        };
        match serde_json::from_slice::<AccessListFile>(&bytes) {
            Ok(file) => {
                let sets = AccessSets::from_file(file);
                tracing::info!(
                    allowed = sets.allowed.len(),
                    admins = sets.admins.len(),
                    "Loaded access lists"
                );
                sets
            }
            Err(e) => {
                tracing::warn!(key = ACCESS_LIST_KEY, error = %e, "Access list is malformed, using emergency allowlist");
                AccessSets::emergency()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::InMemoryObjectStore;
    use chrono::NaiveDate;

    fn clock() -> ManualClock {
        ManualClock::at_date(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap())
    }

    #[tokio::test]
    async fn loads_and_normalizes_lists() {
        let store = InMemoryObjectStore::new();
        store
            .put(
                ACCESS_LIST_KEY,
                r#"{"allowed_users": ["Ana@Example.com"], "admin_users": ["boss@example.com"]}"#,
            )
            .await;
        let lists = AccessLists::new(Arc::new(store), Arc::new(clock()));

        assert!(lists.is_allowed("ana@example.com").await);
        assert!(lists.is_allowed("BOSS@example.com").await);
        assert!(lists.is_admin("boss@example.com").await);
        assert!(!lists.is_admin("ana@example.com").await);
        assert!(!lists.is_allowed("eve@example.com").await);
    }

    #[tokio::test]
    async fn missing_blob_falls_back_to_emergency_list() {
        let lists = AccessLists::new(Arc::new(InMemoryObjectStore::new()), Arc::new(clock()));
        assert_eq!(lists.sets().await, AccessSets::emergency());
        assert!(lists.is_admin(EMERGENCY_ALLOWLIST[0]).await);
    }

    #[tokio::test]
    async fn malformed_blob_falls_back_to_emergency_list() {
        let store = InMemoryObjectStore::new();
        store.put(ACCESS_LIST_KEY, "not json").await;
        let lists = AccessLists::new(Arc::new(store), Arc::new(clock()));
        assert_eq!(lists.sets().await, AccessSets::emergency());
    }

    #[tokio::test]
    async fn lists_are_cached_until_ttl() {
        let store = InMemoryObjectStore::new();
        store.put(ACCESS_LIST_KEY, r#"{"allowed_users": ["a@example.com"]}"#).await;
        let clock = clock();
        let lists = AccessLists::new(Arc::new(store.clone()), Arc::new(clock.clone()));

        assert!(lists.is_allowed("a@example.com").await);
        store.put(ACCESS_LIST_KEY, r#"{"allowed_users": ["b@example.com"]}"#).await;
        assert!(lists.is_allowed("a@example.com").await);
        assert_eq!(store.read_calls(), 1);

        clock.advance(Duration::minutes(5));
        assert!(lists.is_allowed("b@example.com").await);
        assert!(!lists.is_allowed("a@example.com").await);
        assert_eq!(store.read_calls(), 2);
    }
}
