use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ObjectStore, StoreError};

/// In-process object store, used by tests and local development.
///
/// Counts list/read calls so callers can assert on I/O. Keys can be marked
/// as failing to simulate an unreadable object.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    lists: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects.write().await.insert(key.into(), body.into());
    }

    /// Reads of `key` fail with a non-404 error from now on.
    pub async fn fail_reads_of(&self, key: impl Into<String>) {
        self.failing.write().await.insert(key.into());
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.read().await;
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().await.contains(key) {
            return Err(StoreError::Other(format!("simulated read failure for {key}")));
        }
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), StoreError> {
        self.objects.write().await.insert(key.to_string(), body);
        Ok(())
    }
}
