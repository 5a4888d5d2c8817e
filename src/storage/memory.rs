//! In-process object store.
//!
//! Backs tests and ephemeral deployments (`STORAGE_BACKEND=memory`).
//! Supports create-only writes, counts listing calls, and can be told to
//! fail writes to a given key so callers' degradation paths can be
//! exercised.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ListPage, ObjectStore, StoreError, paginate};

/// Default number of keys returned per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Object store held entirely in memory.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    failing_keys: RwLock<HashSet<String>>,
    page_size: usize,
    list_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Creates an empty store with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates an empty store returning at most `page_size` keys per list call.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            failing_keys: RwLock::new(HashSet::new()),
            page_size: page_size.max(1),
            list_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent write to `key` fail with a transport error.
    pub async fn fail_writes_to(&self, key: &str) {
        self.failing_keys.write().await.insert(key.to_string());
    }

    /// Clears all injected write failures.
    pub async fn clear_failures(&self) {
        self.failing_keys.write().await.clear();
    }

    /// Deletes an object out-of-band, as an operator would.
    pub async fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.write().await.remove(key)
    }

    /// Returns `true` if an object exists at `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// Number of `list` calls served so far.
    #[must_use]
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn put_call_count(&self) -> usize {
        self.put_calls.load(Ordering::Relaxed)
    }

    async fn check_writable(&self, key: &str) -> Result<(), StoreError> {
        if self.failing_keys.read().await.contains(key) {
            return Err(StoreError::Transport(format!("injected failure for {key}")));
        }
        Ok(())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.check_writable(key).await?;
        self.objects.write().await.insert(key.to_string(), body);
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.check_writable(key).await?;
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), body);
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str, cursor: Option<String>) -> Result<ListPage, StoreError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        let objects = self.objects.read().await;
        let keys = objects
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix));
        Ok(paginate(keys, cursor.as_deref(), self.page_size))
    }
}
