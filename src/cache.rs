//! Pluggable cache backend for the permission snapshot.
//!
//! The registrar serializes the full permission set to JSON and hands it to
//! one of these stores. Hosts that share a distributed cache across workers
//! implement [`CacheStore`] themselves; invalidation across processes is
//! last-writer-wins with no distributed lock, so a remote reader may observe
//! stale data until its own TTL expires. Within one process the registrar's
//! mutex makes invalidate-then-get linearizable.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::errors::Result;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn forget(&self, key: &str) -> Result<()>;
}

/// Process-local cache honoring the configured TTL.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let deadline = Instant::now() + ttl;
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .remove(key);
        Ok(())
    }
}

/// No-op store: every `get` misses, so the registrar relies solely on its
/// in-process snapshot.
pub struct NullCacheStore;

#[async_trait]
impl CacheStore for NullCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn forget(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// Select a cache store from config. Unknown driver names degrade to the
/// in-memory store rather than failing.
pub fn store_from_config(config: &CacheConfig) -> Arc<dyn CacheStore> {
    match config.store.as_str() {
        "memory" | "array" => Arc::new(MemoryCacheStore::new()),
        "none" => Arc::new(NullCacheStore),
        other => {
            tracing::warn!(driver = %other, "unknown cache store, falling back to memory");
            Arc::new(MemoryCacheStore::new())
        }
    }
}
