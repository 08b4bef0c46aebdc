//! The permission cache: a process-local snapshot of every permission with
//! its role associations, backed by a pluggable external cache store.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::CacheStore;
use crate::config::CacheConfig;
use crate::errors::Result;
use crate::models::{PermissionFilter, PermissionWithRoles};
use crate::store::EntityStore;

/// Serves a consistent snapshot of all permissions without re-querying the
/// entity store on every check.
///
/// Lookup order on `get`: local snapshot, then the external cache store, then
/// a full eager reload from the entity store. "Never loaded" and "explicitly
/// flushed" are the same state; both trigger a reload. The snapshot mutex is
/// held across the reload so that a flush followed by a `get` is linearizable
/// within the process.
pub struct PermissionRegistrar {
    store: Arc<dyn EntityStore>,
    cache: Arc<dyn CacheStore>,
    config: CacheConfig,
    permissions: Mutex<Option<Arc<Vec<PermissionWithRoles>>>>,
}

impl PermissionRegistrar {
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            permissions: Mutex::new(None),
        }
    }

    /// All cached permissions matching the filter, a cloned slice of the
    /// snapshot. Returns an empty vec, never an error, when nothing matches.
    pub async fn get(&self, filter: &PermissionFilter) -> Result<Vec<PermissionWithRoles>> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .iter()
            .filter(|entry| filter.matches(&entry.permission))
            .cloned()
            .collect())
    }

    /// First cached permission matching the filter, if any.
    pub async fn first(&self, filter: &PermissionFilter) -> Result<Option<PermissionWithRoles>> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .iter()
            .find(|entry| filter.matches(&entry.permission))
            .cloned())
    }

    /// The menu view of the permission set.
    pub async fn menus(&self) -> Result<Vec<PermissionWithRoles>> {
        self.get(&PermissionFilter::menus()).await
    }

    /// Drop both the local snapshot and the external cache entry. Called
    /// synchronously before any triggering mutation is considered complete,
    /// so a subsequent `get` observes the write.
    pub async fn forget_cached_permissions(&self) -> Result<()> {
        let mut permissions = self.permissions.lock().await;
        *permissions = None;
        self.cache
            .forget(&self.config.permission_cache_key)
            .await?;
        tracing::debug!(key = %self.config.permission_cache_key, "permission cache flushed");
        Ok(())
    }

    async fn load(&self) -> Result<Arc<Vec<PermissionWithRoles>>> {
        let mut permissions = self.permissions.lock().await;

        if let Some(snapshot) = permissions.as_ref() {
            return Ok(Arc::clone(snapshot));
        }

        if let Some(serialized) = self.cache.get(&self.config.permission_cache_key).await? {
            match serde_json::from_str::<Vec<PermissionWithRoles>>(&serialized) {
                Ok(entries) => {
                    let snapshot = Arc::new(entries);
                    *permissions = Some(Arc::clone(&snapshot));
                    return Ok(snapshot);
                }
                Err(err) => {
                    // A corrupt entry is treated as a miss and overwritten below.
                    tracing::warn!(error = %err, "discarding undecodable permission cache entry");
                }
            }
        }

        let entries = self.store.list_permissions_with_roles().await?;
        let serialized = serde_json::to_string(&entries)
            .map_err(|err| crate::errors::Error::Cache(err.to_string()))?;
        self.cache
            .put(
                &self.config.permission_cache_key,
                &serialized,
                self.config.expiration(),
            )
            .await?;

        let snapshot = Arc::new(entries);
        *permissions = Some(Arc::clone(&snapshot));
        tracing::debug!(count = snapshot.len(), "permission cache reloaded");
        Ok(snapshot)
    }
}
