use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Construction-time configuration for the RBAC core.
///
/// The core does not read config files; the host application builds this
/// (or takes the env-seeded default) and passes it to [`crate::Rbac::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub cache: CacheConfig,
    /// `false` = single-role mode: a subject may hold at most one role, and
    /// assigning a second one fails with `RoleAlreadyExists`.
    pub model_has_multiple_roles: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache driver name: "memory", "none", or a host-registered store.
    /// Unknown names degrade to "memory" rather than failing.
    pub store: String,
    pub expiration_secs: u64,
    pub permission_cache_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: "memory".to_string(),
            expiration_secs: 60 * 60 * 24,
            permission_cache_key: "rbac.permission.cache".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            model_has_multiple_roles: false,
        }
    }
}

impl PermissionConfig {
    /// Defaults overridden by environment, for hosts that configure via env.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(store) = std::env::var("RBAC_CACHE_STORE") {
            config.cache.store = store;
        }
        if let Some(secs) = std::env::var("RBAC_CACHE_EXPIRATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.cache.expiration_secs = secs;
        }
        if let Ok(key) = std::env::var("RBAC_CACHE_KEY") {
            config.cache.permission_cache_key = key;
        }
        if let Ok(multi) = std::env::var("RBAC_MULTIPLE_ROLES") {
            config.model_has_multiple_roles =
                matches!(multi.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_single_role_with_daily_expiry() {
        let config = PermissionConfig::default();
        assert!(!config.model_has_multiple_roles);
        assert_eq!(config.cache.store, "memory");
        assert_eq!(config.cache.expiration(), Duration::from_secs(86400));
        assert_eq!(config.cache.permission_cache_key, "rbac.permission.cache");
    }
}
