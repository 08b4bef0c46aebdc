//! Role-based access control core.
//!
//! Maps subjects to roles, roles to permissions, and permissions to named
//! abilities or (route, method) pairs, answering "can this subject perform
//! this action" from a cached, invalidation-aware permission snapshot. The
//! surrounding web framework — routing, middleware, identity — consumes this
//! crate through [`Rbac`]; it is a library surface, not a service.

pub mod authz;
pub mod cache;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod models;
pub mod registrar;
pub mod resolver;
pub mod store;

use std::sync::Arc;

pub use authz::{Engine, Subject};
pub use config::{CacheConfig, PermissionConfig};
pub use errors::{Error, Result};
pub use models::{
    Permission, PermissionAttributes, PermissionFilter, PermissionNode, PermissionRef,
    PermissionWithRoles, Role, RoleAttributes, RoleRef,
};
pub use registrar::PermissionRegistrar;
pub use resolver::{Permissions, Roles};
pub use store::{EntityStore, MemoryStore, SqliteStore};

/// Fully wired RBAC core: registrar (permission cache), resolvers, and
/// authorization engine sharing one entity store. Explicit construction
/// replaces any global registry; hosts keep one instance per process (or per
/// worker, where the environment recycles them).
#[derive(Clone)]
pub struct Rbac {
    pub registrar: Arc<PermissionRegistrar>,
    pub permissions: Permissions,
    pub roles: Roles,
    pub engine: Engine,
}

impl Rbac {
    pub fn new(store: Arc<dyn EntityStore>, config: PermissionConfig) -> Self {
        let cache = cache::store_from_config(&config.cache);
        Self::with_cache_store(store, cache, config)
    }

    /// Wire with a host-provided cache backend (e.g. a distributed store
    /// shared across workers).
    pub fn with_cache_store(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn cache::CacheStore>,
        config: PermissionConfig,
    ) -> Self {
        let registrar = Arc::new(PermissionRegistrar::new(
            Arc::clone(&store),
            cache,
            config.cache.clone(),
        ));
        let hooks = hooks::InvalidationHooks::new(Arc::clone(&registrar));
        let permissions = Permissions::new(
            Arc::clone(&registrar),
            Arc::clone(&store),
            hooks.clone(),
        );
        let roles = Roles::new(Arc::clone(&store), hooks.clone());
        let engine = Engine::new(
            store,
            Arc::clone(&registrar),
            permissions.clone(),
            roles.clone(),
            hooks,
            &config,
        );

        Self {
            registrar,
            permissions,
            roles,
            engine,
        }
    }
}
