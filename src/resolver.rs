//! Resolvers: turn heterogeneous identifiers into canonical entities with
//! strict error semantics, and own the validated create paths.

use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::hooks::{EntityKind, InvalidationHooks};
use crate::models::{
    Permission, PermissionAttributes, PermissionFilter, PermissionRef, PermissionWithRoles, Role,
    RoleAttributes, RoleRef,
};
use crate::registrar::PermissionRegistrar;
use crate::store::EntityStore;

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Permission lookup and lifecycle, served from the cache.
#[derive(Clone)]
pub struct Permissions {
    registrar: Arc<PermissionRegistrar>,
    store: Arc<dyn EntityStore>,
    hooks: InvalidationHooks,
}

impl Permissions {
    pub fn new(
        registrar: Arc<PermissionRegistrar>,
        store: Arc<dyn EntityStore>,
        hooks: InvalidationHooks,
    ) -> Self {
        Self {
            registrar,
            store,
            hooks,
        }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<PermissionWithRoles> {
        self.registrar
            .first(&PermissionFilter::by_name(name))
            .await?
            .ok_or_else(|| Error::permission_not_found(name))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<PermissionWithRoles> {
        self.registrar
            .first(&PermissionFilter::by_id(id))
            .await?
            .ok_or_else(|| Error::permission_not_found_id(id))
    }

    /// Route is normalized to a leading `/`, method to upper case, before the
    /// exact-match lookup.
    pub async fn find_by_route_and_method(
        &self,
        route: &str,
        method: &str,
    ) -> Result<PermissionWithRoles> {
        let filter = PermissionFilter::by_route_and_method(route, method);
        self.registrar.first(&filter).await?.ok_or_else(|| {
            Error::permission_not_found_route(
                filter.route.as_deref().unwrap_or(route),
                filter.method.as_deref().unwrap_or(method),
            )
        })
    }

    /// Resolve any [`PermissionRef`] to its cached entry.
    pub async fn resolve(&self, permission: &PermissionRef) -> Result<PermissionWithRoles> {
        match permission {
            PermissionRef::Name(name) => self.find_by_name(name).await,
            PermissionRef::Id(id) => self.find_by_id(*id).await,
            PermissionRef::RouteMethod { route, method } => {
                self.find_by_route_and_method(route, method).await
            }
            PermissionRef::Resolved(resolved) => self.find_by_id(resolved.id).await,
        }
    }

    /// Create a permission. A non-menu permission must carry both route and
    /// method, `name` is globally unique, and
    /// `(route, method)` is unique among non-menu permissions. The store
    /// re-validates uniqueness on insert, so a racing create still fails.
    pub async fn create(&self, mut attrs: PermissionAttributes) -> Result<Permission> {
        attrs.normalize();

        if !attrs.is_menu && (attrs.route.is_none() || attrs.method.is_none()) {
            return Err(Error::PermissionNotMenu(attrs.name.clone()));
        }

        if self
            .registrar
            .first(&PermissionFilter::by_name(&attrs.name))
            .await?
            .is_some()
        {
            return Err(Error::PermissionAlreadyExists(attrs.name.clone()));
        }

        if let (Some(route), Some(method)) = (attrs.route.as_deref(), attrs.method.as_deref()) {
            let mut filter = PermissionFilter::by_route_and_method(route, method);
            filter.is_menu = Some(false);
            if self.registrar.first(&filter).await?.is_some() {
                return Err(Error::PermissionAlreadyExists(attrs.name.clone()));
            }
        }

        let permission = self.store.insert_permission(&attrs).await?;
        self.hooks.entity_saved(EntityKind::Permission).await?;
        Ok(permission)
    }

    /// Idempotent create: an existing permission with the same name (or the
    /// same route+method pair, when given) is returned as-is.
    pub async fn find_or_create(&self, mut attrs: PermissionAttributes) -> Result<Permission> {
        attrs.normalize();

        if let Some(existing) = self
            .registrar
            .first(&PermissionFilter::by_name(&attrs.name))
            .await?
        {
            return Ok(existing.permission);
        }

        if let (Some(route), Some(method)) = (attrs.route.as_deref(), attrs.method.as_deref()) {
            if let Some(existing) = self
                .registrar
                .first(&PermissionFilter::by_route_and_method(route, method))
                .await?
            {
                return Ok(existing.permission);
            }
        }

        self.create(attrs).await
    }

    /// Persist attribute changes (rename, re-parent, re-weight).
    pub async fn update(&self, permission: &Permission) -> Result<Permission> {
        let updated = self.store.update_permission(permission).await?;
        self.hooks.entity_saved(EntityKind::Permission).await?;
        Ok(updated)
    }

    /// Delete the permission, detaching it from every role and subject.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete_permission(id).await?;
        self.hooks.entity_deleted(EntityKind::Permission).await
    }
}

// =============================================================================
// ROLES
// =============================================================================

/// Role lookup and lifecycle. Roles are small and rarely looked up, so they
/// go straight to the entity store instead of the permission cache.
#[derive(Clone)]
pub struct Roles {
    store: Arc<dyn EntityStore>,
    hooks: InvalidationHooks,
}

impl Roles {
    pub fn new(store: Arc<dyn EntityStore>, hooks: InvalidationHooks) -> Self {
        Self { store, hooks }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Role> {
        self.store
            .find_role_by_name(name)
            .await?
            .ok_or_else(|| Error::role_not_found(name))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Role> {
        self.store
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| Error::role_not_found_id(id))
    }

    pub async fn resolve(&self, role: &RoleRef) -> Result<Role> {
        match role {
            RoleRef::Name(name) => self.find_by_name(name).await,
            RoleRef::Id(id) => self.find_by_id(*id).await,
            RoleRef::Resolved(role) => Ok(role.clone()),
        }
    }

    pub async fn create(&self, attrs: RoleAttributes) -> Result<Role> {
        if self.store.find_role_by_name(&attrs.name).await?.is_some() {
            return Err(Error::role_already_exists(&attrs.name));
        }

        let role = self.store.insert_role(&attrs).await?;
        self.hooks.entity_saved(EntityKind::Role).await?;
        Ok(role)
    }

    pub async fn find_or_create(&self, attrs: RoleAttributes) -> Result<Role> {
        match self.store.find_role_by_name(&attrs.name).await? {
            Some(role) => Ok(role),
            None => self.create(attrs).await,
        }
    }

    /// Persist attribute changes (rename, new display name). The cached
    /// permission entries carry role ids, so a rename invalidates them too.
    pub async fn update(&self, role: &Role) -> Result<Role> {
        let updated = self.store.update_role(role).await?;
        self.hooks.entity_saved(EntityKind::Role).await?;
        Ok(updated)
    }

    /// Delete the role, detaching its permissions and subjects.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete_role(id).await?;
        self.hooks.entity_deleted(EntityKind::Role).await
    }

    pub async fn list(&self) -> Result<Vec<Role>> {
        self.store.list_roles().await
    }
}
