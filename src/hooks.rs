//! Cache invalidation hooks.
//!
//! Every successful create, update, or delete of a permission or role, and
//! every attach/detach of a role-permission or subject-role association,
//! flushes the permission cache synchronously before the mutating call
//! returns. Subject (user) entity writes never pass through this core and
//! therefore never flush.

use std::sync::Arc;

use crate::errors::Result;
use crate::registrar::PermissionRegistrar;

#[derive(Debug, Clone, Copy)]
pub enum EntityKind {
    Permission,
    Role,
}

impl EntityKind {
    fn as_str(self) -> &'static str {
        match self {
            EntityKind::Permission => "permission",
            EntityKind::Role => "role",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AssociationKind {
    RolePermission,
    SubjectRole,
    SubjectPermission,
}

impl AssociationKind {
    fn as_str(self) -> &'static str {
        match self {
            AssociationKind::RolePermission => "role_permission",
            AssociationKind::SubjectRole => "subject_role",
            AssociationKind::SubjectPermission => "subject_permission",
        }
    }
}

#[derive(Clone)]
pub struct InvalidationHooks {
    registrar: Arc<PermissionRegistrar>,
}

impl InvalidationHooks {
    pub fn new(registrar: Arc<PermissionRegistrar>) -> Self {
        Self { registrar }
    }

    pub async fn entity_saved(&self, kind: EntityKind) -> Result<()> {
        tracing::debug!(entity = kind.as_str(), "entity saved, flushing permission cache");
        self.registrar.forget_cached_permissions().await
    }

    pub async fn entity_deleted(&self, kind: EntityKind) -> Result<()> {
        tracing::debug!(entity = kind.as_str(), "entity deleted, flushing permission cache");
        self.registrar.forget_cached_permissions().await
    }

    pub async fn association_changed(&self, kind: AssociationKind) -> Result<()> {
        tracing::debug!(
            association = kind.as_str(),
            "association changed, flushing permission cache"
        );
        self.registrar.forget_cached_permissions().await
    }
}
