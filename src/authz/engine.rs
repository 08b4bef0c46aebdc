//! The authorization engine: composes the resolvers and the permission cache
//! to answer has-role / has-permission questions and to mutate role and
//! permission assignments.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::PermissionConfig;
use crate::errors::{Error, Result};
use crate::hooks::{AssociationKind, InvalidationHooks};
use crate::models::{
    Permission, PermissionFilter, PermissionNode, PermissionRef, PermissionWithRoles, Role,
    RoleRef,
};
use crate::registrar::PermissionRegistrar;
use crate::resolver::{Permissions, Roles};
use crate::store::EntityStore;

use super::tree::build_tree;
use super::Subject;

#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn EntityStore>,
    registrar: Arc<PermissionRegistrar>,
    permissions: Permissions,
    roles: Roles,
    hooks: InvalidationHooks,
    multiple_roles: bool,
}

impl Engine {
    pub fn new(
        store: Arc<dyn EntityStore>,
        registrar: Arc<PermissionRegistrar>,
        permissions: Permissions,
        roles: Roles,
        hooks: InvalidationHooks,
        config: &PermissionConfig,
    ) -> Self {
        Self {
            store,
            registrar,
            permissions,
            roles,
            hooks,
            multiple_roles: config.model_has_multiple_roles,
        }
    }

    // =========================================================================
    // PERMISSION CHECKS (subject side)
    // =========================================================================

    /// Strict permission check. Resolution failures propagate as
    /// `PermissionNotFound`; a permission that resolves to a menu node
    /// propagates as `PermissionIsMenu` (menu nodes are navigational, so the
    /// caller decides whether that means "granted" — see
    /// [`check_permission_to`](Self::check_permission_to)).
    pub async fn has_permission_to(
        &self,
        subject: &Subject,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let resolved = self.resolve_actionable(&permission.into()).await?;

        let role_ids: HashSet<i64> = self
            .store
            .subject_roles(subject)
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();

        if resolved.role_ids.iter().any(|id| role_ids.contains(id)) {
            tracing::debug!(
                subject = %subject.subject_id,
                permission = %resolved.permission.name,
                "permission granted via role"
            );
            return Ok(true);
        }

        let direct = self.store.subject_permission_ids(subject).await?;
        let granted = direct.contains(&resolved.permission.id);
        tracing::debug!(
            subject = %subject.subject_id,
            permission = %resolved.permission.name,
            granted,
            "direct permission check"
        );
        Ok(granted)
    }

    /// Non-throwing convenience wrapper around
    /// [`has_permission_to`](Self::has_permission_to): an unresolvable
    /// permission denies (`false`) while a menu node grants (`true`), since
    /// menu nodes are navigational rather than gated. Other errors still
    /// propagate.
    pub async fn check_permission_to(
        &self,
        subject: &Subject,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        match self.has_permission_to(subject, permission).await {
            Ok(granted) => Ok(granted),
            Err(Error::PermissionNotFound(_)) => Ok(false),
            Err(Error::PermissionIsMenu(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }

    /// OR semantics: true on the first permission the subject holds.
    pub async fn has_any_permission(
        &self,
        subject: &Subject,
        permissions: Vec<PermissionRef>,
    ) -> Result<bool> {
        for permission in permissions {
            if self.check_permission_to(subject, permission).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// AND semantics, fail-fast: the first resolution failure propagates and
    /// the first missing permission returns false.
    pub async fn has_all_permissions(
        &self,
        subject: &Subject,
        permissions: Vec<PermissionRef>,
    ) -> Result<bool> {
        for permission in permissions {
            if !self.has_permission_to(subject, permission).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // =========================================================================
    // PERMISSION CHECKS (role side)
    // =========================================================================

    /// Strict check whether a single role holds the permission.
    pub async fn role_has_permission_to(
        &self,
        role: &Role,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        let resolved = self.resolve_actionable(&permission.into()).await?;
        Ok(resolved.role_ids.contains(&role.id))
    }

    /// Non-throwing counterpart; same not-found/is-menu policy as
    /// [`check_permission_to`](Self::check_permission_to).
    pub async fn role_check_permission_to(
        &self,
        role: &Role,
        permission: impl Into<PermissionRef>,
    ) -> Result<bool> {
        match self.role_has_permission_to(role, permission).await {
            Ok(granted) => Ok(granted),
            Err(Error::PermissionNotFound(_)) => Ok(false),
            Err(Error::PermissionIsMenu(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // ROLE CHECKS
    // =========================================================================

    /// OR semantics over the given alternatives, matching by name, id, or
    /// entity identity.
    pub async fn has_role(&self, subject: &Subject, roles: &[RoleRef]) -> Result<bool> {
        let held = self.store.subject_roles(subject).await?;
        for role in roles {
            let matched = match role {
                RoleRef::Name(name) => held.iter().any(|r| r.name == *name),
                RoleRef::Id(id) => held.iter().any(|r| r.id == *id),
                RoleRef::Resolved(role) => held.iter().any(|r| r.id == role.id),
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Pipe-delimited convenience: `"writer|editor"` is true when the
    /// subject holds either role.
    pub async fn has_role_named(&self, subject: &Subject, roles: &str) -> Result<bool> {
        self.has_role(subject, &RoleRef::parse_pipes(roles)).await
    }

    /// Alias of [`has_role`](Self::has_role).
    pub async fn has_any_role(&self, subject: &Subject, roles: &[RoleRef]) -> Result<bool> {
        self.has_role(subject, roles).await
    }

    /// AND semantics: the subject's role-name set must cover every requested
    /// role. Id references are resolved to names first.
    pub async fn has_all_roles(&self, subject: &Subject, roles: &[RoleRef]) -> Result<bool> {
        let held: HashSet<String> = self
            .store
            .subject_roles(subject)
            .await?
            .into_iter()
            .map(|role| role.name)
            .collect();

        for role in roles {
            let name = match role {
                RoleRef::Name(name) => name.clone(),
                RoleRef::Resolved(role) => role.name.clone(),
                RoleRef::Id(id) => self.roles.find_by_id(*id).await?.name,
            };
            if !held.contains(&name) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn get_all_roles(&self, subject: &Subject) -> Result<Vec<Role>> {
        self.store.subject_roles(subject).await
    }

    pub async fn get_role_names(&self, subject: &Subject) -> Result<Vec<String>> {
        Ok(self
            .get_all_roles(subject)
            .await?
            .into_iter()
            .map(|role| role.name)
            .collect())
    }

    /// The subject's first (primary) role. Fails with an `Unauthorized`
    /// condition when no role is assigned, for the adapter to surface as 403.
    pub async fn get_first_role(&self, subject: &Subject) -> Result<Role> {
        self.get_all_roles(subject)
            .await?
            .into_iter()
            .next()
            .ok_or_else(Error::not_assigned_role)
    }

    // =========================================================================
    // ROLE ASSIGNMENT
    // =========================================================================

    /// Assign roles additively (existing assignments are kept). In
    /// single-role mode, requesting more than one role, or a role different
    /// from the one already held, fails with `RoleAlreadyExists`. Flushes the
    /// permission cache and returns the subject's fresh role set.
    pub async fn assign_role(&self, subject: &Subject, roles: &[RoleRef]) -> Result<Vec<Role>> {
        self.check_multiple_role(subject, roles, true).await?;

        for role in roles {
            let resolved = self.roles.resolve(role).await?;
            self.store.attach_role_to_subject(subject, resolved.id).await?;
        }

        self.hooks
            .association_changed(AssociationKind::SubjectRole)
            .await?;
        self.store.subject_roles(subject).await
    }

    /// Revoke one role; returns the fresh role set.
    pub async fn remove_role(
        &self,
        subject: &Subject,
        role: impl Into<RoleRef>,
    ) -> Result<Vec<Role>> {
        let resolved = self.roles.resolve(&role.into()).await?;
        self.store
            .detach_role_from_subject(subject, resolved.id)
            .await?;

        self.hooks
            .association_changed(AssociationKind::SubjectRole)
            .await?;
        self.store.subject_roles(subject).await
    }

    /// Detach all current roles, then assign the given set. An empty set
    /// leaves the subject with zero roles.
    pub async fn sync_roles(&self, subject: &Subject, roles: &[RoleRef]) -> Result<Vec<Role>> {
        self.check_multiple_role(subject, roles, false).await?;

        self.store.detach_all_roles_from_subject(subject).await?;

        if roles.is_empty() {
            self.hooks
                .association_changed(AssociationKind::SubjectRole)
                .await?;
            return Ok(Vec::new());
        }

        self.assign_role(subject, roles).await
    }

    /// Single-role mode enforcement. `given` controls whether the subject's
    /// current assignment is held against the request (it is not for
    /// `sync_roles`, which detaches first).
    async fn check_multiple_role(
        &self,
        subject: &Subject,
        roles: &[RoleRef],
        given: bool,
    ) -> Result<()> {
        if self.multiple_roles {
            return Ok(());
        }

        if roles.len() > 1 {
            return Err(Error::multiple_roles_not_supported());
        }

        if given {
            if let Some(current) = self.store.subject_roles(subject).await?.into_iter().next() {
                if let Some(requested) = roles.first() {
                    let resolved = self.roles.resolve(requested).await?;
                    if resolved.id != current.id {
                        return Err(Error::role_already_assigned(&current.name));
                    }
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // ROLE-PERMISSION GRANTS
    // =========================================================================

    /// Grant permissions to a role additively. Every reference must resolve;
    /// a missing permission fails the whole call.
    pub async fn give_permission_to(&self, role: &Role, permissions: &[PermissionRef]) -> Result<()> {
        for permission in permissions {
            let resolved = self.permissions.resolve(permission).await?;
            self.store
                .attach_permission_to_role(role.id, resolved.permission.id)
                .await?;
        }

        self.hooks
            .association_changed(AssociationKind::RolePermission)
            .await
    }

    pub async fn revoke_permission_to(
        &self,
        role: &Role,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let resolved = self.permissions.resolve(&permission.into()).await?;
        self.store
            .detach_permission_from_role(role.id, resolved.permission.id)
            .await?;

        self.hooks
            .association_changed(AssociationKind::RolePermission)
            .await
    }

    /// Detach all of the role's permissions, then grant the given set.
    pub async fn sync_permissions(
        &self,
        role: &Role,
        permissions: &[PermissionRef],
    ) -> Result<()> {
        self.store.detach_all_permissions_from_role(role.id).await?;
        self.give_permission_to(role, permissions).await
    }

    /// Grant a permission directly to a subject, outside any role.
    pub async fn give_direct_permission(
        &self,
        subject: &Subject,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let resolved = self.permissions.resolve(&permission.into()).await?;
        self.store
            .attach_permission_to_subject(subject, resolved.permission.id)
            .await?;

        self.hooks
            .association_changed(AssociationKind::SubjectPermission)
            .await
    }

    pub async fn revoke_direct_permission(
        &self,
        subject: &Subject,
        permission: impl Into<PermissionRef>,
    ) -> Result<()> {
        let resolved = self.permissions.resolve(&permission.into()).await?;
        self.store
            .detach_permission_from_subject(subject, resolved.permission.id)
            .await?;

        self.hooks
            .association_changed(AssociationKind::SubjectPermission)
            .await
    }

    // =========================================================================
    // PERMISSION SETS AND TREES
    // =========================================================================

    /// All permissions the subject holds, via roles and direct grants, from
    /// the cache.
    pub async fn get_all_permissions(&self, subject: &Subject) -> Result<Vec<Permission>> {
        let role_ids: HashSet<i64> = self
            .store
            .subject_roles(subject)
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();
        let direct: HashSet<i64> = self
            .store
            .subject_permission_ids(subject)
            .await?
            .into_iter()
            .collect();

        Ok(self
            .registrar
            .get(&PermissionFilter::all())
            .await?
            .into_iter()
            .filter(|entry| {
                direct.contains(&entry.permission.id)
                    || entry.role_ids.iter().any(|id| role_ids.contains(id))
            })
            .map(|entry| entry.permission)
            .collect())
    }

    /// The names of all permissions a role holds.
    pub async fn role_permission_names(&self, role: &Role) -> Result<Vec<String>> {
        Ok(self
            .role_permission_entries(role)
            .await?
            .into_iter()
            .map(|entry| entry.permission.name)
            .collect())
    }

    /// The display names of all permissions a role holds.
    pub async fn role_permission_display_names(&self, role: &Role) -> Result<Vec<String>> {
        Ok(self
            .role_permission_entries(role)
            .await?
            .into_iter()
            .map(|entry| entry.permission.display_name)
            .collect())
    }

    async fn role_permission_entries(&self, role: &Role) -> Result<Vec<PermissionWithRoles>> {
        Ok(self
            .registrar
            .get(&PermissionFilter::all())
            .await?
            .into_iter()
            .filter(|entry| entry.role_ids.contains(&role.id))
            .collect())
    }

    /// The subject's permissions as a tree rooted at `root_pid`, children
    /// grouped by `pid` and ordered by `weight` descending at every level.
    pub async fn get_tree_permissions(
        &self,
        subject: &Subject,
        root_pid: Option<i64>,
    ) -> Result<Vec<PermissionNode>> {
        let permissions = self.get_all_permissions(subject).await?;
        Ok(build_tree(&permissions, root_pid))
    }

    async fn resolve_actionable(&self, permission: &PermissionRef) -> Result<PermissionWithRoles> {
        let resolved = self.permissions.resolve(permission).await?;
        if resolved.permission.is_menu {
            return Err(Error::PermissionIsMenu(resolved.permission.name.clone()));
        }
        Ok(resolved)
    }
}
