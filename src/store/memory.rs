use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::authz::Subject;
use crate::errors::{Error, Result};
use crate::models::{
    Permission, PermissionAttributes, PermissionWithRoles, Role, RoleAttributes,
};
use crate::store::EntityStore;

/// In-memory entity store.
///
/// Backs the unit and property tests; every trait call counts as one backend
/// query so cache behavior can be asserted the same way the original test
/// suite counted SQL statements.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    queries: AtomicUsize,
}

#[derive(Default)]
struct Inner {
    permissions: HashMap<i64, Permission>,
    roles: HashMap<i64, Role>,
    role_permissions: HashSet<(i64, i64)>,
    subject_roles: Vec<(Subject, i64)>,
    subject_permissions: HashSet<(Subject, i64)>,
    subjects: Vec<String>,
    next_permission_id: i64,
    next_role_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn reset_query_count(&self) {
        self.queries.store(0, Ordering::SeqCst);
    }

    /// Write an unrelated subject record. Stands in for user-table writes
    /// that bypass this core entirely and therefore must not flush the
    /// permission cache.
    pub fn record_subject(&self, name: &str) {
        self.count();
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .subjects
            .push(name.to_string());
    }

    fn count(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_permission(&self, attrs: &PermissionAttributes) -> Result<Permission> {
        self.count();
        let mut inner = self.lock();

        if inner.permissions.values().any(|p| p.name == attrs.name) {
            return Err(Error::PermissionAlreadyExists(attrs.name.clone()));
        }
        if !attrs.is_menu {
            let pair = (attrs.route.as_deref(), attrs.method.as_deref());
            if inner
                .permissions
                .values()
                .any(|p| !p.is_menu && (p.route.as_deref(), p.method.as_deref()) == pair)
            {
                return Err(Error::PermissionAlreadyExists(attrs.name.clone()));
            }
        }

        inner.next_permission_id += 1;
        let now = Utc::now();
        let permission = Permission {
            id: inner.next_permission_id,
            name: attrs.name.clone(),
            display_name: attrs.display_name.clone(),
            route: attrs.route.clone(),
            method: attrs.method.clone(),
            pid: attrs.pid,
            weight: attrs.weight,
            is_menu: attrs.is_menu,
            created_at: now,
            updated_at: now,
        };
        inner.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn update_permission(&self, permission: &Permission) -> Result<Permission> {
        self.count();
        let mut inner = self.lock();

        if inner
            .permissions
            .values()
            .any(|p| p.id != permission.id && p.name == permission.name)
        {
            return Err(Error::PermissionAlreadyExists(permission.name.clone()));
        }
        if !inner.permissions.contains_key(&permission.id) {
            return Err(Error::permission_not_found_id(permission.id));
        }

        let mut updated = permission.clone();
        updated.updated_at = Utc::now();
        inner.permissions.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_permission(&self, id: i64) -> Result<()> {
        self.count();
        let mut inner = self.lock();
        inner.permissions.remove(&id);
        inner.role_permissions.retain(|(_, pid)| *pid != id);
        inner.subject_permissions.retain(|(_, pid)| *pid != id);
        Ok(())
    }

    async fn list_permissions_with_roles(&self) -> Result<Vec<PermissionWithRoles>> {
        self.count();
        let inner = self.lock();

        let mut entries: Vec<PermissionWithRoles> = inner
            .permissions
            .values()
            .map(|permission| {
                let mut role_ids: Vec<i64> = inner
                    .role_permissions
                    .iter()
                    .filter(|(_, pid)| *pid == permission.id)
                    .map(|(rid, _)| *rid)
                    .collect();
                role_ids.sort_unstable();
                PermissionWithRoles {
                    permission: permission.clone(),
                    role_ids,
                }
            })
            .collect();
        entries.sort_by_key(|entry| entry.permission.id);
        Ok(entries)
    }

    async fn insert_role(&self, attrs: &RoleAttributes) -> Result<Role> {
        self.count();
        let mut inner = self.lock();

        if inner.roles.values().any(|r| r.name == attrs.name) {
            return Err(Error::role_already_exists(&attrs.name));
        }

        inner.next_role_id += 1;
        let now = Utc::now();
        let role = Role {
            id: inner.next_role_id,
            name: attrs.name.clone(),
            display_name: attrs.display_name.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, role: &Role) -> Result<Role> {
        self.count();
        let mut inner = self.lock();

        if inner
            .roles
            .values()
            .any(|r| r.id != role.id && r.name == role.name)
        {
            return Err(Error::role_already_exists(&role.name));
        }
        if !inner.roles.contains_key(&role.id) {
            return Err(Error::role_not_found_id(role.id));
        }

        let mut updated = role.clone();
        updated.updated_at = Utc::now();
        inner.roles.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn find_role_by_id(&self, id: i64) -> Result<Option<Role>> {
        self.count();
        Ok(self.lock().roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.count();
        Ok(self.lock().roles.values().find(|r| r.name == name).cloned())
    }

    async fn delete_role(&self, id: i64) -> Result<()> {
        self.count();
        let mut inner = self.lock();
        inner.roles.remove(&id);
        inner.role_permissions.retain(|(rid, _)| *rid != id);
        inner.subject_roles.retain(|(_, rid)| *rid != id);
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        self.count();
        let inner = self.lock();
        let mut roles: Vec<Role> = inner.roles.values().cloned().collect();
        roles.sort_by_key(|role| role.id);
        Ok(roles)
    }

    async fn attach_permission_to_role(&self, role_id: i64, permission_id: i64) -> Result<()> {
        self.count();
        self.lock().role_permissions.insert((role_id, permission_id));
        Ok(())
    }

    async fn detach_permission_from_role(&self, role_id: i64, permission_id: i64) -> Result<()> {
        self.count();
        self.lock()
            .role_permissions
            .remove(&(role_id, permission_id));
        Ok(())
    }

    async fn detach_all_permissions_from_role(&self, role_id: i64) -> Result<()> {
        self.count();
        self.lock()
            .role_permissions
            .retain(|(rid, _)| *rid != role_id);
        Ok(())
    }

    async fn attach_role_to_subject(&self, subject: &Subject, role_id: i64) -> Result<()> {
        self.count();
        let mut inner = self.lock();
        if !inner
            .subject_roles
            .iter()
            .any(|(s, rid)| s == subject && *rid == role_id)
        {
            inner.subject_roles.push((subject.clone(), role_id));
        }
        Ok(())
    }

    async fn detach_role_from_subject(&self, subject: &Subject, role_id: i64) -> Result<()> {
        self.count();
        self.lock()
            .subject_roles
            .retain(|(s, rid)| !(s == subject && *rid == role_id));
        Ok(())
    }

    async fn detach_all_roles_from_subject(&self, subject: &Subject) -> Result<()> {
        self.count();
        self.lock().subject_roles.retain(|(s, _)| s != subject);
        Ok(())
    }

    async fn subject_roles(&self, subject: &Subject) -> Result<Vec<Role>> {
        self.count();
        let inner = self.lock();
        // assignment order is preserved; the first role is the subject's
        // primary one in single-role mode
        Ok(inner
            .subject_roles
            .iter()
            .filter(|(s, _)| s == subject)
            .filter_map(|(_, rid)| inner.roles.get(rid).cloned())
            .collect())
    }

    async fn attach_permission_to_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> Result<()> {
        self.count();
        self.lock()
            .subject_permissions
            .insert((subject.clone(), permission_id));
        Ok(())
    }

    async fn detach_permission_from_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> Result<()> {
        self.count();
        self.lock()
            .subject_permissions
            .remove(&(subject.clone(), permission_id));
        Ok(())
    }

    async fn subject_permission_ids(&self, subject: &Subject) -> Result<Vec<i64>> {
        self.count();
        let mut ids: Vec<i64> = self
            .lock()
            .subject_permissions
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, pid)| *pid)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
