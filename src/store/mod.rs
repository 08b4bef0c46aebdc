//! The Entity Store seam: durable storage for permissions, roles, and their
//! associations. The core only ever talks to this trait, which keeps it
//! testable without a live database and storage-agnostic in production.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::authz::Subject;
use crate::errors::Result;
use crate::models::{
    Permission, PermissionAttributes, PermissionWithRoles, Role, RoleAttributes,
};

/// Durable storage operations the core depends on.
///
/// Uniqueness invariants (`name` globally unique; `(route, method)` unique
/// among non-menu permissions; role `name` unique) are enforced here as well
/// as in the resolver, so a racing create still fails cleanly with
/// `PermissionAlreadyExists` / `RoleAlreadyExists`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // --- permissions ---
    async fn insert_permission(&self, attrs: &PermissionAttributes) -> Result<Permission>;
    async fn update_permission(&self, permission: &Permission) -> Result<Permission>;
    /// Deletes the permission and detaches it from every role and subject.
    async fn delete_permission(&self, id: i64) -> Result<()>;
    /// The full permission set with role associations eager-joined. This is
    /// the single reload query behind the permission cache.
    async fn list_permissions_with_roles(&self) -> Result<Vec<PermissionWithRoles>>;

    // --- roles ---
    async fn insert_role(&self, attrs: &RoleAttributes) -> Result<Role>;
    async fn update_role(&self, role: &Role) -> Result<Role>;
    async fn find_role_by_id(&self, id: i64) -> Result<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    /// Deletes the role and detaches its permissions and subjects.
    async fn delete_role(&self, id: i64) -> Result<()>;
    async fn list_roles(&self) -> Result<Vec<Role>>;

    // --- role <-> permission ---
    async fn attach_permission_to_role(&self, role_id: i64, permission_id: i64) -> Result<()>;
    async fn detach_permission_from_role(&self, role_id: i64, permission_id: i64) -> Result<()>;
    async fn detach_all_permissions_from_role(&self, role_id: i64) -> Result<()>;

    // --- subject <-> role (polymorphic join on subject type + id) ---
    async fn attach_role_to_subject(&self, subject: &Subject, role_id: i64) -> Result<()>;
    async fn detach_role_from_subject(&self, subject: &Subject, role_id: i64) -> Result<()>;
    async fn detach_all_roles_from_subject(&self, subject: &Subject) -> Result<()>;
    async fn subject_roles(&self, subject: &Subject) -> Result<Vec<Role>>;

    // --- subject <-> permission (direct grants) ---
    async fn attach_permission_to_subject(&self, subject: &Subject, permission_id: i64)
        -> Result<()>;
    async fn detach_permission_from_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> Result<()>;
    async fn subject_permission_ids(&self, subject: &Subject) -> Result<Vec<i64>>;
}
