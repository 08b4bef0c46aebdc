use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::authz::Subject;
use crate::errors::{Error, Result};
use crate::models::{
    Permission, PermissionAttributes, PermissionWithRoles, Role, RoleAttributes,
};
use crate::store::EntityStore;

/// SQLite-backed entity store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the given database and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        Self::migrate(&pool).await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!()
            .run(pool)
            .await
            .map_err(|err| Error::Database(sqlx::Error::Migrate(Box::new(err))))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
    )
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn insert_permission(&self, attrs: &PermissionAttributes) -> Result<Permission> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO permissions (name, display_name, route, method, pid, weight, is_menu, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attrs.name)
        .bind(&attrs.display_name)
        .bind(&attrs.route)
        .bind(&attrs.method)
        .bind(attrs.pid)
        .bind(attrs.weight)
        .bind(attrs.is_menu)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                Error::PermissionAlreadyExists(attrs.name.clone())
            } else {
                Error::Database(err)
            }
        })?;

        Ok(Permission {
            id: result.last_insert_rowid(),
            name: attrs.name.clone(),
            display_name: attrs.display_name.clone(),
            route: attrs.route.clone(),
            method: attrs.method.clone(),
            pid: attrs.pid,
            weight: attrs.weight,
            is_menu: attrs.is_menu,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_permission(&self, permission: &Permission) -> Result<Permission> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET name = ?, display_name = ?, route = ?, method = ?, pid = ?, weight = ?, is_menu = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&permission.name)
        .bind(&permission.display_name)
        .bind(&permission.route)
        .bind(&permission.method)
        .bind(permission.pid)
        .bind(permission.weight)
        .bind(permission.is_menu)
        .bind(now)
        .bind(permission.id)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                Error::PermissionAlreadyExists(permission.name.clone())
            } else {
                Error::Database(err)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::permission_not_found_id(permission.id));
        }

        let mut updated = permission.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn delete_permission(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM role_has_permissions WHERE permission_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM model_has_permissions WHERE permission_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM permissions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_permissions_with_roles(&self) -> Result<Vec<PermissionWithRoles>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, name, display_name, route, method, pid, weight, is_menu, created_at, updated_at
            FROM permissions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        // one pass over the join table instead of a query per permission
        let pairs = sqlx::query_as::<_, (i64, i64)>(
            "SELECT permission_id, role_id FROM role_has_permissions ORDER BY role_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries: Vec<PermissionWithRoles> = permissions
            .into_iter()
            .map(|permission| PermissionWithRoles {
                permission,
                role_ids: Vec::new(),
            })
            .collect();
        for (permission_id, role_id) in pairs {
            if let Some(entry) = entries
                .iter_mut()
                .find(|e| e.permission.id == permission_id)
            {
                entry.role_ids.push(role_id);
            }
        }

        Ok(entries)
    }

    async fn insert_role(&self, attrs: &RoleAttributes) -> Result<Role> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO roles (name, display_name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&attrs.name)
        .bind(&attrs.display_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                Error::role_already_exists(&attrs.name)
            } else {
                Error::Database(err)
            }
        })?;

        Ok(Role {
            id: result.last_insert_rowid(),
            name: attrs.name.clone(),
            display_name: attrs.display_name.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_role(&self, role: &Role) -> Result<Role> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE roles SET name = ?, display_name = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&role.name)
        .bind(&role.display_name)
        .bind(now)
        .bind(role.id)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                Error::role_already_exists(&role.name)
            } else {
                Error::Database(err)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::role_not_found_id(role.id));
        }

        let mut updated = role.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    async fn find_role_by_id(&self, id: i64) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, display_name, created_at, updated_at FROM roles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, display_name, created_at, updated_at FROM roles WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn delete_role(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM role_has_permissions WHERE role_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM model_has_roles WHERE role_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, display_name, created_at, updated_at FROM roles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn attach_permission_to_role(&self, role_id: i64, permission_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO role_has_permissions (role_id, permission_id) VALUES (?, ?)",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn detach_permission_from_role(&self, role_id: i64, permission_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM role_has_permissions WHERE role_id = ? AND permission_id = ?")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn detach_all_permissions_from_role(&self, role_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM role_has_permissions WHERE role_id = ?")
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn attach_role_to_subject(&self, subject: &Subject, role_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO model_has_roles (subject_type, subject_id, role_id, assigned_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(role_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn detach_role_from_subject(&self, subject: &Subject, role_id: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM model_has_roles WHERE subject_type = ? AND subject_id = ? AND role_id = ?",
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn detach_all_roles_from_subject(&self, subject: &Subject) -> Result<()> {
        sqlx::query("DELETE FROM model_has_roles WHERE subject_type = ? AND subject_id = ?")
            .bind(&subject.subject_type)
            .bind(subject.subject_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subject_roles(&self, subject: &Subject) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.display_name, r.created_at, r.updated_at
            FROM roles r
            INNER JOIN model_has_roles mr ON r.id = mr.role_id
            WHERE mr.subject_type = ? AND mr.subject_id = ?
            ORDER BY mr.assigned_at, r.id
            "#,
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn attach_permission_to_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO model_has_permissions (subject_type, subject_id, permission_id)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn detach_permission_from_subject(
        &self,
        subject: &Subject,
        permission_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM model_has_permissions
            WHERE subject_type = ? AND subject_id = ? AND permission_id = ?
            "#,
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn subject_permission_ids(&self, subject: &Subject) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT permission_id FROM model_has_permissions
            WHERE subject_type = ? AND subject_id = ?
            ORDER BY permission_id
            "#,
        )
        .bind(&subject.subject_type)
        .bind(subject.subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
