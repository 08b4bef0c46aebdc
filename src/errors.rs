use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("permission not found: {0}")]
    PermissionNotFound(String),
    #[error("permission `{0}` is a menu node, not an actionable permission")]
    PermissionIsMenu(String),
    #[error("permission `{0}` already exists")]
    PermissionAlreadyExists(String),
    #[error("permission `{0}` is not a menu: route and method must not be empty")]
    PermissionNotMenu(String),
    #[error("role not found: {0}")]
    RoleNotFound(String),
    #[error("role conflict: {0}")]
    RoleAlreadyExists(String),
    #[error("unauthorized: {reason}")]
    Unauthorized { status: u16, reason: String },
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(String),
}

impl Error {
    pub fn permission_not_found(name: &str) -> Self {
        Self::PermissionNotFound(format!("there is no permission named `{name}`"))
    }

    pub fn permission_not_found_id(id: i64) -> Self {
        Self::PermissionNotFound(format!("there is no permission with id `{id}`"))
    }

    pub fn permission_not_found_route(route: &str, method: &str) -> Self {
        Self::PermissionNotFound(format!(
            "there is no permission with route `{route}` and method `{method}`"
        ))
    }

    pub fn role_not_found(name: &str) -> Self {
        Self::RoleNotFound(format!("there is no role named `{name}`"))
    }

    pub fn role_not_found_id(id: i64) -> Self {
        Self::RoleNotFound(format!("there is no role with id `{id}`"))
    }

    pub fn role_already_exists(name: &str) -> Self {
        Self::RoleAlreadyExists(format!("a role named `{name}` already exists"))
    }

    /// Single-role mode: more than one role requested in one call.
    pub fn multiple_roles_not_supported() -> Self {
        Self::RoleAlreadyExists("multiple roles are not supported".to_string())
    }

    /// Single-role mode: the subject already holds a different role.
    pub fn role_already_assigned(name: &str) -> Self {
        Self::RoleAlreadyExists(format!("subject already has the role `{name}`"))
    }

    pub fn not_logged_in() -> Self {
        Self::Unauthorized {
            status: 401,
            reason: "user is not logged in".to_string(),
        }
    }

    pub fn for_roles() -> Self {
        Self::Unauthorized {
            status: 403,
            reason: "user does not have the right roles".to_string(),
        }
    }

    pub fn for_permissions() -> Self {
        Self::Unauthorized {
            status: 403,
            reason: "user does not have the right permissions".to_string(),
        }
    }

    pub fn not_assigned_role() -> Self {
        Self::Unauthorized {
            status: 403,
            reason: "user is not assigned a role".to_string(),
        }
    }

    /// HTTP-style status code for adapter translation. The core never renders
    /// responses itself; gate/middleware glue maps this onto its own transport.
    pub fn status(&self) -> u16 {
        match self {
            Error::PermissionNotFound(_) | Error::RoleNotFound(_) => 404,
            Error::PermissionAlreadyExists(_) | Error::RoleAlreadyExists(_) => 409,
            Error::PermissionIsMenu(_) | Error::PermissionNotMenu(_) => 422,
            Error::Unauthorized { status, .. } => *status,
            Error::Database(_) | Error::Cache(_) => 500,
        }
    }

    /// Short machine-readable kind, mirrored into adapter payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::PermissionNotFound(_) => "permission_not_found",
            Error::PermissionIsMenu(_) => "permission_is_menu",
            Error::PermissionAlreadyExists(_) => "permission_already_exists",
            Error::PermissionNotMenu(_) => "permission_not_menu",
            Error::RoleNotFound(_) => "role_not_found",
            Error::RoleAlreadyExists(_) => "role_already_exists",
            Error::Unauthorized { .. } => "unauthorized",
            Error::Database(_) => "database",
            Error::Cache(_) => "cache",
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorPayload {
    pub error: String,
    pub message: String,
}
