use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// =============================================================================
// PERMISSION
// =============================================================================

/// A single permission row.
///
/// Menu nodes (`is_menu = true`) are organizational tree entries with no
/// enforceable route/method; leaf permissions must carry both. `pid` is a
/// nullable self-reference forming the menu hierarchy, ordered by `weight`
/// descending among siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    pub weight: i64,
    pub is_menu: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A permission together with the ids of the roles that hold it — the shape
/// the cache keeps, eager-joined so membership checks never go back to the
/// store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionWithRoles {
    #[serde(flatten)]
    pub permission: Permission,
    pub role_ids: Vec<i64>,
}

/// Attributes for creating a permission. Non-menu permissions must supply
/// both `route` and `method`; both are normalized on intake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionAttributes {
    pub name: String,
    pub display_name: String,
    pub route: Option<String>,
    pub method: Option<String>,
    pub pid: Option<i64>,
    pub weight: i64,
    pub is_menu: bool,
}

impl PermissionAttributes {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn with_route(mut self, route: impl Into<String>, method: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self.method = Some(method.into());
        self
    }

    pub fn menu(mut self) -> Self {
        self.is_menu = true;
        self
    }

    pub fn with_parent(mut self, pid: i64) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// Apply route/method normalization in place.
    pub fn normalize(&mut self) {
        if let Some(route) = self.route.take() {
            self.route = Some(normalize_route(&route));
        }
        if let Some(method) = self.method.take() {
            self.method = Some(normalize_method(&method));
        }
    }
}

/// Routes always carry a leading path separator.
pub fn normalize_route(route: &str) -> String {
    if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{route}")
    }
}

/// HTTP methods are matched upper-case.
pub fn normalize_method(method: &str) -> String {
    method.to_uppercase()
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAttributes {
    pub name: String,
    pub display_name: String,
}

impl RoleAttributes {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
        }
    }
}

// =============================================================================
// REFERENCES
// =============================================================================

/// Heterogeneous permission identifier, resolved once at the engine boundary.
#[derive(Debug, Clone)]
pub enum PermissionRef {
    Name(String),
    Id(i64),
    RouteMethod { route: String, method: String },
    Resolved(Permission),
}

impl From<&str> for PermissionRef {
    fn from(name: &str) -> Self {
        PermissionRef::Name(name.to_string())
    }
}

impl From<String> for PermissionRef {
    fn from(name: String) -> Self {
        PermissionRef::Name(name)
    }
}

impl From<i64> for PermissionRef {
    fn from(id: i64) -> Self {
        PermissionRef::Id(id)
    }
}

impl From<(&str, &str)> for PermissionRef {
    fn from((route, method): (&str, &str)) -> Self {
        PermissionRef::RouteMethod {
            route: route.to_string(),
            method: method.to_string(),
        }
    }
}

impl From<Permission> for PermissionRef {
    fn from(permission: Permission) -> Self {
        PermissionRef::Resolved(permission)
    }
}

/// Heterogeneous role identifier.
#[derive(Debug, Clone)]
pub enum RoleRef {
    Name(String),
    Id(i64),
    Resolved(Role),
}

impl RoleRef {
    /// Split a pipe-delimited string of role names into alternatives.
    /// A surrounding quote pair (single or double) is stripped first.
    /// Strings of two characters or fewer are taken as a single name,
    /// never split.
    pub fn parse_pipes(input: &str) -> Vec<RoleRef> {
        let trimmed = input.trim();

        if trimmed.len() <= 2 {
            return vec![RoleRef::Name(trimmed.to_string())];
        }

        let first = trimmed.chars().next();
        let last = trimmed.chars().last();
        let unquoted = match (first, last) {
            (Some(q @ ('\'' | '"')), Some(end)) if q == end => trimmed.trim_matches(q),
            _ => trimmed,
        };

        unquoted
            .split('|')
            .map(|name| RoleRef::Name(name.trim().to_string()))
            .collect()
    }
}

impl From<&str> for RoleRef {
    fn from(name: &str) -> Self {
        RoleRef::Name(name.to_string())
    }
}

impl From<String> for RoleRef {
    fn from(name: String) -> Self {
        RoleRef::Name(name)
    }
}

impl From<i64> for RoleRef {
    fn from(id: i64) -> Self {
        RoleRef::Id(id)
    }
}

impl From<Role> for RoleRef {
    fn from(role: Role) -> Self {
        RoleRef::Resolved(role)
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// Exact-match equality filter over cached permissions. Unset fields match
/// everything; `pid` distinguishes "any" (`None`) from "must be a root node"
/// (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub route: Option<String>,
    pub method: Option<String>,
    pub pid: Option<Option<i64>>,
    pub is_menu: Option<bool>,
}

impl PermissionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn by_route_and_method(route: &str, method: &str) -> Self {
        Self {
            route: Some(normalize_route(route)),
            method: Some(normalize_method(method)),
            ..Self::default()
        }
    }

    pub fn menus() -> Self {
        Self {
            is_menu: Some(true),
            ..Self::default()
        }
    }

    pub fn matches(&self, permission: &Permission) -> bool {
        if self.id.is_some_and(|id| permission.id != id) {
            return false;
        }
        if self.name.as_deref().is_some_and(|n| permission.name != n) {
            return false;
        }
        if self
            .route
            .as_deref()
            .is_some_and(|r| permission.route.as_deref() != Some(r))
        {
            return false;
        }
        if self
            .method
            .as_deref()
            .is_some_and(|m| permission.method.as_deref() != Some(m))
        {
            return false;
        }
        if self.pid.is_some_and(|pid| permission.pid != pid) {
            return false;
        }
        if self.is_menu.is_some_and(|m| permission.is_menu != m) {
            return false;
        }
        true
    }
}

// =============================================================================
// TREE
// =============================================================================

/// A permission with its nested children. Menu nodes always carry a children
/// list (possibly empty); leaf permissions never do, so the serialized form
/// omits the key entirely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionNode {
    #[serde(flatten)]
    pub permission: Permission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PermissionNode>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(id: i64, name: &str) -> Permission {
        Permission {
            id,
            name: name.to_string(),
            display_name: name.to_string(),
            route: Some(format!("/{name}")),
            method: Some("GET".to_string()),
            pid: None,
            weight: 0,
            is_menu: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn route_normalization_prefixes_separator() {
        assert_eq!(normalize_route("articles"), "/articles");
        assert_eq!(normalize_route("/articles"), "/articles");
    }

    #[test]
    fn method_normalization_uppercases() {
        assert_eq!(normalize_method("put"), "PUT");
        assert_eq!(normalize_method("Get"), "GET");
    }

    #[test]
    fn filter_matches_on_each_given_attribute() {
        let p = permission(7, "edit.articles");

        assert!(PermissionFilter::all().matches(&p));
        assert!(PermissionFilter::by_id(7).matches(&p));
        assert!(!PermissionFilter::by_id(8).matches(&p));
        assert!(PermissionFilter::by_name("edit.articles").matches(&p));
        assert!(PermissionFilter::by_route_and_method("edit.articles", "get").matches(&p));
        assert!(!PermissionFilter::by_route_and_method("/edit.articles", "POST").matches(&p));
        assert!(!PermissionFilter::menus().matches(&p));
    }

    #[test]
    fn filter_root_pid_distinguishes_any_from_none() {
        let mut p = permission(1, "root");
        assert!(PermissionFilter {
            pid: Some(None),
            ..Default::default()
        }
        .matches(&p));

        p.pid = Some(9);
        assert!(!PermissionFilter {
            pid: Some(None),
            ..Default::default()
        }
        .matches(&p));
        assert!(PermissionFilter {
            pid: Some(Some(9)),
            ..Default::default()
        }
        .matches(&p));
    }

    #[test]
    fn pipe_parsing_splits_alternatives_and_strips_quotes() {
        let refs = RoleRef::parse_pipes("writer|editor");
        assert_eq!(refs.len(), 2);
        assert!(matches!(&refs[0], RoleRef::Name(n) if n == "writer"));
        assert!(matches!(&refs[1], RoleRef::Name(n) if n == "editor"));

        let refs = RoleRef::parse_pipes("\"writer|editor\"");
        assert_eq!(refs.len(), 2);
        assert!(matches!(&refs[0], RoleRef::Name(n) if n == "writer"));

        let refs = RoleRef::parse_pipes("admin");
        assert_eq!(refs.len(), 1);
        assert!(matches!(&refs[0], RoleRef::Name(n) if n == "admin"));
    }

    #[test]
    fn pipe_parsing_keeps_short_strings_whole() {
        let refs = RoleRef::parse_pipes("a|");
        assert_eq!(refs.len(), 1);
        assert!(matches!(&refs[0], RoleRef::Name(n) if n == "a|"));

        let refs = RoleRef::parse_pipes("ab");
        assert_eq!(refs.len(), 1);
        assert!(matches!(&refs[0], RoleRef::Name(n) if n == "ab"));
    }

    #[test]
    fn attribute_normalization_applies_to_route_and_method() {
        let mut attrs =
            PermissionAttributes::new("edit.articles", "Edit Articles").with_route("articles", "put");
        attrs.normalize();
        assert_eq!(attrs.route.as_deref(), Some("/articles"));
        assert_eq!(attrs.method.as_deref(), Some("PUT"));
    }
}
