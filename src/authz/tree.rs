//! Hierarchical permission assembly.
//!
//! The whole permission set is loaded once and grouped by `pid` in a single
//! pass, so building the tree never goes back to the store (no recursive
//! N+1 lookups).

use std::collections::HashMap;

use crate::models::{Permission, PermissionNode};

/// Build the permission tree rooted at `root_pid`.
///
/// Siblings are ordered by `weight` descending at every level. Menu nodes
/// always carry a children list (possibly empty); leaf permissions never do.
pub fn build_tree(permissions: &[Permission], root_pid: Option<i64>) -> Vec<PermissionNode> {
    let mut by_parent: HashMap<Option<i64>, Vec<&Permission>> = HashMap::new();
    for permission in permissions {
        by_parent.entry(permission.pid).or_default().push(permission);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.id.cmp(&b.id)));
    }

    assemble(&by_parent, root_pid)
}

fn assemble(
    by_parent: &HashMap<Option<i64>, Vec<&Permission>>,
    pid: Option<i64>,
) -> Vec<PermissionNode> {
    by_parent
        .get(&pid)
        .map(|siblings| {
            siblings
                .iter()
                .map(|permission| PermissionNode {
                    permission: (*permission).clone(),
                    children: permission
                        .is_menu
                        .then(|| assemble(by_parent, Some(permission.id))),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn permission(id: i64, pid: Option<i64>, weight: i64, is_menu: bool) -> Permission {
        Permission {
            id,
            name: format!("perm.{id}"),
            display_name: format!("Permission {id}"),
            route: (!is_menu).then(|| format!("/p/{id}")),
            method: (!is_menu).then(|| "GET".to_string()),
            pid,
            weight,
            is_menu,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn children_are_grouped_under_menu_and_ordered_by_weight_desc() {
        let permissions = vec![
            permission(1, None, 10, true),
            permission(2, Some(1), 5, false),
            permission(3, Some(1), 8, false),
        ];

        let tree = build_tree(&permissions, None);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].permission.id, 1);

        let children = tree[0].children.as_ref().expect("menu node has children");
        let child_ids: Vec<i64> = children.iter().map(|n| n.permission.id).collect();
        assert_eq!(child_ids, vec![3, 2]);

        // leaves have no children key at all
        assert!(children.iter().all(|n| n.children.is_none()));
    }

    #[test]
    fn nested_menus_recurse_and_empty_menus_keep_an_empty_list() {
        let permissions = vec![
            permission(1, None, 0, true),
            permission(2, Some(1), 0, true),
            permission(3, Some(2), 0, false),
        ];

        let tree = build_tree(&permissions, None);
        let level2 = tree[0].children.as_ref().unwrap();
        assert_eq!(level2[0].permission.id, 2);
        let level3 = level2[0].children.as_ref().unwrap();
        assert_eq!(level3[0].permission.id, 3);

        let lonely = vec![permission(9, None, 0, true)];
        let tree = build_tree(&lonely, None);
        assert_eq!(tree[0].children.as_deref(), Some(&[][..]));
    }

    #[test]
    fn subtree_can_start_below_the_root() {
        let permissions = vec![
            permission(1, None, 0, true),
            permission(2, Some(1), 9, false),
            permission(3, Some(1), 1, false),
        ];

        let subtree = build_tree(&permissions, Some(1));
        let ids: Vec<i64> = subtree.iter().map(|n| n.permission.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn serialized_leaf_omits_children_key() {
        let permissions = vec![permission(2, None, 0, false)];
        let tree = build_tree(&permissions, None);
        let json = serde_json::to_value(&tree[0]).unwrap();
        assert!(json.get("children").is_none());
        assert_eq!(json.get("name").unwrap(), "perm.2");
    }
}
