//! Permission check semantics: strict vs non-throwing lookups, the menu
//! policy, and find-or-create idempotence.

use std::sync::Arc;

use anyhow::Result;
use gatekeeper::{
    Error, MemoryStore, PermissionAttributes, PermissionConfig, PermissionRef, Rbac,
    RoleAttributes, RoleRef, Subject,
};

fn setup() -> Rbac {
    Rbac::new(Arc::new(MemoryStore::new()), PermissionConfig::default())
}

#[tokio::test]
async fn role_permission_round_trip() -> Result<()> {
    let rbac = setup();
    rbac.permissions
        .create(
            PermissionAttributes::new("edit.articles", "Edit Articles").with_route("/articles", "PUT"),
        )
        .await?;
    let editor = rbac.roles.create(RoleAttributes::new("editor", "Editor")).await?;

    rbac.engine
        .give_permission_to(&editor, &[PermissionRef::from("edit.articles")])
        .await?;

    assert!(rbac.engine.role_has_permission_to(&editor, "edit.articles").await?);

    let err = rbac
        .engine
        .role_has_permission_to(&editor, "edit.news")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn subject_inherits_permissions_through_roles() -> Result<()> {
    let rbac = setup();
    rbac.permissions
        .create(
            PermissionAttributes::new("edit.articles", "Edit Articles").with_route("/articles", "PUT"),
        )
        .await?;
    let editor = rbac.roles.create(RoleAttributes::new("editor", "Editor")).await?;
    rbac.engine
        .give_permission_to(&editor, &[PermissionRef::from("edit.articles")])
        .await?;

    let subject = Subject::user(1);
    assert!(!rbac.engine.has_permission_to(&subject, "edit.articles").await?);

    rbac.engine.assign_role(&subject, &[RoleRef::from("editor")]).await?;
    assert!(rbac.engine.has_permission_to(&subject, "edit.articles").await?);

    // lookups by id and by normalized route+method agree
    let permission = rbac.permissions.find_by_name("edit.articles").await?;
    assert!(rbac
        .engine
        .has_permission_to(&subject, permission.permission.id)
        .await?);
    assert!(rbac
        .engine
        .has_permission_to(&subject, ("articles", "put"))
        .await?);
    Ok(())
}

#[tokio::test]
async fn direct_grants_work_without_any_role() -> Result<()> {
    let rbac = setup();
    rbac.permissions
        .create(PermissionAttributes::new("export.data", "Export Data").with_route("/export", "POST"))
        .await?;
    let subject = Subject::user(7);

    rbac.engine.give_direct_permission(&subject, "export.data").await?;
    assert!(rbac.engine.has_permission_to(&subject, "export.data").await?);

    rbac.engine.revoke_direct_permission(&subject, "export.data").await?;
    assert!(!rbac.engine.has_permission_to(&subject, "export.data").await?);
    Ok(())
}

#[tokio::test]
async fn check_permission_to_denies_missing_and_grants_menus() -> Result<()> {
    let rbac = setup();
    rbac.permissions
        .create(PermissionAttributes::new("system", "System").menu())
        .await?;
    let subject = Subject::user(1);

    // nonexistent: has_permission_to throws, check_permission_to recovers to false
    let err = rbac
        .engine
        .has_permission_to(&subject, "edit.news")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionNotFound(_)));
    assert!(!rbac.engine.check_permission_to(&subject, "edit.news").await?);

    // menu node: has_permission_to throws IsMenu, check_permission_to treats
    // navigational nodes as granted
    let err = rbac
        .engine
        .has_permission_to(&subject, "system")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionIsMenu(_)));
    assert!(rbac.engine.check_permission_to(&subject, "system").await?);
    Ok(())
}

#[tokio::test]
async fn has_any_and_has_all_aggregate_correctly() -> Result<()> {
    let rbac = setup();
    rbac.permissions
        .create(
            PermissionAttributes::new("edit.articles", "Edit Articles").with_route("/articles", "PUT"),
        )
        .await?;
    rbac.permissions
        .create(PermissionAttributes::new("edit.news", "Edit News").with_route("/news", "PUT"))
        .await?;
    let editor = rbac.roles.create(RoleAttributes::new("editor", "Editor")).await?;
    rbac.engine
        .give_permission_to(&editor, &[PermissionRef::from("edit.articles")])
        .await?;
    let subject = Subject::user(1);
    rbac.engine.assign_role(&subject, &[RoleRef::from("editor")]).await?;

    assert!(
        rbac.engine
            .has_any_permission(
                &subject,
                vec![
                    PermissionRef::from("edit.news"),
                    PermissionRef::from("edit.articles"),
                ],
            )
            .await?
    );
    // unresolvable entries are swallowed by the any-wrapper
    assert!(
        !rbac
            .engine
            .has_any_permission(&subject, vec![PermissionRef::from("no.such")])
            .await?
    );
    assert!(
        !rbac
            .engine
            .has_any_permission(&subject, Vec::new())
            .await?
    );

    // all: held + not-held resolves to false
    assert!(
        !rbac
            .engine
            .has_all_permissions(
                &subject,
                vec![
                    PermissionRef::from("edit.articles"),
                    PermissionRef::from("edit.news"),
                ],
            )
            .await?
    );
    // all: an unresolvable entry throws instead of returning false
    let err = rbac
        .engine
        .has_all_permissions(
            &subject,
            vec![
                PermissionRef::from("edit.articles"),
                PermissionRef::from("no.such"),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn find_or_create_returns_the_same_entity_twice() -> Result<()> {
    let rbac = setup();
    let attrs =
        PermissionAttributes::new("edit.articles", "Edit Articles").with_route("/articles", "PUT");

    let first = rbac.permissions.find_or_create(attrs.clone()).await?;
    let second = rbac.permissions.find_or_create(attrs).await?;
    assert_eq!(first.id, second.id);
    Ok(())
}

#[tokio::test]
async fn create_without_route_and_without_menu_flag_fails() -> Result<()> {
    let rbac = setup();
    let err = rbac
        .permissions
        .create(PermissionAttributes::new("orphan", "Orphan"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionNotMenu(_)));
    assert_eq!(err.status(), 422);
    Ok(())
}
