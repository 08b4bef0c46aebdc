//! Role assignment semantics: round trips, single- vs multi-role mode,
//! sync, and pipe-delimited alternatives.

use std::sync::Arc;

use anyhow::Result;
use gatekeeper::{
    Error, MemoryStore, PermissionConfig, Rbac, RoleAttributes, RoleRef, Subject,
};

fn setup(multiple_roles: bool) -> Rbac {
    let config = PermissionConfig {
        model_has_multiple_roles: multiple_roles,
        ..PermissionConfig::default()
    };
    Rbac::new(Arc::new(MemoryStore::new()), config)
}

#[tokio::test]
async fn assign_and_remove_round_trip() -> Result<()> {
    let rbac = setup(false);
    rbac.roles.create(RoleAttributes::new("editor", "Editor")).await?;
    let subject = Subject::user(1);

    rbac.engine.assign_role(&subject, &[RoleRef::from("editor")]).await?;
    assert!(rbac.engine.has_role(&subject, &[RoleRef::from("editor")]).await?);

    rbac.engine.remove_role(&subject, "editor").await?;
    assert!(!rbac.engine.has_role(&subject, &[RoleRef::from("editor")]).await?);
    Ok(())
}

#[tokio::test]
async fn assigning_an_unknown_role_fails() -> Result<()> {
    let rbac = setup(false);
    let subject = Subject::user(1);

    let err = rbac
        .engine
        .assign_role(&subject, &[RoleRef::from("ghost")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RoleNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn single_role_mode_rejects_multiple_roles_in_one_call() -> Result<()> {
    let rbac = setup(false);
    rbac.roles.create(RoleAttributes::new("role_a", "Role A")).await?;
    rbac.roles.create(RoleAttributes::new("role_b", "Role B")).await?;
    let subject = Subject::user(1);

    let err = rbac
        .engine
        .assign_role(&subject, &[RoleRef::from("role_a"), RoleRef::from("role_b")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RoleAlreadyExists(_)));
    Ok(())
}

#[tokio::test]
async fn single_role_mode_rejects_a_second_different_role() -> Result<()> {
    let rbac = setup(false);
    rbac.roles.create(RoleAttributes::new("role_a", "Role A")).await?;
    rbac.roles.create(RoleAttributes::new("role_b", "Role B")).await?;
    let subject = Subject::user(1);

    rbac.engine.assign_role(&subject, &[RoleRef::from("role_a")]).await?;

    let err = rbac
        .engine
        .assign_role(&subject, &[RoleRef::from("role_b")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RoleAlreadyExists(_)));

    // re-assigning the same role is a no-op, not a conflict
    rbac.engine.assign_role(&subject, &[RoleRef::from("role_a")]).await?;
    assert_eq!(rbac.engine.get_role_names(&subject).await?, vec!["role_a"]);
    Ok(())
}

#[tokio::test]
async fn multi_role_mode_accepts_several_roles() -> Result<()> {
    let rbac = setup(true);
    rbac.roles.create(RoleAttributes::new("role_a", "Role A")).await?;
    rbac.roles.create(RoleAttributes::new("role_b", "Role B")).await?;
    let subject = Subject::user(1);

    rbac.engine
        .assign_role(&subject, &[RoleRef::from("role_a"), RoleRef::from("role_b")])
        .await?;

    assert!(rbac.engine.has_role(&subject, &[RoleRef::from("role_a")]).await?);
    assert!(rbac.engine.has_role(&subject, &[RoleRef::from("role_b")]).await?);
    assert!(
        rbac.engine
            .has_all_roles(&subject, &[RoleRef::from("role_a"), RoleRef::from("role_b")])
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn assignment_is_additive_in_multi_role_mode() -> Result<()> {
    let rbac = setup(true);
    rbac.roles.create(RoleAttributes::new("role_a", "Role A")).await?;
    rbac.roles.create(RoleAttributes::new("role_b", "Role B")).await?;
    let subject = Subject::user(1);

    rbac.engine.assign_role(&subject, &[RoleRef::from("role_a")]).await?;
    let roles = rbac
        .engine
        .assign_role(&subject, &[RoleRef::from("role_b")])
        .await?;

    // existing assignment kept, new one unioned in
    let names: Vec<String> = roles.into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["role_a", "role_b"]);
    Ok(())
}

#[tokio::test]
async fn sync_roles_replaces_the_whole_set() -> Result<()> {
    let rbac = setup(true);
    rbac.roles.create(RoleAttributes::new("role_a", "Role A")).await?;
    rbac.roles.create(RoleAttributes::new("role_b", "Role B")).await?;
    let subject = Subject::user(1);

    rbac.engine.assign_role(&subject, &[RoleRef::from("role_a")]).await?;
    let roles = rbac
        .engine
        .sync_roles(&subject, &[RoleRef::from("role_b")])
        .await?;
    let names: Vec<String> = roles.into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["role_b"]);

    // an empty set leaves the subject with zero roles
    let roles = rbac.engine.sync_roles(&subject, &[]).await?;
    assert!(roles.is_empty());
    assert!(matches!(
        rbac.engine.get_first_role(&subject).await.unwrap_err(),
        Error::Unauthorized { status: 403, .. }
    ));
    Ok(())
}

#[tokio::test]
async fn has_role_matches_by_name_id_and_entity() -> Result<()> {
    let rbac = setup(false);
    let editor = rbac.roles.create(RoleAttributes::new("editor", "Editor")).await?;
    let subject = Subject::user(1);
    rbac.engine.assign_role(&subject, &[RoleRef::from("editor")]).await?;

    assert!(rbac.engine.has_role(&subject, &[RoleRef::from("editor")]).await?);
    assert!(rbac.engine.has_role(&subject, &[RoleRef::from(editor.id)]).await?);
    assert!(rbac.engine.has_role(&subject, &[RoleRef::from(editor.clone())]).await?);
    assert!(!rbac.engine.has_role(&subject, &[RoleRef::from("writer")]).await?);
    Ok(())
}

#[tokio::test]
async fn pipe_delimited_alternatives_use_or_semantics() -> Result<()> {
    let rbac = setup(false);
    rbac.roles.create(RoleAttributes::new("editor", "Editor")).await?;
    let subject = Subject::user(1);
    rbac.engine.assign_role(&subject, &[RoleRef::from("editor")]).await?;

    assert!(rbac.engine.has_role_named(&subject, "writer|editor").await?);
    assert!(!rbac.engine.has_role_named(&subject, "writer|admin").await?);
    Ok(())
}

#[tokio::test]
async fn has_all_roles_requires_a_superset() -> Result<()> {
    let rbac = setup(true);
    rbac.roles.create(RoleAttributes::new("role_a", "Role A")).await?;
    rbac.roles.create(RoleAttributes::new("role_b", "Role B")).await?;
    let subject = Subject::user(1);
    rbac.engine.assign_role(&subject, &[RoleRef::from("role_a")]).await?;

    assert!(rbac.engine.has_all_roles(&subject, &[RoleRef::from("role_a")]).await?);
    assert!(
        !rbac
            .engine
            .has_all_roles(&subject, &[RoleRef::from("role_a"), RoleRef::from("role_b")])
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn first_role_is_the_primary_one() -> Result<()> {
    let rbac = setup(true);
    rbac.roles.create(RoleAttributes::new("role_a", "Role A")).await?;
    rbac.roles.create(RoleAttributes::new("role_b", "Role B")).await?;
    let subject = Subject::user(1);

    rbac.engine.assign_role(&subject, &[RoleRef::from("role_b")]).await?;
    rbac.engine.assign_role(&subject, &[RoleRef::from("role_a")]).await?;

    assert_eq!(rbac.engine.get_first_role(&subject).await?.name, "role_b");
    Ok(())
}
