use std::sync::Arc;

use parishdesk_core::{AppError, TenantId};
use parishdesk_domain::{
    AuditAction, AuditOutcome, Ownership, PageRequest, RoleChanges, RoleDraft, RoleLevel,
    RoleListFilters, RoleRevision, TrashedFilter,
};

use super::RoleService;
use crate::access_ports::RoleRepository;
use crate::test_support::{
    FakeCatalog, orphan, super_admin, system_operator, tenant_admin, tenant_user,
};

fn service(catalog: &Arc<FakeCatalog>) -> RoleService {
    RoleService::new(
        catalog.clone(),
        catalog.clone(),
        catalog.clone(),
        catalog.clone(),
    )
}

#[tokio::test]
async fn tenant_actors_list_only_their_own_roles() {
    let catalog = Arc::new(FakeCatalog::default());
    let own = TenantId::new();
    let foreign = TenantId::new();
    let admin = tenant_admin(&catalog, own).await;
    let member = tenant_user(&catalog, own).await;
    catalog.seed_role("Auditor", Ownership::system()).await;
    catalog.seed_role("Treasurer", Ownership::custom(foreign)).await;

    for actor in [&admin, &member] {
        let page = service(&catalog)
            .list(actor, RoleListFilters::default(), PageRequest::All)
            .await
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(page.meta.total, 2);
        assert!(page.items.iter().all(|role| role.tenant_id == Some(own)));
    }

    let everything = service(&catalog)
        .list(
            &system_operator(),
            RoleListFilters {
                tenant_id: Some(foreign),
                ..RoleListFilters::default()
            },
            PageRequest::All,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(everything.meta.total, 4);

    let narrowed = service(&catalog)
        .list(
            &super_admin(),
            RoleListFilters {
                tenant_id: Some(foreign),
                ..RoleListFilters::default()
            },
            PageRequest::All,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(narrowed.meta.total, 1);
}

#[tokio::test]
async fn orphan_reads_are_refused_and_audited() {
    let catalog = Arc::new(FakeCatalog::default());
    let role = catalog.seed_role("Auditor", Ownership::system()).await;
    let actor = orphan();

    let listed = service(&catalog)
        .list(&actor, RoleListFilters::default(), PageRequest::default())
        .await;
    assert!(matches!(listed, Err(AppError::TenantRequired(_))));

    let fetched = service(&catalog).get(&actor, role.id).await;
    assert!(matches!(fetched, Err(AppError::TenantRequired(_))));

    let events = catalog.events().await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| {
        event.action == AuditAction::CatalogRead
            && event.outcome.error_code() == Some("tenant_required")
    }));
}

#[tokio::test]
async fn rows_outside_scope_are_not_found() {
    let catalog = Arc::new(FakeCatalog::default());
    let own = TenantId::new();
    let admin = tenant_admin(&catalog, own).await;
    let foreign = catalog
        .seed_role("Treasurer", Ownership::custom(TenantId::new()))
        .await;

    let fetched = service(&catalog).get(&admin, foreign.id).await;
    assert!(matches!(fetched, Err(AppError::NotFound(_))));

    let updated = service(&catalog)
        .update(&admin, foreign.id, RoleChanges::default())
        .await;
    assert!(matches!(updated, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn system_managed_roles_are_immutable() {
    let catalog = Arc::new(FakeCatalog::default());
    let own = TenantId::new();
    let admin = tenant_admin(&catalog, own).await;
    let global = catalog.seed_role("Auditor", Ownership::system()).await;
    let administrator = service(&catalog)
        .list(&admin, RoleListFilters::default(), PageRequest::All)
        .await
        .unwrap_or_else(|_| unreachable!())
        .items
        .remove(0);

    let renamed = service(&catalog)
        .update(
            &super_admin(),
            global.id,
            RoleChanges {
                name: Some("Inspector".to_owned()),
                ..RoleChanges::default()
            },
        )
        .await;
    assert!(matches!(renamed, Err(AppError::Immutable(_))));

    let deleted = service(&catalog).delete(&admin, administrator.id).await;
    assert!(matches!(deleted, Err(AppError::Immutable(_))));

    let denied = catalog.events().await;
    assert!(
        denied
            .iter()
            .any(|event| event.outcome == AuditOutcome::Denied {
                code: "immutable".to_owned()
            })
    );
}

#[tokio::test]
async fn tenant_admin_creates_custom_role_in_own_tenant() {
    let catalog = Arc::new(FakeCatalog::default());
    let own = TenantId::new();
    let admin = tenant_admin(&catalog, own).await;

    let role = service(&catalog)
        .create(
            &admin,
            RoleDraft {
                name: "Sacristan".to_owned(),
                level: Some(3),
                tenant_id: Some(TenantId::new()),
                is_custom: Some(false),
                ..RoleDraft::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(role.tenant_id, Some(own));
    assert!(role.is_custom);
    assert_eq!(role.level, RoleLevel::new(3).unwrap_or_default());

    let events = catalog.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::RoleCreated);
    assert_eq!(events[0].outcome, AuditOutcome::Succeeded);
    assert_eq!(events[0].target_id, Some(role.id.to_string()));
}

#[tokio::test]
async fn tenant_user_cannot_create_roles() {
    let catalog = Arc::new(FakeCatalog::default());
    let member = tenant_user(&catalog, TenantId::new()).await;

    let result = service(&catalog)
        .create(
            &member,
            RoleDraft {
                name: "Sacristan".to_owned(),
                ..RoleDraft::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn role_with_holders_cannot_be_deleted() {
    let catalog = Arc::new(FakeCatalog::default());
    let own = TenantId::new();
    let admin = tenant_admin(&catalog, own).await;
    let held = catalog.seed_role("Lector", Ownership::custom(own)).await;
    let free = catalog.seed_role("Usher", Ownership::custom(own)).await;
    catalog.seed_user(Some(own), Some(held.id)).await;

    let refused = service(&catalog).delete(&admin, held.id).await;
    assert!(matches!(refused, Err(AppError::HasDependents(_))));
    let detail = service(&catalog)
        .get(&admin, held.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(detail.users_count, 1);
    assert!(detail.role.deleted_at.is_none());

    let deleted = service(&catalog)
        .delete(&admin, free.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(deleted.deleted_at.is_some());
    assert!(matches!(
        service(&catalog).get(&admin, free.id).await,
        Err(AppError::NotFound(_))
    ));

    let trashed = service(&catalog)
        .list(
            &admin,
            RoleListFilters {
                trashed: TrashedFilter::Only,
                ..RoleListFilters::default()
            },
            PageRequest::All,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(trashed.items.len(), 1);
    assert_eq!(trashed.items[0].id, free.id);
}

#[tokio::test]
async fn restore_rechecks_name_uniqueness() {
    let catalog = Arc::new(FakeCatalog::default());
    let own = TenantId::new();
    let admin = tenant_admin(&catalog, own).await;
    let original = catalog.seed_role("Usher", Ownership::custom(own)).await;

    service(&catalog)
        .delete(&admin, original.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    service(&catalog)
        .create(
            &admin,
            RoleDraft {
                name: "usher".to_owned(),
                ..RoleDraft::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    let restored = service(&catalog).restore(&admin, original.id).await;
    assert!(matches!(restored, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn status_of_global_roles_requires_super_admin() {
    let catalog = Arc::new(FakeCatalog::default());
    let global = catalog.seed_role("Auditor", Ownership::system()).await;

    let refused = service(&catalog)
        .deactivate(&system_operator(), global.id)
        .await;
    assert!(matches!(refused, Err(AppError::Forbidden(_))));

    let deactivated = service(&catalog)
        .deactivate(&super_admin(), global.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(!deactivated.active);

    let reactivated = service(&catalog)
        .activate(&super_admin(), global.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(reactivated.active);
}

#[tokio::test]
async fn status_writes_never_roll_back_descriptive_fields() {
    let catalog = Arc::new(FakeCatalog::default());
    let own = TenantId::new();
    let admin = tenant_admin(&catalog, own).await;
    let read_early = catalog.seed_role("Lector", Ownership::custom(own)).await;

    service(&catalog)
        .update(
            &admin,
            read_early.id,
            RoleChanges {
                name: Some("Reader".to_owned()),
                ..RoleChanges::default()
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    let deactivated = service(&catalog)
        .deactivate(&admin, read_early.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(deactivated.name, "Reader");
    assert!(!deactivated.active);

    service(&catalog)
        .delete(&admin, read_early.id)
        .await
        .unwrap_or_else(|_| unreachable!());
    let late_update = catalog
        .update_role(
            read_early.id,
            &RoleRevision {
                description: Some(Some("late".to_owned())),
                ..RoleRevision::default()
            },
        )
        .await;
    assert!(matches!(late_update, Err(AppError::NotFound(_))));
    let late_status = catalog.set_role_active(read_early.id, true).await;
    assert!(matches!(late_status, Err(AppError::NotFound(_))));

    let stored = catalog
        .find_role(read_early.id)
        .await
        .unwrap_or_else(|_| unreachable!())
        .unwrap_or_else(|| unreachable!());
    assert!(stored.deleted_at.is_some());
    assert!(!stored.active);
    assert_eq!(stored.description, None);
}
