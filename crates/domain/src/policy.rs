//! Write-path authorization for the role and permission catalogs.
//!
//! Every function here is pure: it receives the classified actor and a
//! snapshot of the target and returns a decision.

use parishdesk_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};

use crate::actor::{ADMINISTRATOR_ROLE_NAME, Actor, ActorClass};
use crate::catalog::{
    CatalogResource, NewPermission, NewRole, Ownership, PermissionDraft, RoleDraft, RoleLevel,
    ensure_role_name_allowed, normalize_optional, validate_name,
};

/// Mutations gated by the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    /// Create a row.
    Create,
    /// Change descriptive fields.
    Update,
    /// Soft delete.
    Delete,
    /// Set the status flag.
    Activate,
    /// Clear the status flag.
    Deactivate,
    /// Clear the soft-delete marker.
    Restore,
    /// Change the permission set of a role (assign, remove, sync).
    Grant,
}

impl MutationAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Restore => "restore",
            Self::Grant => "grant",
        }
    }

    fn changes_status(self) -> bool {
        matches!(self, Self::Activate | Self::Deactivate | Self::Restore)
    }
}

/// Rejects actors that may not manage the catalogs at all.
pub fn can_manage(actor: &Actor) -> AppResult<()> {
    actor.require_standing()?;
    match actor.class() {
        ActorClass::SuperAdmin | ActorClass::SystemOperator | ActorClass::TenantAdmin => Ok(()),
        ActorClass::TenantUser | ActorClass::Orphan => Err(AppError::Forbidden(format!(
            "user '{}' may not manage roles or permissions",
            actor.user_id()
        ))),
    }
}

/// Decides whether `actor` may perform `action` on an existing row.
pub fn authorize_target<R>(actor: &Actor, target: &R, action: MutationAction) -> AppResult<()>
where
    R: CatalogResource + ?Sized,
{
    can_manage(actor)?;

    let ownership = target.ownership();
    let kind = target.kind().as_str();
    let label = target.label();

    match action {
        MutationAction::Update | MutationAction::Delete if !ownership.is_custom => {
            return Err(AppError::Immutable(format!(
                "{kind} '{label}' is system-managed and cannot be changed"
            )));
        }
        _ if action.changes_status() && !ownership.is_custom && !actor.is_super_admin() => {
            return Err(AppError::Forbidden(format!(
                "only a super admin may change the status of system {kind} '{label}'"
            )));
        }
        MutationAction::Grant if ownership.tenant_id.is_none() && !actor.is_super_admin() => {
            return Err(AppError::Forbidden(format!(
                "only a super admin may change grants of global {kind} '{label}'"
            )));
        }
        _ => {}
    }

    if ownership.is_anomalous() && !actor.is_super_admin() {
        return Err(AppError::Forbidden(format!(
            "{kind} '{label}' has no owning tenant and may only be changed by a super admin"
        )));
    }

    require_same_tenant(actor, ownership.tenant_id, || format!("{kind} '{label}'"))
}

/// Decides whether `actor` may change direct grants of a user in `user_tenant`.
pub fn authorize_user_grant(actor: &Actor, user_tenant: Option<TenantId>) -> AppResult<()> {
    can_manage(actor)?;

    if user_tenant.is_none() && !actor.is_super_admin() {
        return Err(AppError::Forbidden(
            "only a super admin may change grants of system users".to_owned(),
        ));
    }

    require_same_tenant(actor, user_tenant, || "user".to_owned())
}

fn require_same_tenant(
    actor: &Actor,
    target_tenant: Option<TenantId>,
    describe: impl FnOnce() -> String,
) -> AppResult<()> {
    if actor.class() != ActorClass::TenantAdmin {
        return Ok(());
    }

    match target_tenant {
        Some(tenant_id) if Some(tenant_id) != actor.tenant_id() => Err(AppError::Forbidden(
            format!("{} belongs to another tenant", describe()),
        )),
        _ => Ok(()),
    }
}

/// Sanitizes a role payload: strips ownership markers the actor may not choose.
pub fn sanitize_role_draft(actor: &Actor, draft: RoleDraft) -> AppResult<NewRole> {
    can_manage(actor)?;
    let ownership = resolve_ownership(actor, draft.tenant_id, draft.is_custom)?;
    ensure_role_name_allowed(ownership.tenant_id, draft.name.as_str())?;

    validated_role(draft, ownership)
}

/// Sanitizes the singleton Administrator role of a tenant being provisioned.
///
/// Provisioning runs as operator tooling without a classified actor, so the
/// ownership markers are fixed here: tenant-scoped and system-managed.
pub fn sanitize_administrator_role(tenant_id: TenantId) -> AppResult<NewRole> {
    validated_role(
        RoleDraft {
            name: ADMINISTRATOR_ROLE_NAME.to_owned(),
            description: Some("Full administrative access for the tenant".to_owned()),
            level: Some(RoleLevel::HIGHEST.value()),
            active: Some(true),
            ..RoleDraft::default()
        },
        Ownership::tenant_managed(tenant_id),
    )
}

fn validated_role(draft: RoleDraft, ownership: Ownership) -> AppResult<NewRole> {
    Ok(NewRole {
        name: validate_name(draft.name.as_str())?,
        description: normalize_optional(draft.description),
        level: draft
            .level
            .map(RoleLevel::new)
            .transpose()?
            .unwrap_or_default(),
        ownership,
        active: draft.active.unwrap_or(true),
    })
}

/// Sanitizes a permission payload: strips ownership markers the actor may not choose.
pub fn sanitize_permission_draft(
    actor: &Actor,
    draft: PermissionDraft,
) -> AppResult<NewPermission> {
    can_manage(actor)?;
    let ownership = resolve_ownership(actor, draft.tenant_id, draft.is_custom)?;
    let name = validate_name(draft.name.as_str())?;
    let display_name = match normalize_optional(draft.display_name) {
        Some(display_name) => validate_name(display_name.as_str())?,
        None => name.clone(),
    };

    Ok(NewPermission {
        name,
        display_name,
        description: normalize_optional(draft.description),
        module: parishdesk_core::NonEmptyString::new(draft.module)?,
        category: parishdesk_core::NonEmptyString::new(draft.category)?,
        ownership,
        active: draft.active.unwrap_or(true),
    })
}

fn resolve_ownership(
    actor: &Actor,
    requested_tenant: Option<TenantId>,
    requested_custom: Option<bool>,
) -> AppResult<Ownership> {
    if actor.is_super_admin() {
        let ownership = Ownership {
            tenant_id: requested_tenant,
            is_custom: requested_custom.unwrap_or(false),
        };
        if ownership.is_anomalous() {
            return Err(AppError::Validation(
                "custom roles and permissions must belong to a tenant".to_owned(),
            ));
        }
        return Ok(ownership);
    }

    match actor.tenant_id() {
        Some(tenant_id) => Ok(Ownership::custom(tenant_id)),
        None => Err(AppError::Forbidden(format!(
            "user '{}' has no tenant to own custom roles or permissions",
            actor.user_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parishdesk_core::{
        ActorIdentity, AppError, PermissionId, RoleId, SystemFlags, TenantId, UserId,
    };

    use super::{
        MutationAction, authorize_target, authorize_user_grant, can_manage,
        sanitize_administrator_role, sanitize_permission_draft, sanitize_role_draft,
    };
    use crate::actor::{ADMINISTRATOR_ROLE_NAME, Actor, AssignedRole};
    use crate::catalog::{Ownership, Permission, PermissionDraft, Role, RoleDraft, RoleLevel};

    fn tenant_member(tenant_id: TenantId, role_name: &str) -> Actor {
        let role_id = RoleId::new();
        Actor::classify(
            ActorIdentity::new(
                UserId::new(),
                Some(tenant_id),
                Some(role_id),
                SystemFlags::none(),
            ),
            Some(&AssignedRole {
                role_id,
                name: role_name.to_owned(),
                tenant_id: Some(tenant_id),
            }),
        )
    }

    fn system_actor(flags: SystemFlags, tenant_id: Option<TenantId>) -> Actor {
        Actor::classify(ActorIdentity::new(UserId::new(), tenant_id, None, flags), None)
    }

    fn operator() -> Actor {
        system_actor(
            SystemFlags {
                system_admin: true,
                ..SystemFlags::none()
            },
            None,
        )
    }

    fn role(ownership: Ownership) -> Role {
        let now = Utc::now();
        Role {
            id: RoleId::new(),
            name: "Sacristan".to_owned(),
            description: None,
            level: RoleLevel::DEFAULT,
            tenant_id: ownership.tenant_id,
            is_custom: ownership.is_custom,
            active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn permission(ownership: Ownership) -> Permission {
        let now = Utc::now();
        Permission {
            id: PermissionId::new(),
            name: "families.view".to_owned(),
            display_name: "View families".to_owned(),
            description: None,
            module: "families".to_owned(),
            category: "read".to_owned(),
            tenant_id: ownership.tenant_id,
            is_custom: ownership.is_custom,
            active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_administrators_and_system_actors_can_manage() {
        let tenant_id = TenantId::new();
        assert!(can_manage(&tenant_member(tenant_id, ADMINISTRATOR_ROLE_NAME)).is_ok());
        assert!(can_manage(&operator()).is_ok());
        assert!(can_manage(&system_actor(SystemFlags::super_admin(), None)).is_ok());
        assert!(matches!(
            can_manage(&tenant_member(tenant_id, "Catechist")),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            can_manage(&system_actor(SystemFlags::none(), None)),
            Err(AppError::TenantRequired(_))
        ));
    }

    #[test]
    fn system_rows_are_immutable_for_every_actor() {
        let tenant_id = TenantId::new();
        let actors = [
            system_actor(SystemFlags::super_admin(), None),
            operator(),
            tenant_member(tenant_id, ADMINISTRATOR_ROLE_NAME),
        ];
        let targets = [
            Ownership::system(),
            Ownership::tenant_managed(tenant_id),
        ];

        for actor in &actors {
            for ownership in targets {
                for action in [MutationAction::Update, MutationAction::Delete] {
                    assert!(matches!(
                        authorize_target(actor, &role(ownership), action),
                        Err(AppError::Immutable(_))
                    ));
                    assert!(matches!(
                        authorize_target(actor, &permission(ownership), action),
                        Err(AppError::Immutable(_))
                    ));
                }
            }
        }
    }

    #[test]
    fn status_of_system_rows_requires_super_admin() {
        let target = permission(Ownership::system());
        assert!(
            authorize_target(
                &system_actor(SystemFlags::super_admin(), None),
                &target,
                MutationAction::Deactivate
            )
            .is_ok()
        );
        assert!(matches!(
            authorize_target(&operator(), &target, MutationAction::Deactivate),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn tenant_admin_cannot_touch_foreign_rows() {
        let own = TenantId::new();
        let actor = tenant_member(own, ADMINISTRATOR_ROLE_NAME);

        assert!(
            authorize_target(&actor, &role(Ownership::custom(own)), MutationAction::Update).is_ok()
        );
        assert!(matches!(
            authorize_target(
                &actor,
                &role(Ownership::custom(TenantId::new())),
                MutationAction::Update
            ),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_user_grant(&actor, Some(TenantId::new())),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn global_roles_accept_grants_from_super_admin_only() {
        let target = role(Ownership::system());
        assert!(matches!(
            authorize_target(&operator(), &target, MutationAction::Grant),
            Err(AppError::Forbidden(_))
        ));
        assert!(
            authorize_target(
                &system_actor(SystemFlags::super_admin(), None),
                &target,
                MutationAction::Grant
            )
            .is_ok()
        );

        let tenant_id = TenantId::new();
        let administrator = role(Ownership::tenant_managed(tenant_id));
        assert!(
            authorize_target(
                &tenant_member(tenant_id, ADMINISTRATOR_ROLE_NAME),
                &administrator,
                MutationAction::Grant
            )
            .is_ok()
        );
    }

    #[test]
    fn anomalous_rows_are_reserved_for_super_admin() {
        let anomalous = Ownership {
            tenant_id: None,
            is_custom: true,
        };
        assert!(matches!(
            authorize_target(&operator(), &permission(anomalous), MutationAction::Update),
            Err(AppError::Forbidden(_))
        ));
        assert!(
            authorize_target(
                &system_actor(SystemFlags::super_admin(), None),
                &permission(anomalous),
                MutationAction::Update
            )
            .is_ok()
        );
    }

    #[test]
    fn tenant_admin_payload_is_stripped_of_ownership() {
        let own = TenantId::new();
        let actor = tenant_member(own, ADMINISTRATOR_ROLE_NAME);

        let sanitized = sanitize_permission_draft(
            &actor,
            PermissionDraft {
                name: "export_data".to_owned(),
                module: "reports".to_owned(),
                category: "export".to_owned(),
                tenant_id: Some(TenantId::new()),
                is_custom: Some(false),
                ..PermissionDraft::default()
            },
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(sanitized.ownership, Ownership::custom(own));
        assert_eq!(sanitized.display_name.as_str(), "export_data");
    }

    #[test]
    fn super_admin_chooses_ownership_with_non_custom_default() {
        let actor = system_actor(SystemFlags::super_admin(), None);
        let tenant_id = TenantId::new();

        let system = sanitize_role_draft(
            &actor,
            RoleDraft {
                name: "Auditor".to_owned(),
                ..RoleDraft::default()
            },
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(system.ownership, Ownership::system());
        assert_eq!(system.level, RoleLevel::DEFAULT);

        let custom = sanitize_role_draft(
            &actor,
            RoleDraft {
                name: "Auditor".to_owned(),
                tenant_id: Some(tenant_id),
                is_custom: Some(true),
                ..RoleDraft::default()
            },
        )
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(custom.ownership, Ownership::custom(tenant_id));

        let orphaned = sanitize_role_draft(
            &actor,
            RoleDraft {
                name: "Auditor".to_owned(),
                is_custom: Some(true),
                ..RoleDraft::default()
            },
        );
        assert!(matches!(orphaned, Err(AppError::Validation(_))));
    }

    #[test]
    fn operator_without_tenant_cannot_create_custom_rows() {
        let result = sanitize_role_draft(
            &operator(),
            RoleDraft {
                name: "Night Shift".to_owned(),
                ..RoleDraft::default()
            },
        );
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn administrator_role_goes_through_role_validation() {
        let tenant_id = TenantId::new();
        let role = sanitize_administrator_role(tenant_id).unwrap_or_else(|_| unreachable!());

        assert_eq!(role.name.as_str(), ADMINISTRATOR_ROLE_NAME);
        assert_eq!(role.level, RoleLevel::HIGHEST);
        assert_eq!(role.ownership, Ownership::tenant_managed(tenant_id));
        assert!(!role.ownership.is_system());
        assert!(role.active);
    }

    #[test]
    fn global_roles_cannot_take_the_administrator_name() {
        let actor = system_actor(SystemFlags::super_admin(), None);

        let global = sanitize_role_draft(
            &actor,
            RoleDraft {
                name: "ADMINISTRATOR".to_owned(),
                ..RoleDraft::default()
            },
        );
        assert!(matches!(global, Err(AppError::Validation(_))));

        let scoped = sanitize_role_draft(
            &actor,
            RoleDraft {
                name: ADMINISTRATOR_ROLE_NAME.to_owned(),
                tenant_id: Some(TenantId::new()),
                is_custom: Some(true),
                ..RoleDraft::default()
            },
        );
        assert!(scoped.is_ok());
    }
}
