use std::sync::Arc;

use parishdesk_core::{AppError, AppResult, RoleId};
use parishdesk_domain::{
    Actor, AuditAction, CatalogResource, MutationAction, Page, PageRequest, Permission, Role,
    RoleChanges, RoleDraft, RoleListFilters, RoleQuery, TrashedFilter, authorize_target,
    ensure_role_name_allowed, role_scope, sanitize_role_draft,
};
use serde::Serialize;

use crate::access_ports::{AuditRepository, GrantRepository, IdentityRepository, RoleRepository};
use crate::audit_trail::{AuditTrail, Operation, found};

const ROLE_RESOURCE: &str = "rbac_role";

/// Role with its grants and holder count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDetail {
    /// The role row.
    #[serde(flatten)]
    pub role: Role,
    /// Live permissions granted to the role.
    pub permissions: Vec<Permission>,
    /// Users currently holding the role.
    pub users_count: u64,
}

/// Application service for the role catalog.
#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn RoleRepository>,
    grants: Arc<dyn GrantRepository>,
    identity: Arc<dyn IdentityRepository>,
    audit: AuditTrail,
}

impl RoleService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        grants: Arc<dyn GrantRepository>,
        identity: Arc<dyn IdentityRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            roles,
            grants,
            identity,
            audit: AuditTrail::new(audit_repository),
        }
    }

    /// Lists roles visible to the actor.
    pub async fn list(
        &self,
        actor: &Actor,
        filters: RoleListFilters,
        page: PageRequest,
    ) -> AppResult<Page<Role>> {
        let operation = Operation::new("role.list", AuditAction::CatalogRead, ROLE_RESOURCE, actor);
        let result: AppResult<Page<Role>> = async {
            let query = RoleQuery::for_actor(actor, filters, page)?;
            self.roles.list_roles(&query).await
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Returns one visible role with its grants and holder count.
    pub async fn get(&self, actor: &Actor, role_id: RoleId) -> AppResult<RoleDetail> {
        let operation = Operation::new("role.get", AuditAction::CatalogRead, ROLE_RESOURCE, actor)
            .target(role_id);
        let result: AppResult<RoleDetail> = async {
            let role =
                visible_role(self.roles.as_ref(), actor, role_id, TrashedFilter::Exclude).await?;
            let permissions = self.grants.list_role_permissions(role.id).await?;
            let users_count = self.identity.count_role_users(role.id).await?;

            Ok(RoleDetail {
                role,
                permissions,
                users_count,
            })
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Creates a role after stripping ownership markers the actor may not choose.
    pub async fn create(&self, actor: &Actor, draft: RoleDraft) -> AppResult<Role> {
        let operation =
            Operation::new("role.create", AuditAction::RoleCreated, ROLE_RESOURCE, actor);
        let result: AppResult<Role> = async {
            let new_role = sanitize_role_draft(actor, draft)?;
            let role = self.roles.create_role(new_role).await?;
            self.audit
                .succeeded(
                    &operation.clone().target(role.id),
                    role.tenant_id,
                    format!("created role '{}'", role.name),
                )
                .await?;

            Ok(role)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Updates descriptive fields of a custom role.
    pub async fn update(
        &self,
        actor: &Actor,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<Role> {
        let operation =
            Operation::new("role.update", AuditAction::RoleUpdated, ROLE_RESOURCE, actor)
                .target(role_id);
        let result: AppResult<Role> = async {
            let current =
                visible_role(self.roles.as_ref(), actor, role_id, TrashedFilter::Exclude).await?;
            authorize_target(actor, &current, MutationAction::Update)?;

            let revision = changes.validate()?;
            if let Some(name) = &revision.name {
                ensure_role_name_allowed(current.tenant_id, name.as_str())?;
            }
            let updated = self.roles.update_role(current.id, &revision).await?;
            self.audit
                .succeeded(
                    &operation,
                    updated.tenant_id,
                    format!("updated role '{}'", updated.name),
                )
                .await?;

            Ok(updated)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Soft deletes a custom role that no user holds.
    pub async fn delete(&self, actor: &Actor, role_id: RoleId) -> AppResult<Role> {
        let operation =
            Operation::new("role.delete", AuditAction::RoleDeleted, ROLE_RESOURCE, actor)
                .target(role_id);
        let result: AppResult<Role> = async {
            let current =
                visible_role(self.roles.as_ref(), actor, role_id, TrashedFilter::Exclude).await?;
            authorize_target(actor, &current, MutationAction::Delete)?;

            let deleted = self.roles.soft_delete_role(current.id).await?;
            self.audit
                .succeeded(
                    &operation,
                    deleted.tenant_id,
                    format!("deleted role '{}'", deleted.name),
                )
                .await?;

            Ok(deleted)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Marks a role active.
    pub async fn activate(&self, actor: &Actor, role_id: RoleId) -> AppResult<Role> {
        self.change_status(actor, role_id, MutationAction::Activate)
            .await
    }

    /// Marks a role inactive.
    pub async fn deactivate(&self, actor: &Actor, role_id: RoleId) -> AppResult<Role> {
        self.change_status(actor, role_id, MutationAction::Deactivate)
            .await
    }

    /// Clears the soft-delete marker of a role.
    pub async fn restore(&self, actor: &Actor, role_id: RoleId) -> AppResult<Role> {
        self.change_status(actor, role_id, MutationAction::Restore)
            .await
    }

    async fn change_status(
        &self,
        actor: &Actor,
        role_id: RoleId,
        action: MutationAction,
    ) -> AppResult<Role> {
        let (name, audit_action) = match action {
            MutationAction::Activate => ("role.activate", AuditAction::RoleActivated),
            MutationAction::Deactivate => ("role.deactivate", AuditAction::RoleDeactivated),
            _ => ("role.restore", AuditAction::RoleRestored),
        };
        let operation = Operation::new(name, audit_action, ROLE_RESOURCE, actor).target(role_id);
        let result: AppResult<Role> = async {
            let trashed = if action == MutationAction::Restore {
                TrashedFilter::Only
            } else {
                TrashedFilter::Exclude
            };
            let current = visible_role(self.roles.as_ref(), actor, role_id, trashed).await?;
            authorize_target(actor, &current, action)?;

            let role = match action {
                MutationAction::Activate => self.roles.set_role_active(current.id, true).await?,
                MutationAction::Deactivate => {
                    self.roles.set_role_active(current.id, false).await?
                }
                _ => self.roles.restore_role(current.id).await?,
            };
            self.audit
                .succeeded(
                    &operation,
                    role.tenant_id,
                    format!("{} role '{}'", action.as_str(), role.name),
                )
                .await?;

            Ok(role)
        }
        .await;

        self.audit.conclude(operation, result).await
    }
}

/// Loads a role the actor can see, reporting rows outside scope as missing.
pub(crate) async fn visible_role(
    roles: &dyn RoleRepository,
    actor: &Actor,
    role_id: RoleId,
    trashed: TrashedFilter,
) -> AppResult<Role> {
    let scope = role_scope(actor, None)?;
    let role = found(roles.find_role(role_id).await?, "role", role_id)?;
    if !scope.admits(role.ownership()) || !trashed.admits(role.is_deleted()) {
        return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
    }

    Ok(role)
}

#[cfg(test)]
mod tests;
