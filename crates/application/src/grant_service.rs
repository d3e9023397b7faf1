use std::collections::HashSet;
use std::sync::Arc;

use parishdesk_core::{AppError, AppResult, PermissionId, RoleId, TenantId, UserId};
use parishdesk_domain::{
    Actor, AuditAction, CatalogResource, MutationAction, Permission, Role, TrashedFilter,
    authorize_target, authorize_user_grant, grantable_permissions_for, user_visible,
};
use serde::{Deserialize, Serialize};

use crate::access_ports::{
    AuditRepository, GrantRepository, IdentityRepository, PermissionRepository, RoleRepository,
    UserRecord,
};
use crate::audit_trail::{AuditTrail, Operation, found};
use crate::role_service::visible_role;

const ROLE_GRANT_RESOURCE: &str = "rbac_role_permission";
const USER_GRANT_RESOURCE: &str = "rbac_user_permission";

/// Result of a bulk grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGrantResult {
    /// Role whose permission set was replaced.
    pub role_id: RoleId,
    /// Size of the final permission set.
    pub granted_count: usize,
}

/// Application service for role and user permission grants.
#[derive(Clone)]
pub struct GrantService {
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
    grants: Arc<dyn GrantRepository>,
    identity: Arc<dyn IdentityRepository>,
    audit: AuditTrail,
}

impl GrantService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        permissions: Arc<dyn PermissionRepository>,
        grants: Arc<dyn GrantRepository>,
        identity: Arc<dyn IdentityRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            roles,
            permissions,
            grants,
            identity,
            audit: AuditTrail::new(audit_repository),
        }
    }

    /// Lists live permissions granted to a visible role.
    pub async fn role_permissions(
        &self,
        actor: &Actor,
        role_id: RoleId,
    ) -> AppResult<Vec<Permission>> {
        let operation = Operation::new(
            "role_permission.list",
            AuditAction::CatalogRead,
            ROLE_GRANT_RESOURCE,
            actor,
        )
        .target(role_id);
        let result: AppResult<Vec<Permission>> = async {
            let role =
                visible_role(self.roles.as_ref(), actor, role_id, TrashedFilter::Exclude).await?;
            self.grants.list_role_permissions(role.id).await
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Lists live permissions granted directly to a visible user.
    pub async fn user_permissions(
        &self,
        actor: &Actor,
        user_id: UserId,
    ) -> AppResult<Vec<Permission>> {
        let operation = Operation::new(
            "user_permission.list",
            AuditAction::CatalogRead,
            USER_GRANT_RESOURCE,
            actor,
        )
        .target(user_id);
        let result: AppResult<Vec<Permission>> = async {
            let user = self.visible_user(actor, user_id).await?;
            self.grants.list_user_permissions(user.id).await
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Grants one permission to a role.
    pub async fn assign_to_role(
        &self,
        actor: &Actor,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let operation = Operation::new(
            "role_permission.assign",
            AuditAction::RolePermissionAssigned,
            ROLE_GRANT_RESOURCE,
            actor,
        )
        .target(format!("{role_id}:{permission_id}"));
        let result: AppResult<bool> = async {
            let role = self.grantable_role(actor, role_id).await?;
            let permission = self.grantable_permission(role.tenant_id, permission_id).await?;

            let changed = self
                .grants
                .assign_role_permission(role.id, permission.id)
                .await?;
            self.audit
                .succeeded(
                    &operation,
                    role.tenant_id,
                    format!(
                        "assigned permission '{}' to role '{}'",
                        permission.name, role.name
                    ),
                )
                .await?;

            Ok(changed)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Revokes one permission from a role.
    pub async fn remove_from_role(
        &self,
        actor: &Actor,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let operation = Operation::new(
            "role_permission.remove",
            AuditAction::RolePermissionRemoved,
            ROLE_GRANT_RESOURCE,
            actor,
        )
        .target(format!("{role_id}:{permission_id}"));
        let result: AppResult<bool> = async {
            let role = self.grantable_role(actor, role_id).await?;

            let changed = self
                .grants
                .remove_role_permission(role.id, permission_id)
                .await?;
            self.audit
                .succeeded(
                    &operation,
                    role.tenant_id,
                    format!("removed permission '{permission_id}' from role '{}'", role.name),
                )
                .await?;

            Ok(changed)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Replaces the permission set of a role.
    ///
    /// Duplicate ids collapse. Any id outside the live catalog grantable to
    /// the role's tenant fails the whole call and nothing changes.
    pub async fn bulk_assign(
        &self,
        actor: &Actor,
        role_id: RoleId,
        permission_ids: Vec<PermissionId>,
    ) -> AppResult<BulkGrantResult> {
        let operation = Operation::new(
            "role_permission.sync",
            AuditAction::RolePermissionsSynced,
            ROLE_GRANT_RESOURCE,
            actor,
        )
        .target(role_id);
        let result: AppResult<BulkGrantResult> = async {
            let role = self.grantable_role(actor, role_id).await?;

            let mut seen = HashSet::new();
            let permission_ids: Vec<PermissionId> = permission_ids
                .into_iter()
                .filter(|permission_id| seen.insert(*permission_id))
                .collect();

            let granted_count = self
                .grants
                .sync_role_permissions(
                    role.id,
                    &permission_ids,
                    grantable_permissions_for(role.tenant_id),
                )
                .await?;
            self.audit
                .succeeded(
                    &operation,
                    role.tenant_id,
                    format!(
                        "synced role '{}' to {granted_count} permission(s)",
                        role.name
                    ),
                )
                .await?;

            Ok(BulkGrantResult {
                role_id: role.id,
                granted_count,
            })
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Grants one permission directly to a user.
    pub async fn assign_to_user(
        &self,
        actor: &Actor,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let operation = Operation::new(
            "user_permission.assign",
            AuditAction::UserPermissionAssigned,
            USER_GRANT_RESOURCE,
            actor,
        )
        .target(format!("{user_id}:{permission_id}"));
        let result: AppResult<bool> = async {
            let user = self.visible_user(actor, user_id).await?;
            authorize_user_grant(actor, user.tenant_id)?;
            let permission = self.grantable_permission(user.tenant_id, permission_id).await?;

            let changed = self
                .grants
                .assign_user_permission(user.id, permission.id)
                .await?;
            self.audit
                .succeeded(
                    &operation,
                    user.tenant_id,
                    format!("assigned permission '{}' to user", permission.name),
                )
                .await?;

            Ok(changed)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Revokes a direct user grant.
    pub async fn remove_from_user(
        &self,
        actor: &Actor,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let operation = Operation::new(
            "user_permission.remove",
            AuditAction::UserPermissionRemoved,
            USER_GRANT_RESOURCE,
            actor,
        )
        .target(format!("{user_id}:{permission_id}"));
        let result: AppResult<bool> = async {
            let user = self.visible_user(actor, user_id).await?;
            authorize_user_grant(actor, user.tenant_id)?;

            let changed = self
                .grants
                .remove_user_permission(user.id, permission_id)
                .await?;
            self.audit
                .succeeded(
                    &operation,
                    user.tenant_id,
                    format!("removed permission '{permission_id}' from user"),
                )
                .await?;

            Ok(changed)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    async fn grantable_role(&self, actor: &Actor, role_id: RoleId) -> AppResult<Role> {
        let role =
            visible_role(self.roles.as_ref(), actor, role_id, TrashedFilter::Exclude).await?;
        authorize_target(actor, &role, MutationAction::Grant)?;
        Ok(role)
    }

    async fn grantable_permission(
        &self,
        owner_tenant: Option<TenantId>,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        let permission = self.permissions.find_permission(permission_id).await?;
        match permission {
            Some(permission)
                if !permission.is_deleted()
                    && grantable_permissions_for(owner_tenant).admits(permission.ownership()) =>
            {
                Ok(permission)
            }
            _ => Err(AppError::Validation(format!(
                "permission '{permission_id}' cannot be granted here"
            ))),
        }
    }

    async fn visible_user(&self, actor: &Actor, user_id: UserId) -> AppResult<UserRecord> {
        actor.require_standing()?;
        let user = found(self.identity.find_user(user_id).await?, "user", user_id)?;
        if !user_visible(actor, user.tenant_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
        }

        Ok(user)
    }
}
