use async_trait::async_trait;
use parishdesk_core::{AppResult, PermissionId, RoleId, UserId};
use parishdesk_domain::{Permission, ScopePredicate};

/// Storage port for role and user permission grants.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Lists live permissions granted to a role.
    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>>;

    /// Lists live permissions granted directly to a user.
    async fn list_user_permissions(&self, user_id: UserId) -> AppResult<Vec<Permission>>;

    /// Grants a permission to a role. Returns `false` when already granted.
    async fn assign_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool>;

    /// Revokes a permission from a role. Returns `false` when not granted.
    async fn remove_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool>;

    /// Replaces the permission set of a role in one transaction.
    ///
    /// Every id must name a live permission admitted by `grantable`, otherwise
    /// the call fails with `Validation` and the stored set is unchanged.
    /// Returns the size of the final set.
    async fn sync_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        grantable: ScopePredicate,
    ) -> AppResult<usize>;

    /// Grants a permission directly to a user. Returns `false` when already granted.
    async fn assign_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool>;

    /// Revokes a direct user grant. Returns `false` when not granted.
    async fn remove_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool>;
}
