use async_trait::async_trait;
use parishdesk_core::{AppResult, PermissionId, RoleId};
use parishdesk_domain::{
    NewPermission, NewRole, Page, Permission, PermissionQuery, PermissionRevision, Role, RoleQuery,
    RoleRevision, ScopePredicate,
};

/// Storage port for the role catalog.
///
/// Writes enforce case-insensitive name uniqueness among live rows sharing a
/// namespace and report collisions as `Validation`.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists one page of roles matching the resolved query.
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Page<Role>>;

    /// Finds a role by id, soft-deleted rows included.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Inserts a sanitized role.
    async fn create_role(&self, role: NewRole) -> AppResult<Role>;

    /// Writes the revised descriptive fields of a live role.
    ///
    /// Fails with `NotFound` when the role is missing or soft-deleted.
    async fn update_role(&self, role_id: RoleId, revision: &RoleRevision) -> AppResult<Role>;

    /// Sets the status flag of a live role.
    async fn set_role_active(&self, role_id: RoleId, active: bool) -> AppResult<Role>;

    /// Clears the soft-delete marker of a deleted role.
    ///
    /// The name is checked again since a live row may have taken it meanwhile.
    async fn restore_role(&self, role_id: RoleId) -> AppResult<Role>;

    /// Soft deletes a role, refusing with `HasDependents` while users hold it.
    async fn soft_delete_role(&self, role_id: RoleId) -> AppResult<Role>;
}

/// Storage port for the permission catalog.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Lists one page of permissions matching the resolved query.
    async fn list_permissions(&self, query: &PermissionQuery) -> AppResult<Page<Permission>>;

    /// Lists distinct modules of live permissions admitted by the scope.
    async fn list_modules(&self, scope: ScopePredicate) -> AppResult<Vec<String>>;

    /// Finds a permission by id, soft-deleted rows included.
    async fn find_permission(&self, permission_id: PermissionId)
    -> AppResult<Option<Permission>>;

    /// Inserts a sanitized permission.
    async fn create_permission(&self, permission: NewPermission) -> AppResult<Permission>;

    /// Writes the revised descriptive fields of a live permission.
    async fn update_permission(
        &self,
        permission_id: PermissionId,
        revision: &PermissionRevision,
    ) -> AppResult<Permission>;

    /// Sets the status flag of a live permission.
    async fn set_permission_active(
        &self,
        permission_id: PermissionId,
        active: bool,
    ) -> AppResult<Permission>;

    /// Clears the soft-delete marker of a deleted permission after re-checking its name.
    async fn restore_permission(&self, permission_id: PermissionId) -> AppResult<Permission>;

    /// Soft deletes a permission. Existing grants are kept.
    async fn soft_delete_permission(&self, permission_id: PermissionId) -> AppResult<Permission>;
}
