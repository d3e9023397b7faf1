use async_trait::async_trait;
use parishdesk_core::{AppResult, RoleId, TenantId, UserId};
use parishdesk_domain::AssignedRole;

/// User projection needed for direct grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRecord {
    /// User identifier.
    pub id: UserId,
    /// Tenant of the user; `None` for system users.
    pub tenant_id: Option<TenantId>,
    /// Assigned role.
    pub role_id: Option<RoleId>,
}

/// Port onto the identity context.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Loads the role snapshot used for classification.
    async fn find_assigned_role(&self, role_id: RoleId) -> AppResult<Option<AssignedRole>>;

    /// Finds a user by id.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Counts users holding a role.
    async fn count_role_users(&self, role_id: RoleId) -> AppResult<u64>;
}
