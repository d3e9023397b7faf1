use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use parishdesk_application::{IdentityRepository, UserRecord};
use parishdesk_core::{
    ActorIdentity, AppError, AppResult, RoleId, SystemFlags, TenantId, UserId,
};
use parishdesk_domain::AssignedRole;

/// PostgreSQL-backed view onto the users table.
#[derive(Clone)]
pub struct PostgresIdentityRepository {
    pool: PgPool,
}

impl PostgresIdentityRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads the identity snapshot of a stored user.
    pub async fn find_identity(&self, user_id: UserId) -> AppResult<Option<ActorIdentity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, tenant_id, role_id, is_super_admin, is_system_admin, is_system_manager
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load identity for user '{user_id}': {error}"))
        })?;

        Ok(row.map(|row| {
            ActorIdentity::new(
                UserId::from_uuid(row.id),
                row.tenant_id.map(TenantId::from_uuid),
                row.role_id.map(RoleId::from_uuid),
                SystemFlags {
                    super_admin: row.is_super_admin,
                    system_admin: row.is_system_admin,
                    system_manager: row.is_system_manager,
                },
            )
        }))
    }
}

#[derive(Debug, FromRow)]
struct IdentityRow {
    id: Uuid,
    tenant_id: Option<Uuid>,
    role_id: Option<Uuid>,
    is_super_admin: bool,
    is_system_admin: bool,
    is_system_manager: bool,
}

#[derive(Debug, FromRow)]
struct AssignedRoleRow {
    id: Uuid,
    name: String,
    tenant_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    tenant_id: Option<Uuid>,
    role_id: Option<Uuid>,
}

#[async_trait]
impl IdentityRepository for PostgresIdentityRepository {
    async fn find_assigned_role(&self, role_id: RoleId) -> AppResult<Option<AssignedRole>> {
        let row = sqlx::query_as::<_, AssignedRoleRow>(
            "SELECT id, name, tenant_id FROM rbac_roles WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load assigned role '{role_id}': {error}"))
        })?;

        Ok(row.map(|row| AssignedRole {
            role_id: RoleId::from_uuid(row.id),
            name: row.name,
            tenant_id: row.tenant_id.map(TenantId::from_uuid),
        }))
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row =
            sqlx::query_as::<_, UserRow>("SELECT id, tenant_id, role_id FROM users WHERE id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to find user '{user_id}': {error}"))
                })?;

        Ok(row.map(|row| UserRecord {
            id: UserId::from_uuid(row.id),
            tenant_id: row.tenant_id.map(TenantId::from_uuid),
            role_id: row.role_id.map(RoleId::from_uuid),
        }))
    }

    async fn count_role_users(&self, role_id: RoleId) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to count users holding role '{role_id}': {error}"
                ))
            })?;

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid user count: {error}")))
    }
}
