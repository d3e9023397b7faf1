use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use parishdesk_application::{GrantRepository, PermissionRepository, RoleRepository};
use parishdesk_core::{AppError, AppResult, PermissionId, RoleId, TenantId, UserId};
use parishdesk_domain::{
    NewPermission, NewRole, Page, Permission, PermissionQuery, PermissionRevision, Role,
    RoleLevel, RoleQuery, RoleRevision, ScopePredicate, name_key,
};

mod filters;
mod grants;
mod permissions;
mod roles;

pub(crate) use grants::{replace_role_permissions, system_catalog_snapshot};
pub(crate) use roles::insert_role;

/// PostgreSQL-backed repository for the role and permission catalogs.
#[derive(Clone)]
pub struct PostgresCatalogRepository {
    pool: PgPool,
}

impl PostgresCatalogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ROLE_COLUMNS: &str = "id, name, description, level, tenant_id, is_custom, active, deleted_at, created_at, updated_at";

const PERMISSION_COLUMNS: &str = "id, name, display_name, description, module, category, tenant_id, is_custom, active, deleted_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    level: i16,
    tenant_id: Option<Uuid>,
    is_custom: bool,
    active: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: Uuid,
    name: String,
    display_name: String,
    description: Option<String>,
    module: String,
    category: String,
    tenant_id: Option<Uuid>,
    is_custom: bool,
    active: bool,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn role_from_row(row: RoleRow) -> AppResult<Role> {
    let level = u8::try_from(row.level).map_err(|error| {
        AppError::Internal(format!("invalid persisted level for role '{}': {error}", row.id))
    })?;

    Ok(Role {
        id: RoleId::from_uuid(row.id),
        name: row.name,
        description: row.description,
        level: RoleLevel::new(level).map_err(|error| {
            AppError::Internal(format!("invalid persisted level for role '{}': {error}", row.id))
        })?,
        tenant_id: row.tenant_id.map(TenantId::from_uuid),
        is_custom: row.is_custom,
        active: row.active,
        deleted_at: row.deleted_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn permission_from_row(row: PermissionRow) -> Permission {
    Permission {
        id: PermissionId::from_uuid(row.id),
        name: row.name,
        display_name: row.display_name,
        description: row.description,
        module: row.module,
        category: row.category,
        tenant_id: row.tenant_id.map(TenantId::from_uuid),
        is_custom: row.is_custom,
        active: row.active,
        deleted_at: row.deleted_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub(crate) async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

pub(crate) async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

/// Maps constraint violations onto caller errors; everything else is internal.
pub(crate) fn map_write_error(error: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23505") => return AppError::Validation(format!("{context}: already exists")),
            Some("23503") => {
                return AppError::Validation(format!("{context}: referenced row does not exist"));
            }
            _ => {}
        }
    }

    AppError::Internal(format!("failed to {context}: {error}"))
}

/// Tombstone state a targeted write expects to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    Live,
    Trashed,
}

/// Locks one catalog row for the rest of the transaction and returns its
/// tenant and current name, or `None` when no row in `state` matches.
async fn lock_catalog_row(
    transaction: &mut Transaction<'_, Postgres>,
    table: &'static str,
    id: Uuid,
    state: RowState,
) -> AppResult<Option<(Option<TenantId>, String)>> {
    let tombstone = match state {
        RowState::Live => "deleted_at IS NULL",
        RowState::Trashed => "deleted_at IS NOT NULL",
    };
    let statement =
        format!("SELECT tenant_id, name FROM {table} WHERE id = $1 AND {tombstone} FOR UPDATE");
    let row = sqlx::query_as::<_, (Option<Uuid>, String)>(statement.as_str())
        .bind(id)
        .fetch_optional(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to lock {table} row '{id}': {error}"))
        })?;

    Ok(row.map(|(tenant_id, name)| (tenant_id.map(TenantId::from_uuid), name)))
}

/// Serializes concurrent writers of the same name and rejects names taken in
/// a colliding namespace.
///
/// Global rows share their namespace with every tenant.
async fn ensure_name_available(
    transaction: &mut Transaction<'_, Postgres>,
    table: &'static str,
    name: &str,
    tenant_id: Option<TenantId>,
    excluded_id: Option<Uuid>,
) -> AppResult<()> {
    let key = name_key(name);

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("{table}:{key}"))
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock name '{name}': {error}")))?;

    let statement = format!(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM {table}
            WHERE deleted_at IS NULL
                AND lower(name) = $1
                AND ($2::uuid IS NULL OR id <> $2)
                AND ($3::uuid IS NULL OR tenant_id IS NULL OR tenant_id = $3)
        )
        "#
    );
    let taken = sqlx::query_scalar::<_, bool>(statement.as_str())
        .bind(key)
        .bind(excluded_id)
        .bind(tenant_id.map(|tenant_id| tenant_id.as_uuid()))
        .fetch_one(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check name '{name}' in {table}: {error}"))
        })?;

    if taken {
        return Err(AppError::Validation(format!(
            "name '{name}' already exists"
        )));
    }

    Ok(())
}

#[async_trait]
impl RoleRepository for PostgresCatalogRepository {
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Page<Role>> {
        self.list_roles_impl(query).await
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        self.find_role_impl(role_id).await
    }

    async fn create_role(&self, role: NewRole) -> AppResult<Role> {
        self.create_role_impl(role).await
    }

    async fn update_role(&self, role_id: RoleId, revision: &RoleRevision) -> AppResult<Role> {
        self.update_role_impl(role_id, revision).await
    }

    async fn set_role_active(&self, role_id: RoleId, active: bool) -> AppResult<Role> {
        self.set_role_active_impl(role_id, active).await
    }

    async fn restore_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.restore_role_impl(role_id).await
    }

    async fn soft_delete_role(&self, role_id: RoleId) -> AppResult<Role> {
        self.soft_delete_role_impl(role_id).await
    }
}

#[async_trait]
impl PermissionRepository for PostgresCatalogRepository {
    async fn list_permissions(&self, query: &PermissionQuery) -> AppResult<Page<Permission>> {
        self.list_permissions_impl(query).await
    }

    async fn list_modules(&self, scope: ScopePredicate) -> AppResult<Vec<String>> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT DISTINCT module FROM rbac_permissions WHERE deleted_at IS NULL AND ",
        );
        filters::push_scope(&mut builder, scope);
        builder.push(" ORDER BY module");

        builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list modules: {error}")))
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        self.find_permission_impl(permission_id).await
    }

    async fn create_permission(&self, permission: NewPermission) -> AppResult<Permission> {
        self.create_permission_impl(permission).await
    }

    async fn update_permission(
        &self,
        permission_id: PermissionId,
        revision: &PermissionRevision,
    ) -> AppResult<Permission> {
        self.update_permission_impl(permission_id, revision).await
    }

    async fn set_permission_active(
        &self,
        permission_id: PermissionId,
        active: bool,
    ) -> AppResult<Permission> {
        self.set_permission_active_impl(permission_id, active).await
    }

    async fn restore_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.restore_permission_impl(permission_id).await
    }

    async fn soft_delete_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        self.soft_delete_permission_impl(permission_id).await
    }
}

#[async_trait]
impl GrantRepository for PostgresCatalogRepository {
    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        self.list_granted_permissions("rbac_role_permissions", "role_id", role_id.as_uuid())
            .await
    }

    async fn list_user_permissions(&self, user_id: UserId) -> AppResult<Vec<Permission>> {
        self.list_granted_permissions("rbac_user_permissions", "user_id", user_id.as_uuid())
            .await
    }

    async fn assign_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.insert_grant(
            "rbac_role_permissions",
            "role_id",
            role_id.as_uuid(),
            permission_id,
        )
        .await
    }

    async fn remove_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.delete_grant(
            "rbac_role_permissions",
            "role_id",
            role_id.as_uuid(),
            permission_id,
        )
        .await
    }

    async fn sync_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        grantable: ScopePredicate,
    ) -> AppResult<usize> {
        self.sync_role_permissions_impl(role_id, permission_ids, grantable)
            .await
    }

    async fn assign_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.insert_grant(
            "rbac_user_permissions",
            "user_id",
            user_id.as_uuid(),
            permission_id,
        )
        .await
    }

    async fn remove_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        self.delete_grant(
            "rbac_user_permissions",
            "user_id",
            user_id.as_uuid(),
            permission_id,
        )
        .await
    }
}
