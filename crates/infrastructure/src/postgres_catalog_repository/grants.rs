use std::collections::HashSet;

use super::*;

impl PostgresCatalogRepository {
    pub(super) async fn list_granted_permissions(
        &self,
        grant_table: &'static str,
        holder_column: &'static str,
        holder_id: Uuid,
    ) -> AppResult<Vec<Permission>> {
        let statement = format!(
            r#"
            SELECT {PERMISSION_COLUMNS}
            FROM rbac_permissions
            WHERE deleted_at IS NULL
                AND id IN (
                    SELECT permission_id FROM {grant_table} WHERE {holder_column} = $1
                )
            ORDER BY module, category, name
            "#
        );
        let rows = sqlx::query_as::<_, PermissionRow>(statement.as_str())
            .bind(holder_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list permissions granted through {grant_table} to '{holder_id}': {error}"
                ))
            })?;

        Ok(rows.into_iter().map(permission_from_row).collect())
    }

    pub(super) async fn insert_grant(
        &self,
        grant_table: &'static str,
        holder_column: &'static str,
        holder_id: Uuid,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let statement = format!(
            "INSERT INTO {grant_table} ({holder_column}, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        );
        let result = sqlx::query(statement.as_str())
            .bind(holder_id)
            .bind(permission_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| map_write_error(error, "grant permission"))?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn delete_grant(
        &self,
        grant_table: &'static str,
        holder_column: &'static str,
        holder_id: Uuid,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let statement = format!(
            "DELETE FROM {grant_table} WHERE {holder_column} = $1 AND permission_id = $2"
        );
        let result = sqlx::query(statement.as_str())
            .bind(holder_id)
            .bind(permission_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to revoke permission '{permission_id}' from '{holder_id}': {error}"
                ))
            })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn sync_role_permissions_impl(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        grantable: ScopePredicate,
    ) -> AppResult<usize> {
        let mut transaction = begin(&self.pool).await?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM rbac_roles WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock role '{role_id}': {error}")))?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        let granted =
            replace_role_permissions(&mut transaction, role_id, permission_ids, grantable).await?;
        commit(transaction).await?;
        tracing::debug!(role_id = %role_id, granted, "replaced role permission set");

        Ok(granted)
    }
}

/// Replaces the grant set of a role inside the caller's transaction.
///
/// Every id must name a live permission admitted by `grantable`; otherwise
/// nothing is written.
pub(crate) async fn replace_role_permissions(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: RoleId,
    permission_ids: &[PermissionId],
    grantable: ScopePredicate,
) -> AppResult<usize> {
    let mut seen = HashSet::new();
    let requested: Vec<Uuid> = permission_ids
        .iter()
        .map(|permission_id| permission_id.as_uuid())
        .filter(|permission_id| seen.insert(*permission_id))
        .collect();

    if !requested.is_empty() {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT id FROM rbac_permissions WHERE deleted_at IS NULL AND id = ANY(",
        );
        builder.push_bind(requested.clone());
        builder.push(") AND ");
        filters::push_scope(&mut builder, grantable);

        let admitted: HashSet<Uuid> = builder
            .build_query_scalar::<Uuid>()
            .fetch_all(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to validate grantable permissions: {error}"))
            })?
            .into_iter()
            .collect();

        if let Some(rejected) = requested
            .iter()
            .find(|permission_id| !admitted.contains(*permission_id))
        {
            return Err(AppError::Validation(format!(
                "permission '{rejected}' cannot be granted here"
            )));
        }
    }

    sqlx::query("DELETE FROM rbac_role_permissions WHERE role_id = $1")
        .bind(role_id.as_uuid())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to clear permissions of role '{role_id}': {error}"
            ))
        })?;

    if !requested.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO rbac_role_permissions (role_id, permission_id)
            SELECT $1, permission_id
            FROM unnest($2::uuid[]) AS requested(permission_id)
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(requested.as_slice())
        .execute(&mut **transaction)
        .await
        .map_err(|error| map_write_error(error, "grant permissions"))?;
    }

    Ok(requested.len())
}

/// Ids of the active system permissions, in catalog order.
pub(crate) async fn system_catalog_snapshot(
    transaction: &mut Transaction<'_, Postgres>,
) -> AppResult<Vec<PermissionId>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id
        FROM rbac_permissions
        WHERE tenant_id IS NULL
            AND is_custom = false
            AND active = true
            AND deleted_at IS NULL
        ORDER BY module, category, name
        "#,
    )
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!("failed to snapshot the system catalog: {error}"))
    })?;

    Ok(ids.into_iter().map(PermissionId::from_uuid).collect())
}
