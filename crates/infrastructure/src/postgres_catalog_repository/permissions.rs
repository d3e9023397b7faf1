use parishdesk_domain::{PageMeta, PermissionSortField, SortDirection};

use super::*;

impl PostgresCatalogRepository {
    pub(super) async fn list_permissions_impl(
        &self,
        query: &PermissionQuery,
    ) -> AppResult<Page<Permission>> {
        let mut count_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM rbac_permissions WHERE ");
        push_permission_conditions(&mut count_builder, query);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count permissions: {error}"))
            })?;

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "SELECT {PERMISSION_COLUMNS} FROM rbac_permissions WHERE "
        ));
        push_permission_conditions(&mut builder, query);
        push_permission_order(&mut builder, query);
        filters::push_window(&mut builder, query.page)?;

        let items = builder
            .build_query_as::<PermissionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?
            .into_iter()
            .map(permission_from_row)
            .collect::<Vec<_>>();
        let total = u64::try_from(total)
            .map_err(|error| AppError::Internal(format!("invalid permission count: {error}")))?;

        Ok(Page {
            meta: PageMeta::new(query.page, total, items.len()),
            items,
        })
    }

    pub(super) async fn find_permission_impl(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        let statement = format!("SELECT {PERMISSION_COLUMNS} FROM rbac_permissions WHERE id = $1");
        let row = sqlx::query_as::<_, PermissionRow>(statement.as_str())
            .bind(permission_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find permission '{permission_id}': {error}"
                ))
            })?;

        Ok(row.map(permission_from_row))
    }

    pub(super) async fn create_permission_impl(
        &self,
        permission: NewPermission,
    ) -> AppResult<Permission> {
        let mut transaction = begin(&self.pool).await?;
        ensure_name_available(
            &mut transaction,
            "rbac_permissions",
            permission.name.as_str(),
            permission.ownership.tenant_id,
            None,
        )
        .await?;

        let statement = format!(
            r#"
            INSERT INTO rbac_permissions (
                id, tenant_id, name, display_name, description, module, category, is_custom, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PERMISSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PermissionRow>(statement.as_str())
            .bind(PermissionId::new().as_uuid())
            .bind(permission.ownership.tenant_id.map(|tenant_id| tenant_id.as_uuid()))
            .bind(permission.name.as_str())
            .bind(permission.display_name.as_str())
            .bind(permission.description.as_deref())
            .bind(permission.module.as_str())
            .bind(permission.category.as_str())
            .bind(permission.ownership.is_custom)
            .bind(permission.active)
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, "create permission"))?;

        commit(transaction).await?;
        Ok(permission_from_row(row))
    }

    pub(super) async fn update_permission_impl(
        &self,
        permission_id: PermissionId,
        revision: &PermissionRevision,
    ) -> AppResult<Permission> {
        let mut transaction = begin(&self.pool).await?;
        let (tenant_id, _) = lock_catalog_row(
            &mut transaction,
            "rbac_permissions",
            permission_id.as_uuid(),
            RowState::Live,
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("permission '{permission_id}' was not found"))
        })?;
        if let Some(name) = &revision.name {
            ensure_name_available(
                &mut transaction,
                "rbac_permissions",
                name.as_str(),
                tenant_id,
                Some(permission_id.as_uuid()),
            )
            .await?;
        }

        let statement = format!(
            r#"
            UPDATE rbac_permissions
            SET name = COALESCE($2::text, name),
                display_name = COALESCE($3::text, display_name),
                description = CASE WHEN $4 THEN $5::text ELSE description END,
                module = COALESCE($6::text, module),
                category = COALESCE($7::text, category),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PERMISSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PermissionRow>(statement.as_str())
            .bind(permission_id.as_uuid())
            .bind(revision.name.as_ref().map(|name| name.as_str()))
            .bind(revision.display_name.as_ref().map(|name| name.as_str()))
            .bind(revision.description.is_some())
            .bind(revision.description.clone().flatten())
            .bind(revision.module.as_ref().map(|module| module.as_str()))
            .bind(revision.category.as_ref().map(|category| category.as_str()))
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, "update permission"))?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' was not found"))
            })?;

        commit(transaction).await?;
        Ok(permission_from_row(row))
    }

    pub(super) async fn set_permission_active_impl(
        &self,
        permission_id: PermissionId,
        active: bool,
    ) -> AppResult<Permission> {
        let statement = format!(
            r#"
            UPDATE rbac_permissions
            SET active = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PERMISSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PermissionRow>(statement.as_str())
            .bind(permission_id.as_uuid())
            .bind(active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to set status of permission '{permission_id}': {error}"
                ))
            })?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' was not found"))
            })?;

        Ok(permission_from_row(row))
    }

    pub(super) async fn restore_permission_impl(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        let mut transaction = begin(&self.pool).await?;
        let (tenant_id, name) = lock_catalog_row(
            &mut transaction,
            "rbac_permissions",
            permission_id.as_uuid(),
            RowState::Trashed,
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("permission '{permission_id}' is not in the trash"))
        })?;
        ensure_name_available(
            &mut transaction,
            "rbac_permissions",
            name.as_str(),
            tenant_id,
            Some(permission_id.as_uuid()),
        )
        .await?;

        let statement = format!(
            r#"
            UPDATE rbac_permissions
            SET deleted_at = NULL, updated_at = now()
            WHERE id = $1 AND deleted_at IS NOT NULL
            RETURNING {PERMISSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PermissionRow>(statement.as_str())
            .bind(permission_id.as_uuid())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, "restore permission"))?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' is not in the trash"))
            })?;

        commit(transaction).await?;
        Ok(permission_from_row(row))
    }

    pub(super) async fn soft_delete_permission_impl(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        let statement = format!(
            r#"
            UPDATE rbac_permissions
            SET deleted_at = now(), updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {PERMISSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PermissionRow>(statement.as_str())
            .bind(permission_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to soft delete permission '{permission_id}': {error}"
                ))
            })?
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' was not found"))
            })?;

        Ok(permission_from_row(row))
    }
}

fn push_permission_conditions(builder: &mut QueryBuilder<'_, Postgres>, query: &PermissionQuery) {
    filters::push_scope(builder, query.scope);
    filters::push_trashed(builder, query.trashed);
    filters::push_active(builder, query.active);
    filters::push_equals(builder, "module", query.module.as_deref());
    filters::push_equals(builder, "category", query.category.as_deref());
    filters::push_search(
        builder,
        &["name", "display_name", "description"],
        query.search.as_deref(),
    );
}

fn push_permission_order(builder: &mut QueryBuilder<'_, Postgres>, query: &PermissionQuery) {
    builder.push(" ORDER BY ");
    match query.sort {
        None => {
            builder.push("module ASC, category ASC, name ASC");
        }
        Some(sort) => {
            builder.push(match sort.field {
                PermissionSortField::Name => "name",
                PermissionSortField::DisplayName => "display_name",
                PermissionSortField::Module => "module",
                PermissionSortField::Category => "category",
                PermissionSortField::CreatedAt => "created_at",
            });
            builder.push(match sort.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
        }
    }
    builder.push(", id ASC");
}
