use parishdesk_domain::{PageMeta, RoleSortField, SortDirection};

use super::*;

impl PostgresCatalogRepository {
    pub(super) async fn list_roles_impl(&self, query: &RoleQuery) -> AppResult<Page<Role>> {
        let mut count_builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM rbac_roles WHERE ");
        push_role_conditions(&mut count_builder, query);
        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count roles: {error}")))?;

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {ROLE_COLUMNS} FROM rbac_roles WHERE "));
        push_role_conditions(&mut builder, query);
        push_role_order(&mut builder, query);
        filters::push_window(&mut builder, query.page)?;

        let rows = builder
            .build_query_as::<RoleRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;
        let items = rows
            .into_iter()
            .map(role_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        let total = u64::try_from(total)
            .map_err(|error| AppError::Internal(format!("invalid role count: {error}")))?;

        Ok(Page {
            meta: PageMeta::new(query.page, total, items.len()),
            items,
        })
    }

    pub(super) async fn find_role_impl(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let statement = format!("SELECT {ROLE_COLUMNS} FROM rbac_roles WHERE id = $1");
        let row = sqlx::query_as::<_, RoleRow>(statement.as_str())
            .bind(role_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to find role '{role_id}': {error}"))
            })?;

        row.map(role_from_row).transpose()
    }

    pub(super) async fn create_role_impl(&self, role: NewRole) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;
        let created = insert_role(&mut transaction, &role).await?;
        commit(transaction).await?;

        Ok(created)
    }

    pub(super) async fn update_role_impl(
        &self,
        role_id: RoleId,
        revision: &RoleRevision,
    ) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;
        let (tenant_id, _) =
            lock_catalog_row(&mut transaction, "rbac_roles", role_id.as_uuid(), RowState::Live)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
        if let Some(name) = &revision.name {
            ensure_name_available(
                &mut transaction,
                "rbac_roles",
                name.as_str(),
                tenant_id,
                Some(role_id.as_uuid()),
            )
            .await?;
        }

        let statement = format!(
            r#"
            UPDATE rbac_roles
            SET name = COALESCE($2::text, name),
                description = CASE WHEN $3 THEN $4::text ELSE description END,
                level = COALESCE($5::smallint, level),
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {ROLE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RoleRow>(statement.as_str())
            .bind(role_id.as_uuid())
            .bind(revision.name.as_ref().map(|name| name.as_str()))
            .bind(revision.description.is_some())
            .bind(revision.description.clone().flatten())
            .bind(revision.level.map(|level| i16::from(level.value())))
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, "update role"))?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        commit(transaction).await?;
        role_from_row(row)
    }

    pub(super) async fn set_role_active_impl(
        &self,
        role_id: RoleId,
        active: bool,
    ) -> AppResult<Role> {
        let statement = format!(
            r#"
            UPDATE rbac_roles
            SET active = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {ROLE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RoleRow>(statement.as_str())
            .bind(role_id.as_uuid())
            .bind(active)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to set status of role '{role_id}': {error}"))
            })?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        role_from_row(row)
    }

    pub(super) async fn restore_role_impl(&self, role_id: RoleId) -> AppResult<Role> {
        let mut transaction = begin(&self.pool).await?;
        let (tenant_id, name) = lock_catalog_row(
            &mut transaction,
            "rbac_roles",
            role_id.as_uuid(),
            RowState::Trashed,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' is not in the trash")))?;
        ensure_name_available(
            &mut transaction,
            "rbac_roles",
            name.as_str(),
            tenant_id,
            Some(role_id.as_uuid()),
        )
        .await?;

        let statement = format!(
            r#"
            UPDATE rbac_roles
            SET deleted_at = NULL, updated_at = now()
            WHERE id = $1 AND deleted_at IS NOT NULL
            RETURNING {ROLE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RoleRow>(statement.as_str())
            .bind(role_id.as_uuid())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, "restore role"))?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' is not in the trash")))?;

        commit(transaction).await?;
        role_from_row(row)
    }

    pub(super) async fn soft_delete_role_impl(&self, role_id: RoleId) -> AppResult<Role> {
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

        let holders =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
                .bind(role_id.as_uuid())
                .fetch_one(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to count users holding role '{role_id}': {error}"
                    ))
                })?;
        if holders > 0 {
            return Err(AppError::HasDependents(format!(
                "role '{role_id}' is assigned to {holders} user(s)"
            )));
        }

        let statement = format!(
            "UPDATE rbac_roles SET deleted_at = now(), updated_at = now() WHERE id = $1 RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RoleRow>(statement.as_str())
            .bind(role_id.as_uuid())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to soft delete role '{role_id}': {error}"))
            })?;

        commit(transaction).await?;
        role_from_row(row)
    }
}

/// Inserts a role after checking its name against every colliding namespace.
pub(crate) async fn insert_role(
    transaction: &mut Transaction<'_, Postgres>,
    role: &NewRole,
) -> AppResult<Role> {
    ensure_name_available(
        transaction,
        "rbac_roles",
        role.name.as_str(),
        role.ownership.tenant_id,
        None,
    )
    .await?;

    let statement = format!(
        r#"
        INSERT INTO rbac_roles (id, tenant_id, name, description, level, is_custom, active)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {ROLE_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, RoleRow>(statement.as_str())
        .bind(RoleId::new().as_uuid())
        .bind(role.ownership.tenant_id.map(|tenant_id| tenant_id.as_uuid()))
        .bind(role.name.as_str())
        .bind(role.description.as_deref())
        .bind(i16::from(role.level.value()))
        .bind(role.ownership.is_custom)
        .bind(role.active)
        .fetch_one(&mut **transaction)
        .await
        .map_err(|error| map_write_error(error, "create role"))?;

    role_from_row(row)
}

fn push_role_conditions(builder: &mut QueryBuilder<'_, Postgres>, query: &RoleQuery) {
    filters::push_scope(builder, query.scope);
    filters::push_trashed(builder, query.trashed);
    filters::push_active(builder, query.active);
    filters::push_search(builder, &["name", "description"], query.search.as_deref());
}

fn push_role_order(builder: &mut QueryBuilder<'_, Postgres>, query: &RoleQuery) {
    builder.push(" ORDER BY ");
    match query.sort {
        None => {
            builder.push("level ASC, created_at DESC");
        }
        Some(sort) => {
            builder.push(match sort.field {
                RoleSortField::Name => "lower(name)",
                RoleSortField::Level => "level",
                RoleSortField::CreatedAt => "created_at",
            });
            builder.push(match sort.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
        }
    }
    builder.push(", id ASC");
}
