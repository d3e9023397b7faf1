use async_trait::async_trait;
use sqlx::PgPool;

use parishdesk_application::{
    ProvisionedTenant, TenantProvisioningPlan, TenantProvisioningRepository,
};
use parishdesk_core::AppResult;
use parishdesk_domain::{ExclusiveFlag, grantable_permissions_for};

use crate::postgres_catalog_repository::{
    begin, commit, insert_role, map_write_error, replace_role_permissions,
    system_catalog_snapshot,
};
use crate::postgres_exclusive_flag::designate_exclusive;

/// PostgreSQL-backed tenant provisioning.
#[derive(Clone)]
pub struct PostgresTenantProvisioningRepository {
    pool: PgPool,
}

impl PostgresTenantProvisioningRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantProvisioningRepository for PostgresTenantProvisioningRepository {
    async fn provision_tenant(
        &self,
        plan: TenantProvisioningPlan,
    ) -> AppResult<ProvisionedTenant> {
        let mut transaction = begin(&self.pool).await?;

        sqlx::query("INSERT INTO tenants (id, name, slug) VALUES ($1, $2, $3)")
            .bind(plan.tenant_id.as_uuid())
            .bind(plan.name.as_str())
            .bind(plan.slug.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_write_error(error, "create tenant"))?;

        let administrator_role = insert_role(&mut transaction, &plan.administrator_role).await?;

        let snapshot = system_catalog_snapshot(&mut transaction).await?;
        let granted_count = replace_role_permissions(
            &mut transaction,
            administrator_role.id,
            &snapshot,
            grantable_permissions_for(Some(plan.tenant_id)),
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, role_id, email, display_name)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(plan.owner.user_id.as_uuid())
        .bind(plan.tenant_id.as_uuid())
        .bind(administrator_role.id.as_uuid())
        .bind(plan.owner.email.as_str())
        .bind(plan.owner.display_name.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_write_error(error, "create tenant owner"))?;

        designate_exclusive(
            &mut transaction,
            ExclusiveFlag::TenantOwner,
            plan.tenant_id.as_uuid(),
            plan.owner.user_id.as_uuid(),
        )
        .await?;

        commit(transaction).await?;
        tracing::debug!(
            tenant_id = %plan.tenant_id,
            role_id = %administrator_role.id,
            granted_count,
            "committed tenant provisioning transaction"
        );

        Ok(ProvisionedTenant {
            tenant_id: plan.tenant_id,
            name: plan.name.into(),
            slug: plan.slug.into(),
            administrator_role,
            owner_user_id: plan.owner.user_id,
            granted_count,
            empty_catalog_warning: snapshot.is_empty(),
        })
    }
}
