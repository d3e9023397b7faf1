use std::sync::Arc;

use parishdesk_core::{AppError, AppResult, NonEmptyString, TenantId, UserId};
use parishdesk_domain::{AuditAction, AuditOutcome, sanitize_administrator_role};

use crate::access_ports::{
    AuditEvent, AuditRepository, NewTenantOwner, ProvisionTenantInput, ProvisionedTenant,
    TenantProvisioningPlan, TenantProvisioningRepository,
};

/// Application service creating tenants with their singleton Administrator role.
#[derive(Clone)]
pub struct TenantProvisioningService {
    repository: Arc<dyn TenantProvisioningRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl TenantProvisioningService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        repository: Arc<dyn TenantProvisioningRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            repository,
            audit_repository,
        }
    }

    /// Provisions a tenant, its Administrator role and its owner in one transaction.
    ///
    /// The Administrator role receives the active system catalog as it exists
    /// at this moment; later catalog additions are not granted retroactively.
    pub async fn provision_tenant(
        &self,
        input: ProvisionTenantInput,
    ) -> AppResult<ProvisionedTenant> {
        let plan = Self::plan(input)?;

        let provisioned = match self.repository.provision_tenant(plan).await {
            Ok(provisioned) => provisioned,
            Err(error) => {
                if error.is_internal() {
                    tracing::error!(
                        operation = "tenant.provision",
                        error = %error,
                        "tenant provisioning failed"
                    );
                } else {
                    tracing::warn!(
                        operation = "tenant.provision",
                        code = error.code(),
                        error = %error,
                        "tenant provisioning refused"
                    );
                }
                return Err(error.redacted());
            }
        };

        if provisioned.empty_catalog_warning {
            tracing::warn!(
                operation = "tenant.provision",
                tenant_id = %provisioned.tenant_id,
                "system permission catalog is empty; administrator role has no grants"
            );
        }

        self.audit_repository
            .append_event(AuditEvent {
                action: AuditAction::TenantProvisioned,
                actor_id: None,
                resource_type: "tenant".to_owned(),
                target_id: Some(provisioned.tenant_id.to_string()),
                tenant_id: Some(provisioned.tenant_id),
                outcome: AuditOutcome::Succeeded,
                detail: Some(format!(
                    "provisioned tenant '{}' with {} administrator grant(s)",
                    provisioned.slug, provisioned.granted_count
                )),
            })
            .await?;

        tracing::info!(
            operation = "tenant.provision",
            tenant_id = %provisioned.tenant_id,
            granted_count = provisioned.granted_count,
            "tenant provisioned"
        );

        Ok(provisioned)
    }

    fn plan(input: ProvisionTenantInput) -> AppResult<TenantProvisioningPlan> {
        let tenant_id = TenantId::new();
        let slug = normalize_slug(input.slug.as_str())?;
        let email = NonEmptyString::new(input.admin_email.trim().to_lowercase())?;
        if !is_plausible_email(email.as_str()) {
            return Err(AppError::Validation(format!(
                "invalid administrator email '{email}'"
            )));
        }

        Ok(TenantProvisioningPlan {
            tenant_id,
            name: NonEmptyString::new(input.name)?,
            slug,
            administrator_role: sanitize_administrator_role(tenant_id)?,
            owner: NewTenantOwner {
                user_id: UserId::new(),
                email,
                display_name: NonEmptyString::new(input.admin_display_name)?,
            },
        })
    }
}

fn normalize_slug(value: &str) -> AppResult<NonEmptyString> {
    let slug = NonEmptyString::new(value.trim().to_lowercase())?;
    let valid = slug
        .as_str()
        .chars()
        .all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '-'
        })
        && !slug.as_str().starts_with('-')
        && !slug.as_str().ends_with('-');
    if !valid {
        return Err(AppError::Validation(format!(
            "tenant slug '{slug}' must contain only lowercase letters, digits and inner hyphens"
        )));
    }

    Ok(slug)
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;

    use parishdesk_core::{AppError, AppResult, RoleId};
    use parishdesk_domain::{ADMINISTRATOR_ROLE_NAME, AuditAction, Ownership, Role, RoleLevel};

    use super::TenantProvisioningService;
    use crate::access_ports::{
        AuditEvent, AuditRepository, ProvisionTenantInput, ProvisionedTenant,
        TenantProvisioningPlan, TenantProvisioningRepository,
    };

    #[derive(Default)]
    struct FakeProvisioningRepository {
        plans: Mutex<Vec<TenantProvisioningPlan>>,
        catalog_size: usize,
    }

    #[async_trait]
    impl TenantProvisioningRepository for FakeProvisioningRepository {
        async fn provision_tenant(
            &self,
            plan: TenantProvisioningPlan,
        ) -> AppResult<ProvisionedTenant> {
            let now = Utc::now();
            let provisioned = ProvisionedTenant {
                tenant_id: plan.tenant_id,
                name: plan.name.to_string(),
                slug: plan.slug.to_string(),
                administrator_role: Role {
                    id: RoleId::new(),
                    name: plan.administrator_role.name.to_string(),
                    description: plan.administrator_role.description.clone(),
                    level: plan.administrator_role.level,
                    tenant_id: plan.administrator_role.ownership.tenant_id,
                    is_custom: plan.administrator_role.ownership.is_custom,
                    active: true,
                    deleted_at: None,
                    created_at: now,
                    updated_at: now,
                },
                owner_user_id: plan.owner.user_id,
                granted_count: self.catalog_size,
                empty_catalog_warning: self.catalog_size == 0,
            };
            self.plans.lock().await.push(plan);
            Ok(provisioned)
        }
    }

    #[derive(Default)]
    struct FakeAuditRepository {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditRepository for FakeAuditRepository {
        async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
            self.events.lock().await.push(event);
            Ok(())
        }
    }

    fn input(slug: &str, email: &str) -> ProvisionTenantInput {
        ProvisionTenantInput {
            name: "St. Brigid".to_owned(),
            slug: slug.to_owned(),
            admin_email: email.to_owned(),
            admin_display_name: "Parish Office".to_owned(),
        }
    }

    #[tokio::test]
    async fn plan_carries_tenant_managed_administrator_role() {
        let repository = Arc::new(FakeProvisioningRepository {
            catalog_size: 12,
            ..FakeProvisioningRepository::default()
        });
        let audit = Arc::new(FakeAuditRepository::default());
        let service = TenantProvisioningService::new(repository.clone(), audit.clone());

        let provisioned = service
            .provision_tenant(input(" St-Brigid ", "Office@StBrigid.org"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(provisioned.slug, "st-brigid");
        assert_eq!(provisioned.granted_count, 12);
        assert!(!provisioned.empty_catalog_warning);

        let plans = repository.plans.lock().await;
        let plan = &plans[0];
        assert_eq!(plan.administrator_role.name.as_str(), ADMINISTRATOR_ROLE_NAME);
        assert_eq!(plan.administrator_role.level, RoleLevel::HIGHEST);
        assert_eq!(
            plan.administrator_role.ownership,
            Ownership::tenant_managed(plan.tenant_id)
        );
        assert_eq!(plan.owner.email.as_str(), "office@stbrigid.org");

        let events = audit.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::TenantProvisioned);
    }

    #[tokio::test]
    async fn empty_catalog_is_not_fatal() {
        let service = TenantProvisioningService::new(
            Arc::new(FakeProvisioningRepository::default()),
            Arc::new(FakeAuditRepository::default()),
        );

        let provisioned = service
            .provision_tenant(input("st-brigid", "office@stbrigid.org"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(provisioned.granted_count, 0);
        assert!(provisioned.empty_catalog_warning);
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_storage() {
        let repository = Arc::new(FakeProvisioningRepository::default());
        let service = TenantProvisioningService::new(
            repository.clone(),
            Arc::new(FakeAuditRepository::default()),
        );

        for candidate in [
            input("st brigid", "office@stbrigid.org"),
            input("-brigid", "office@stbrigid.org"),
            input("st-brigid", "office.stbrigid.org"),
        ] {
            let result = service.provision_tenant(candidate).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }

        assert!(repository.plans.lock().await.is_empty());
    }
}
