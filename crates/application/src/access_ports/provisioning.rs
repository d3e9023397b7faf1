use async_trait::async_trait;
use parishdesk_core::{AppResult, NonEmptyString, TenantId, UserId};
use parishdesk_domain::{NewRole, Role};
use serde::{Deserialize, Serialize};

/// Operator input for creating a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionTenantInput {
    /// Tenant display name.
    pub name: String,
    /// URL-safe unique tenant slug.
    pub slug: String,
    /// Email of the first tenant user.
    pub admin_email: String,
    /// Display name of the first tenant user.
    pub admin_display_name: String,
}

/// First user of a tenant, flagged as tenant owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTenantOwner {
    /// Identifier chosen for the user.
    pub user_id: UserId,
    /// Login email.
    pub email: NonEmptyString,
    /// Display name.
    pub display_name: NonEmptyString,
}

/// Validated provisioning plan executed in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantProvisioningPlan {
    /// Identifier chosen for the tenant.
    pub tenant_id: TenantId,
    /// Tenant display name.
    pub name: NonEmptyString,
    /// Normalized slug.
    pub slug: NonEmptyString,
    /// The tenant's singleton Administrator role.
    pub administrator_role: NewRole,
    /// First user, bound to the Administrator role.
    pub owner: NewTenantOwner,
}

/// Result of tenant provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedTenant {
    /// Tenant identifier.
    pub tenant_id: TenantId,
    /// Tenant display name.
    pub name: String,
    /// Tenant slug.
    pub slug: String,
    /// The created Administrator role.
    pub administrator_role: Role,
    /// The created tenant owner.
    pub owner_user_id: UserId,
    /// Permissions granted to the Administrator role.
    pub granted_count: usize,
    /// Set when the system catalog was empty at provisioning time.
    pub empty_catalog_warning: bool,
}

/// Storage port executing the tenant provisioning invariant atomically.
#[async_trait]
pub trait TenantProvisioningRepository: Send + Sync {
    /// Inserts the tenant, its Administrator role, the role's grant over the
    /// active system catalog snapshot and the owner user. Any failure rolls
    /// back every step.
    async fn provision_tenant(&self, plan: TenantProvisioningPlan)
    -> AppResult<ProvisionedTenant>;
}
