mod audit;
mod catalog;
mod grants;
mod identity;
mod provisioning;

pub use audit::{AuditEvent, AuditRepository};
pub use catalog::{PermissionRepository, RoleRepository};
pub use grants::GrantRepository;
pub use identity::{IdentityRepository, UserRecord};
pub use provisioning::{
    NewTenantOwner, ProvisionTenantInput, ProvisionedTenant, TenantProvisioningPlan,
    TenantProvisioningRepository,
};
