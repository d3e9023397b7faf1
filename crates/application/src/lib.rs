//! Application services and ports for the access catalog.

#![forbid(unsafe_code)]

mod access_ports;
mod actor_resolver;
mod audit_trail;
pub mod envelope;
mod grant_service;
mod permission_service;
mod role_service;
mod tenant_provisioning_service;

#[cfg(test)]
mod test_support;

pub use access_ports::{
    AuditEvent, AuditRepository, GrantRepository, IdentityRepository, NewTenantOwner,
    PermissionRepository, ProvisionTenantInput, ProvisionedTenant, RoleRepository,
    TenantProvisioningPlan, TenantProvisioningRepository, UserRecord,
};
pub use actor_resolver::ActorResolver;
pub use grant_service::{BulkGrantResult, GrantService};
pub use permission_service::{PermissionModuleGroup, PermissionService};
pub use role_service::{RoleDetail, RoleService};
pub use tenant_provisioning_service::TenantProvisioningService;
