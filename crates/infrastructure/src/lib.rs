//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_catalog_repository;
mod postgres_audit_repository;
mod postgres_catalog_repository;
mod postgres_exclusive_flag;
mod postgres_identity_repository;
mod postgres_tenant_provisioning_repository;

pub use in_memory_catalog_repository::{InMemoryCatalogRepository, UserAccount};
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_catalog_repository::PostgresCatalogRepository;
pub use postgres_identity_repository::PostgresIdentityRepository;
pub use postgres_tenant_provisioning_repository::PostgresTenantProvisioningRepository;
