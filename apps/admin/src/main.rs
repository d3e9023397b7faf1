//! ParishDesk operator CLI.

#![forbid(unsafe_code)]

mod admin_config;
mod database;

use std::sync::Arc;

use parishdesk_application::TenantProvisioningService;
use parishdesk_core::AppError;
use parishdesk_infrastructure::{PostgresAuditRepository, PostgresTenantProvisioningRepository};
use tracing::info;

use crate::admin_config::{AdminCommand, AdminConfig, init_tracing};
use crate::database::connect_and_migrate;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AdminConfig::load()?;
    let pool = connect_and_migrate(config.database_url.as_str(), config.max_connections).await?;

    match config.command {
        AdminCommand::Migrate => {
            info!("migrations complete, exiting");
        }
        AdminCommand::ProvisionTenant(input) => {
            let service = TenantProvisioningService::new(
                Arc::new(PostgresTenantProvisioningRepository::new(pool.clone())),
                Arc::new(PostgresAuditRepository::new(pool)),
            );
            let provisioned = service.provision_tenant(input).await?;
            let rendered = serde_json::to_string_pretty(&provisioned).map_err(|error| {
                AppError::Internal(format!("failed to render provisioning result: {error}"))
            })?;
            println!("{rendered}");
        }
    }

    Ok(())
}
