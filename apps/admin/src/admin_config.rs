use std::env;

use parishdesk_application::ProvisionTenantInput;
use parishdesk_core::AppError;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: parishdesk-admin migrate | provision-tenant <name> <slug> <admin-email> <admin-display-name>";

/// Operator command selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Apply pending migrations and exit.
    Migrate,
    /// Create a tenant with its Administrator role and owner.
    ProvisionTenant(ProvisionTenantInput),
}

impl AdminCommand {
    /// Parses the arguments following the binary name.
    pub fn parse(arguments: &[String]) -> Result<Self, AppError> {
        match arguments {
            [command] if command == "migrate" => Ok(Self::Migrate),
            [command, name, slug, admin_email, admin_display_name]
                if command == "provision-tenant" =>
            {
                Ok(Self::ProvisionTenant(ProvisionTenantInput {
                    name: name.clone(),
                    slug: slug.clone(),
                    admin_email: admin_email.clone(),
                    admin_display_name: admin_display_name.clone(),
                }))
            }
            _ => Err(AppError::Validation(USAGE.to_owned())),
        }
    }
}

/// Runtime configuration for the operator CLI.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub command: AdminCommand,
}

impl AdminConfig {
    /// Loads configuration from the environment and process arguments.
    pub fn load() -> Result<Self, AppError> {
        let arguments: Vec<String> = env::args().skip(1).collect();
        let command = AdminCommand::parse(arguments.as_slice())?;

        let database_url = required_non_empty_env("DATABASE_URL")?;
        let max_connections = parse_env_u32("DATABASE_MAX_CONNECTIONS", 5)?;
        if max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            command,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, AppError> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
