use async_trait::async_trait;
use sqlx::PgPool;

use parishdesk_application::{AuditEvent, AuditRepository};
use parishdesk_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log_entries (
                action,
                actor_id,
                resource_type,
                target_id,
                tenant_id,
                outcome,
                error_code,
                detail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.action.as_str())
        .bind(event.actor_id.map(|actor_id| actor_id.as_uuid()))
        .bind(event.resource_type)
        .bind(event.target_id)
        .bind(event.tenant_id.map(|tenant_id| tenant_id.as_uuid()))
        .bind(event.outcome.as_str())
        .bind(event.outcome.error_code().map(str::to_owned))
        .bind(event.detail)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
