use std::sync::Arc;

use parishdesk_core::{AppError, AppResult, TenantId, UserId};
use parishdesk_domain::{Actor, AuditAction, AuditOutcome};

use crate::access_ports::{AuditEvent, AuditRepository};

/// One audited use-case invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Operation {
    pub(crate) name: &'static str,
    pub(crate) action: AuditAction,
    pub(crate) resource_type: &'static str,
    pub(crate) actor_id: Option<UserId>,
    pub(crate) tenant_id: Option<TenantId>,
    pub(crate) target_id: Option<String>,
}

impl Operation {
    pub(crate) fn new(
        name: &'static str,
        action: AuditAction,
        resource_type: &'static str,
        actor: &Actor,
    ) -> Self {
        Self {
            name,
            action,
            resource_type,
            actor_id: Some(actor.user_id()),
            tenant_id: actor.tenant_id(),
            target_id: None,
        }
    }

    pub(crate) fn target(mut self, target_id: impl ToString) -> Self {
        self.target_id = Some(target_id.to_string());
        self
    }
}

/// Audit sink plus the single exit path of every service operation.
#[derive(Clone)]
pub(crate) struct AuditTrail {
    repository: Arc<dyn AuditRepository>,
}

impl AuditTrail {
    pub(crate) fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Records a successful write.
    pub(crate) async fn succeeded(
        &self,
        operation: &Operation,
        tenant_id: Option<TenantId>,
        detail: String,
    ) -> AppResult<()> {
        self.repository
            .append_event(AuditEvent {
                action: operation.action,
                actor_id: operation.actor_id,
                resource_type: operation.resource_type.to_owned(),
                target_id: operation.target_id.clone(),
                tenant_id: tenant_id.or(operation.tenant_id),
                outcome: AuditOutcome::Succeeded,
                detail: Some(detail),
            })
            .await
    }

    /// Logs and audits a failed operation, then redacts internal details.
    pub(crate) async fn conclude<T>(
        &self,
        operation: Operation,
        result: AppResult<T>,
    ) -> AppResult<T> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let actor_id = operation.actor_id.map(|user_id| user_id.to_string());
        let tenant_id = operation.tenant_id.map(|tenant_id| tenant_id.to_string());
        if error.is_internal() {
            tracing::error!(
                operation = operation.name,
                actor_id = actor_id.as_deref(),
                tenant_id = tenant_id.as_deref(),
                target_id = operation.target_id.as_deref(),
                error = %error,
                "access catalog operation failed"
            );
            return Err(error.redacted());
        }

        tracing::warn!(
            operation = operation.name,
            actor_id = actor_id.as_deref(),
            tenant_id = tenant_id.as_deref(),
            target_id = operation.target_id.as_deref(),
            code = error.code(),
            error = %error,
            "access catalog operation denied"
        );

        let event = AuditEvent {
            action: operation.action,
            actor_id: operation.actor_id,
            resource_type: operation.resource_type.to_owned(),
            target_id: operation.target_id.clone(),
            tenant_id: operation.tenant_id,
            outcome: AuditOutcome::denied(&error),
            detail: Some(error.to_string()),
        };
        if let Err(audit_error) = self.repository.append_event(event).await {
            tracing::error!(
                operation = operation.name,
                error = %audit_error,
                "failed to record denied access catalog operation"
            );
        }

        Err(error)
    }
}

/// Unwraps a lookup or reports the row as missing.
pub(crate) fn found<T>(row: Option<T>, kind: &str, id: impl std::fmt::Display) -> AppResult<T> {
    row.ok_or_else(|| AppError::NotFound(format!("{kind} '{id}' was not found")))
}
