use async_trait::async_trait;
use parishdesk_core::{AppResult, TenantId, UserId};
use parishdesk_domain::{AuditAction, AuditOutcome};

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Acting user; `None` for operator tooling.
    pub actor_id: Option<UserId>,
    /// Resource type label.
    pub resource_type: String,
    /// Target identifier, when the operation has one.
    pub target_id: Option<String>,
    /// Tenant scope for the event.
    pub tenant_id: Option<TenantId>,
    /// Whether the operation was applied or refused.
    pub outcome: AuditOutcome,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
