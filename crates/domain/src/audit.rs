use parishdesk_core::AppError;
use serde::{Deserialize, Serialize};

use crate::catalog::ResourceKind;
use crate::policy::MutationAction;

/// Stable audit actions emitted by catalog use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a role is created.
    RoleCreated,
    /// Emitted when a role is updated.
    RoleUpdated,
    /// Emitted when a role is soft deleted.
    RoleDeleted,
    /// Emitted when a role is activated.
    RoleActivated,
    /// Emitted when a role is deactivated.
    RoleDeactivated,
    /// Emitted when a role is restored.
    RoleRestored,
    /// Emitted when a permission is created.
    PermissionCreated,
    /// Emitted when a permission is updated.
    PermissionUpdated,
    /// Emitted when a permission is soft deleted.
    PermissionDeleted,
    /// Emitted when a permission is activated.
    PermissionActivated,
    /// Emitted when a permission is deactivated.
    PermissionDeactivated,
    /// Emitted when a permission is restored.
    PermissionRestored,
    /// Emitted when a catalog read is denied.
    CatalogRead,
    /// Emitted when a permission is granted to a role.
    RolePermissionAssigned,
    /// Emitted when a permission is revoked from a role.
    RolePermissionRemoved,
    /// Emitted when the permission set of a role is replaced.
    RolePermissionsSynced,
    /// Emitted when a permission is granted directly to a user.
    UserPermissionAssigned,
    /// Emitted when a direct user grant is revoked.
    UserPermissionRemoved,
    /// Emitted when a tenant is provisioned.
    TenantProvisioned,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "rbac.role.created",
            Self::RoleUpdated => "rbac.role.updated",
            Self::RoleDeleted => "rbac.role.deleted",
            Self::RoleActivated => "rbac.role.activated",
            Self::RoleDeactivated => "rbac.role.deactivated",
            Self::RoleRestored => "rbac.role.restored",
            Self::PermissionCreated => "rbac.permission.created",
            Self::PermissionUpdated => "rbac.permission.updated",
            Self::PermissionDeleted => "rbac.permission.deleted",
            Self::PermissionActivated => "rbac.permission.activated",
            Self::PermissionDeactivated => "rbac.permission.deactivated",
            Self::PermissionRestored => "rbac.permission.restored",
            Self::CatalogRead => "rbac.catalog.read",
            Self::RolePermissionAssigned => "rbac.role_permission.assigned",
            Self::RolePermissionRemoved => "rbac.role_permission.removed",
            Self::RolePermissionsSynced => "rbac.role_permission.synced",
            Self::UserPermissionAssigned => "rbac.user_permission.assigned",
            Self::UserPermissionRemoved => "rbac.user_permission.removed",
            Self::TenantProvisioned => "tenant.provisioned",
        }
    }

    /// Maps a catalog mutation onto its audit action.
    ///
    /// Grant changes have dedicated actions and map to `None`.
    #[must_use]
    pub fn for_mutation(kind: ResourceKind, action: MutationAction) -> Option<Self> {
        let mapped = match (kind, action) {
            (ResourceKind::Role, MutationAction::Create) => Self::RoleCreated,
            (ResourceKind::Role, MutationAction::Update) => Self::RoleUpdated,
            (ResourceKind::Role, MutationAction::Delete) => Self::RoleDeleted,
            (ResourceKind::Role, MutationAction::Activate) => Self::RoleActivated,
            (ResourceKind::Role, MutationAction::Deactivate) => Self::RoleDeactivated,
            (ResourceKind::Role, MutationAction::Restore) => Self::RoleRestored,
            (ResourceKind::Permission, MutationAction::Create) => Self::PermissionCreated,
            (ResourceKind::Permission, MutationAction::Update) => Self::PermissionUpdated,
            (ResourceKind::Permission, MutationAction::Delete) => Self::PermissionDeleted,
            (ResourceKind::Permission, MutationAction::Activate) => Self::PermissionActivated,
            (ResourceKind::Permission, MutationAction::Deactivate) => {
                Self::PermissionDeactivated
            }
            (ResourceKind::Permission, MutationAction::Restore) => Self::PermissionRestored,
            (_, MutationAction::Grant) => return None,
        };

        Some(mapped)
    }
}

/// Outcome recorded with every audit event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    /// The operation was applied.
    Succeeded,
    /// The operation was refused.
    Denied {
        /// Stable error code of the refusal.
        code: String,
    },
}

impl AuditOutcome {
    /// Builds a denied outcome from the refusing error.
    #[must_use]
    pub fn denied(error: &AppError) -> Self {
        Self::Denied {
            code: error.code().to_owned(),
        }
    }

    /// Returns a stable storage value for this outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Denied { .. } => "denied",
        }
    }

    /// Returns the refusal code, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Denied { code } => Some(code.as_str()),
        }
    }
}
