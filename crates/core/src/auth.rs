use serde::{Deserialize, Serialize};

use crate::{RoleId, TenantId, UserId};

/// System-level flags carried by an identity, independent of tenancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemFlags {
    /// Unrestricted cross-tenant administrator.
    pub super_admin: bool,
    /// System operator with administrative standing.
    pub system_admin: bool,
    /// System operator with managerial standing.
    pub system_manager: bool,
}

impl SystemFlags {
    /// Flags for an identity with no system-level standing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Flags for a super administrator.
    #[must_use]
    pub fn super_admin() -> Self {
        Self {
            super_admin: true,
            ..Self::default()
        }
    }

    /// Returns whether either system operator flag is set.
    #[must_use]
    pub fn is_system_operator(&self) -> bool {
        self.system_admin || self.system_manager
    }

    /// Returns whether any system-level flag is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.super_admin || self.is_system_operator()
    }
}

/// Identity snapshot supplied by the identity context for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    user_id: UserId,
    tenant_id: Option<TenantId>,
    role_id: Option<RoleId>,
    flags: SystemFlags,
}

impl ActorIdentity {
    /// Creates an identity snapshot.
    #[must_use]
    pub fn new(
        user_id: UserId,
        tenant_id: Option<TenantId>,
        role_id: Option<RoleId>,
        flags: SystemFlags,
    ) -> Self {
        Self {
            user_id,
            tenant_id,
            role_id,
            flags,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the tenant linked to the identity, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Returns the assigned role reference, if any.
    #[must_use]
    pub fn role_id(&self) -> Option<RoleId> {
        self.role_id
    }

    /// Returns the system-level flags.
    #[must_use]
    pub fn flags(&self) -> SystemFlags {
        self.flags
    }
}
