use parishdesk_core::{ActorIdentity, AppError, AppResult, RoleId, TenantId, UserId};
use serde::{Deserialize, Serialize};

/// Name of the singleton role provisioned for every tenant.
pub const ADMINISTRATOR_ROLE_NAME: &str = "Administrator";

/// Closed classification of the identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorClass {
    /// Unrestricted cross-tenant administrator.
    SuperAdmin,
    /// System operator (administrative or managerial flag).
    SystemOperator,
    /// Holder of a tenant's Administrator role.
    TenantAdmin,
    /// Any other member of a tenant.
    TenantUser,
    /// Authenticated identity without tenant or system standing.
    Orphan,
}

impl ActorClass {
    /// Returns a stable storage value for this class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::SystemOperator => "system_operator",
            Self::TenantAdmin => "tenant_admin",
            Self::TenantUser => "tenant_user",
            Self::Orphan => "orphan",
        }
    }
}

/// Snapshot of the role assigned to an identity, loaded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedRole {
    /// Role identifier.
    pub role_id: RoleId,
    /// Role name.
    pub name: String,
    /// Tenant owning the role.
    pub tenant_id: Option<TenantId>,
}

/// Returns whether classification of this identity depends on its assigned role.
///
/// System flags take precedence, so the role is only consulted for tenant
/// members without any system-level standing.
#[must_use]
pub fn requires_role_lookup(identity: &ActorIdentity) -> bool {
    !identity.flags().any() && identity.tenant_id().is_some() && identity.role_id().is_some()
}

/// Classifies an identity snapshot.
///
/// Precedence: super admin flag, then system operator flags, then tenant
/// membership (Administrator role or not), then orphan.
#[must_use]
pub fn classify(identity: &ActorIdentity, assigned_role: Option<&AssignedRole>) -> ActorClass {
    let flags = identity.flags();
    if flags.super_admin {
        return ActorClass::SuperAdmin;
    }
    if flags.is_system_operator() {
        return ActorClass::SystemOperator;
    }

    let Some(tenant_id) = identity.tenant_id() else {
        return ActorClass::Orphan;
    };

    match assigned_role {
        Some(role)
            if role.name == ADMINISTRATOR_ROLE_NAME
                && role.tenant_id == Some(tenant_id)
                && identity.role_id() == Some(role.role_id) =>
        {
            ActorClass::TenantAdmin
        }
        _ => ActorClass::TenantUser,
    }
}

/// Classified actor threaded through every catalog operation of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    identity: ActorIdentity,
    class: ActorClass,
}

impl Actor {
    /// Classifies the identity once and binds the result to it.
    #[must_use]
    pub fn classify(identity: ActorIdentity, assigned_role: Option<&AssignedRole>) -> Self {
        let class = classify(&identity, assigned_role);
        Self { identity, class }
    }

    /// Returns the computed classification.
    #[must_use]
    pub fn class(&self) -> ActorClass {
        self.class
    }

    /// Returns the underlying identity snapshot.
    #[must_use]
    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    /// Returns the acting user identifier.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.identity.user_id()
    }

    /// Returns the tenant attached to the identity, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.identity.tenant_id()
    }

    /// Returns whether the actor is a super admin.
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.class == ActorClass::SuperAdmin
    }

    /// Returns the tenant that confines a tenant-class actor.
    ///
    /// System-level actors are not confined and yield `None`.
    #[must_use]
    pub fn confining_tenant(&self) -> Option<TenantId> {
        match self.class {
            ActorClass::TenantAdmin | ActorClass::TenantUser => self.identity.tenant_id(),
            ActorClass::SuperAdmin | ActorClass::SystemOperator | ActorClass::Orphan => None,
        }
    }

    /// Rejects actors without tenant or system standing.
    pub fn require_standing(&self) -> AppResult<()> {
        if self.class == ActorClass::Orphan {
            return Err(AppError::TenantRequired(format!(
                "user '{}' is not associated with a tenant",
                self.identity.user_id()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use parishdesk_core::{ActorIdentity, AppError, RoleId, SystemFlags, TenantId, UserId};

    use super::{ADMINISTRATOR_ROLE_NAME, Actor, ActorClass, AssignedRole, requires_role_lookup};

    fn tenant_identity(tenant_id: TenantId, role_id: RoleId) -> ActorIdentity {
        ActorIdentity::new(
            UserId::new(),
            Some(tenant_id),
            Some(role_id),
            SystemFlags::none(),
        )
    }

    fn role(role_id: RoleId, name: &str, tenant_id: Option<TenantId>) -> AssignedRole {
        AssignedRole {
            role_id,
            name: name.to_owned(),
            tenant_id,
        }
    }

    #[test]
    fn super_admin_flag_wins_over_everything() {
        let tenant_id = TenantId::new();
        let role_id = RoleId::new();
        let identity = ActorIdentity::new(
            UserId::new(),
            Some(tenant_id),
            Some(role_id),
            SystemFlags {
                super_admin: true,
                system_admin: true,
                system_manager: false,
            },
        );
        let assigned = role(role_id, ADMINISTRATOR_ROLE_NAME, Some(tenant_id));

        assert_eq!(
            Actor::classify(identity, Some(&assigned)).class(),
            ActorClass::SuperAdmin
        );
    }

    #[test]
    fn either_operator_flag_classifies_as_system_operator() {
        for flags in [
            SystemFlags {
                system_admin: true,
                ..SystemFlags::none()
            },
            SystemFlags {
                system_manager: true,
                ..SystemFlags::none()
            },
        ] {
            let identity = ActorIdentity::new(UserId::new(), None, None, flags);
            assert!(!requires_role_lookup(&identity));
            assert_eq!(
                Actor::classify(identity, None).class(),
                ActorClass::SystemOperator
            );
        }
    }

    #[test]
    fn administrator_role_of_own_tenant_classifies_as_tenant_admin() {
        let tenant_id = TenantId::new();
        let role_id = RoleId::new();
        let identity = tenant_identity(tenant_id, role_id);
        assert!(requires_role_lookup(&identity));

        let assigned = role(role_id, ADMINISTRATOR_ROLE_NAME, Some(tenant_id));
        assert_eq!(
            Actor::classify(identity, Some(&assigned)).class(),
            ActorClass::TenantAdmin
        );
    }

    #[test]
    fn other_roles_and_foreign_administrators_classify_as_tenant_user() {
        let tenant_id = TenantId::new();
        let role_id = RoleId::new();

        let editor = role(role_id, "Editor", Some(tenant_id));
        assert_eq!(
            Actor::classify(tenant_identity(tenant_id, role_id), Some(&editor)).class(),
            ActorClass::TenantUser
        );

        let foreign_admin = role(role_id, ADMINISTRATOR_ROLE_NAME, Some(TenantId::new()));
        assert_eq!(
            Actor::classify(tenant_identity(tenant_id, role_id), Some(&foreign_admin)).class(),
            ActorClass::TenantUser
        );

        assert_eq!(
            Actor::classify(tenant_identity(tenant_id, role_id), None).class(),
            ActorClass::TenantUser
        );
    }

    #[test]
    fn identity_without_tenant_or_flags_is_orphan_and_requires_tenant() {
        let actor = Actor::classify(
            ActorIdentity::new(UserId::new(), None, None, SystemFlags::none()),
            None,
        );

        assert_eq!(actor.class(), ActorClass::Orphan);
        assert!(matches!(
            actor.require_standing(),
            Err(AppError::TenantRequired(_))
        ));
        assert_eq!(actor.confining_tenant(), None);
    }
}
