use std::sync::Arc;

use parishdesk_core::{ActorIdentity, AppError, AppResult};
use parishdesk_domain::{Actor, ActorClass, requires_role_lookup};

use crate::access_ports::IdentityRepository;

/// Classifies the identity behind a request once, loading its role on demand.
#[derive(Clone)]
pub struct ActorResolver {
    identity_repository: Arc<dyn IdentityRepository>,
}

impl ActorResolver {
    /// Creates a resolver over the identity context.
    #[must_use]
    pub fn new(identity_repository: Arc<dyn IdentityRepository>) -> Self {
        Self {
            identity_repository,
        }
    }

    /// Resolves the classified actor for a request.
    ///
    /// A missing identity fails with `Unauthenticated`. Orphans resolve
    /// successfully and are refused by every catalog operation.
    pub async fn resolve(&self, identity: Option<ActorIdentity>) -> AppResult<Actor> {
        let identity = identity.ok_or_else(|| {
            AppError::Unauthenticated("request carries no identity".to_owned())
        })?;

        let assigned_role = match identity.role_id() {
            Some(role_id) if requires_role_lookup(&identity) => {
                self.identity_repository.find_assigned_role(role_id).await?
            }
            _ => None,
        };

        let actor = Actor::classify(identity, assigned_role.as_ref());
        if actor.class() == ActorClass::Orphan {
            tracing::warn!(
                actor_id = %actor.user_id(),
                "identity has neither tenant nor system standing"
            );
        }

        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use parishdesk_core::{
        ActorIdentity, AppError, AppResult, RoleId, SystemFlags, TenantId, UserId,
    };
    use parishdesk_domain::{ADMINISTRATOR_ROLE_NAME, ActorClass, AssignedRole};

    use super::ActorResolver;
    use crate::access_ports::{IdentityRepository, UserRecord};

    #[derive(Default)]
    struct FakeIdentityRepository {
        roles: Vec<AssignedRole>,
        lookups: Mutex<usize>,
    }

    #[async_trait]
    impl IdentityRepository for FakeIdentityRepository {
        async fn find_assigned_role(&self, role_id: RoleId) -> AppResult<Option<AssignedRole>> {
            *self.lookups.lock().await += 1;
            Ok(self.roles.iter().find(|role| role.role_id == role_id).cloned())
        }

        async fn find_user(&self, _user_id: UserId) -> AppResult<Option<UserRecord>> {
            Ok(None)
        }

        async fn count_role_users(&self, _role_id: RoleId) -> AppResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn missing_identity_is_unauthenticated() {
        let resolver = ActorResolver::new(Arc::new(FakeIdentityRepository::default()));
        let result = resolver.resolve(None).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn role_is_loaded_only_for_plain_tenant_members() {
        let tenant_id = TenantId::new();
        let role_id = RoleId::new();
        let repository = Arc::new(FakeIdentityRepository {
            roles: vec![AssignedRole {
                role_id,
                name: ADMINISTRATOR_ROLE_NAME.to_owned(),
                tenant_id: Some(tenant_id),
            }],
            lookups: Mutex::new(0),
        });
        let resolver = ActorResolver::new(repository.clone());

        let admin = resolver
            .resolve(Some(ActorIdentity::new(
                UserId::new(),
                Some(tenant_id),
                Some(role_id),
                SystemFlags::none(),
            )))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(admin.class(), ActorClass::TenantAdmin);

        let super_admin = resolver
            .resolve(Some(ActorIdentity::new(
                UserId::new(),
                Some(tenant_id),
                Some(role_id),
                SystemFlags::super_admin(),
            )))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(super_admin.class(), ActorClass::SuperAdmin);

        assert_eq!(*repository.lookups.lock().await, 1);
    }

    #[tokio::test]
    async fn identity_without_standing_resolves_as_orphan() {
        let resolver = ActorResolver::new(Arc::new(FakeIdentityRepository::default()));
        let actor = resolver
            .resolve(Some(ActorIdentity::new(
                UserId::new(),
                None,
                None,
                SystemFlags::none(),
            )))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(actor.class(), ActorClass::Orphan);
    }
}
