use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use parishdesk_core::{
    ActorIdentity, AppError, AppResult, PermissionId, RoleId, SystemFlags, TenantId, UserId,
};
use parishdesk_domain::{
    ADMINISTRATOR_ROLE_NAME, Actor, AssignedRole, CatalogResource, NewPermission, NewRole,
    Ownership, Page, Permission, PermissionQuery, PermissionRevision, Role, RoleLevel, RoleQuery,
    RoleRevision, ScopePredicate, name_key, names_collide,
};

use crate::access_ports::{
    AuditEvent, AuditRepository, GrantRepository, IdentityRepository, PermissionRepository,
    RoleRepository, UserRecord,
};

#[derive(Default)]
pub(crate) struct FakeState {
    pub(crate) roles: Vec<Role>,
    pub(crate) permissions: Vec<Permission>,
    pub(crate) users: Vec<UserRecord>,
    pub(crate) role_grants: BTreeSet<(RoleId, PermissionId)>,
    pub(crate) user_grants: BTreeSet<(UserId, PermissionId)>,
    pub(crate) events: Vec<AuditEvent>,
}

#[derive(Default)]
pub(crate) struct FakeCatalog {
    pub(crate) state: Mutex<FakeState>,
}

impl FakeCatalog {
    pub(crate) async fn seed_role(&self, name: &str, ownership: Ownership) -> Role {
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(),
            name: name.to_owned(),
            description: None,
            level: RoleLevel::DEFAULT,
            tenant_id: ownership.tenant_id,
            is_custom: ownership.is_custom,
            active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.roles.push(role.clone());
        role
    }

    pub(crate) async fn seed_permission(&self, name: &str, ownership: Ownership) -> Permission {
        let now = Utc::now();
        let permission = Permission {
            id: PermissionId::new(),
            name: name.to_owned(),
            display_name: name.to_owned(),
            description: None,
            module: name.split('.').next().unwrap_or(name).to_owned(),
            category: "general".to_owned(),
            tenant_id: ownership.tenant_id,
            is_custom: ownership.is_custom,
            active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.permissions.push(permission.clone());
        permission
    }

    pub(crate) async fn seed_user(
        &self,
        tenant_id: Option<TenantId>,
        role_id: Option<RoleId>,
    ) -> UserId {
        let id = UserId::new();
        self.state.lock().await.users.push(UserRecord {
            id,
            tenant_id,
            role_id,
        });
        id
    }

    pub(crate) async fn events(&self) -> Vec<AuditEvent> {
        self.state.lock().await.events.clone()
    }
}

pub(crate) async fn tenant_admin(catalog: &FakeCatalog, tenant_id: TenantId) -> Actor {
    let role = catalog
        .seed_role(ADMINISTRATOR_ROLE_NAME, Ownership::tenant_managed(tenant_id))
        .await;
    tenant_member_with(role, tenant_id)
}

pub(crate) async fn tenant_user(catalog: &FakeCatalog, tenant_id: TenantId) -> Actor {
    let role = catalog
        .seed_role("Catechist", Ownership::custom(tenant_id))
        .await;
    tenant_member_with(role, tenant_id)
}

fn tenant_member_with(role: Role, tenant_id: TenantId) -> Actor {
    Actor::classify(
        ActorIdentity::new(
            UserId::new(),
            Some(tenant_id),
            Some(role.id),
            SystemFlags::none(),
        ),
        Some(&AssignedRole {
            role_id: role.id,
            name: role.name,
            tenant_id: role.tenant_id,
        }),
    )
}

pub(crate) fn super_admin() -> Actor {
    Actor::classify(
        ActorIdentity::new(UserId::new(), None, None, SystemFlags::super_admin()),
        None,
    )
}

pub(crate) fn system_operator() -> Actor {
    Actor::classify(
        ActorIdentity::new(
            UserId::new(),
            None,
            None,
            SystemFlags {
                system_manager: true,
                ..SystemFlags::none()
            },
        ),
        None,
    )
}

pub(crate) fn orphan() -> Actor {
    Actor::classify(
        ActorIdentity::new(UserId::new(), None, None, SystemFlags::none()),
        None,
    )
}

fn live_row<R: CatalogResource + Clone>(rows: &[R], id: String) -> AppResult<R> {
    rows.iter()
        .find(|row| row.resource_id() == id && !row.is_deleted())
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("'{id}' was not found")))
}

fn trashed_row<R: CatalogResource + Clone>(rows: &[R], id: String) -> AppResult<R> {
    rows.iter()
        .find(|row| row.resource_id() == id && row.is_deleted())
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("'{id}' was not found in trash")))
}

fn store_row<R: CatalogResource + Clone>(rows: &mut [R], row: R) -> AppResult<R> {
    let id = row.resource_id();
    let stored = rows
        .iter_mut()
        .find(|stored| stored.resource_id() == id)
        .ok_or_else(|| AppError::NotFound(format!("'{id}' was not found")))?;
    *stored = row.clone();
    Ok(row)
}

fn ensure_unique<R: CatalogResource>(rows: &[R], candidate: &R, name: &str) -> AppResult<()> {
    let key = name_key(name);
    let taken = rows.iter().any(|row| {
        row.resource_id() != candidate.resource_id()
            && !row.is_deleted()
            && name_key(row.label()) == key
            && names_collide(row.ownership().tenant_id, candidate.ownership().tenant_id)
    });
    if taken {
        return Err(AppError::Validation(format!("name '{name}' already exists")));
    }

    Ok(())
}

#[async_trait]
impl RoleRepository for FakeCatalog {
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Page<Role>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Role> = state
            .roles
            .iter()
            .filter(|role| query.matches(role))
            .cloned()
            .collect();
        rows.sort_by(|left, right| query.compare(left, right));
        Ok(Page::from_sorted(rows, query.page))
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        let state = self.state.lock().await;
        Ok(state.roles.iter().find(|role| role.id == role_id).cloned())
    }

    async fn create_role(&self, role: NewRole) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(),
            name: role.name.into(),
            description: role.description,
            level: role.level,
            tenant_id: role.ownership.tenant_id,
            is_custom: role.ownership.is_custom,
            active: role.active,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        ensure_unique(&state.roles, &role, role.name.as_str())?;
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, role_id: RoleId, revision: &RoleRevision) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        let mut revised = live_row(&state.roles, role_id.to_string())?;
        revision.apply_to(&mut revised);
        ensure_unique(&state.roles, &revised, revised.name.as_str())?;
        revised.updated_at = Utc::now();
        store_row(&mut state.roles, revised)
    }

    async fn set_role_active(&self, role_id: RoleId, active: bool) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        let mut role = live_row(&state.roles, role_id.to_string())?;
        role.active = active;
        role.updated_at = Utc::now();
        store_row(&mut state.roles, role)
    }

    async fn restore_role(&self, role_id: RoleId) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        let mut role = trashed_row(&state.roles, role_id.to_string())?;
        role.deleted_at = None;
        ensure_unique(&state.roles, &role, role.name.as_str())?;
        role.updated_at = Utc::now();
        store_row(&mut state.roles, role)
    }

    async fn soft_delete_role(&self, role_id: RoleId) -> AppResult<Role> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|user| user.role_id == Some(role_id)) {
            return Err(AppError::HasDependents(format!(
                "role '{role_id}' is assigned to users"
            )));
        }
        let stored = state
            .roles
            .iter_mut()
            .find(|stored| stored.id == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
        stored.deleted_at = Some(Utc::now());
        Ok(stored.clone())
    }
}

#[async_trait]
impl PermissionRepository for FakeCatalog {
    async fn list_permissions(&self, query: &PermissionQuery) -> AppResult<Page<Permission>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Permission> = state
            .permissions
            .iter()
            .filter(|permission| query.matches(permission))
            .cloned()
            .collect();
        rows.sort_by(|left, right| query.compare(left, right));
        Ok(Page::from_sorted(rows, query.page))
    }

    async fn list_modules(&self, scope: ScopePredicate) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        let modules: BTreeSet<String> = state
            .permissions
            .iter()
            .filter(|permission| !permission.is_deleted() && scope.admits(permission.ownership()))
            .map(|permission| permission.module.clone())
            .collect();
        Ok(modules.into_iter().collect())
    }

    async fn find_permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>> {
        let state = self.state.lock().await;
        Ok(state
            .permissions
            .iter()
            .find(|permission| permission.id == permission_id)
            .cloned())
    }

    async fn create_permission(&self, permission: NewPermission) -> AppResult<Permission> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let permission = Permission {
            id: PermissionId::new(),
            name: permission.name.into(),
            display_name: permission.display_name.into(),
            description: permission.description,
            module: permission.module.into(),
            category: permission.category.into(),
            tenant_id: permission.ownership.tenant_id,
            is_custom: permission.ownership.is_custom,
            active: permission.active,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        ensure_unique(&state.permissions, &permission, permission.name.as_str())?;
        state.permissions.push(permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        permission_id: PermissionId,
        revision: &PermissionRevision,
    ) -> AppResult<Permission> {
        let mut state = self.state.lock().await;
        let mut revised = live_row(&state.permissions, permission_id.to_string())?;
        revision.apply_to(&mut revised);
        ensure_unique(&state.permissions, &revised, revised.name.as_str())?;
        revised.updated_at = Utc::now();
        store_row(&mut state.permissions, revised)
    }

    async fn set_permission_active(
        &self,
        permission_id: PermissionId,
        active: bool,
    ) -> AppResult<Permission> {
        let mut state = self.state.lock().await;
        let mut permission = live_row(&state.permissions, permission_id.to_string())?;
        permission.active = active;
        permission.updated_at = Utc::now();
        store_row(&mut state.permissions, permission)
    }

    async fn restore_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        let mut state = self.state.lock().await;
        let mut permission = trashed_row(&state.permissions, permission_id.to_string())?;
        permission.deleted_at = None;
        ensure_unique(&state.permissions, &permission, permission.name.as_str())?;
        permission.updated_at = Utc::now();
        store_row(&mut state.permissions, permission)
    }

    async fn soft_delete_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        let mut state = self.state.lock().await;
        let stored = state
            .permissions
            .iter_mut()
            .find(|stored| stored.id == permission_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' was not found"))
            })?;
        stored.deleted_at = Some(Utc::now());
        Ok(stored.clone())
    }
}

#[async_trait]
impl GrantRepository for FakeCatalog {
    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let state = self.state.lock().await;
        Ok(state
            .permissions
            .iter()
            .filter(|permission| {
                !permission.is_deleted() && state.role_grants.contains(&(role_id, permission.id))
            })
            .cloned()
            .collect())
    }

    async fn list_user_permissions(&self, user_id: UserId) -> AppResult<Vec<Permission>> {
        let state = self.state.lock().await;
        Ok(state
            .permissions
            .iter()
            .filter(|permission| {
                !permission.is_deleted() && state.user_grants.contains(&(user_id, permission.id))
            })
            .cloned()
            .collect())
    }

    async fn assign_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .role_grants
            .insert((role_id, permission_id)))
    }

    async fn remove_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .role_grants
            .remove(&(role_id, permission_id)))
    }

    async fn sync_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        grantable: ScopePredicate,
    ) -> AppResult<usize> {
        let mut state = self.state.lock().await;
        for permission_id in permission_ids {
            let admitted = state.permissions.iter().any(|permission| {
                permission.id == *permission_id
                    && !permission.is_deleted()
                    && grantable.admits(permission.ownership())
            });
            if !admitted {
                return Err(AppError::Validation(format!(
                    "permission '{permission_id}' cannot be granted here"
                )));
            }
        }

        state.role_grants.retain(|(stored_role, _)| *stored_role != role_id);
        state
            .role_grants
            .extend(permission_ids.iter().map(|permission_id| (role_id, *permission_id)));
        Ok(state
            .role_grants
            .iter()
            .filter(|(stored_role, _)| *stored_role == role_id)
            .count())
    }

    async fn assign_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .user_grants
            .insert((user_id, permission_id)))
    }

    async fn remove_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .user_grants
            .remove(&(user_id, permission_id)))
    }
}

#[async_trait]
impl IdentityRepository for FakeCatalog {
    async fn find_assigned_role(&self, role_id: RoleId) -> AppResult<Option<AssignedRole>> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .iter()
            .find(|role| role.id == role_id)
            .map(|role| AssignedRole {
                role_id: role.id,
                name: role.name.clone(),
                tenant_id: role.tenant_id,
            }))
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.id == user_id).copied())
    }

    async fn count_role_users(&self, role_id: RoleId) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|user| user.role_id == Some(role_id))
            .count() as u64)
    }
}

#[async_trait]
impl AuditRepository for FakeCatalog {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.state.lock().await.events.push(event);
        Ok(())
    }
}
