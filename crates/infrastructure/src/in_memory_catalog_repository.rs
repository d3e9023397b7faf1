use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use parishdesk_application::{
    AuditEvent, AuditRepository, GrantRepository, IdentityRepository, PermissionRepository,
    ProvisionedTenant, RoleRepository, TenantProvisioningPlan, TenantProvisioningRepository,
    UserRecord,
};
use parishdesk_core::{
    ActorIdentity, AppError, AppResult, NonEmptyString, PermissionId, RoleId, SystemFlags,
    TenantId, UserId,
};
use parishdesk_domain::{
    AssignedRole, CatalogResource, ExclusiveFlag, FlaggedRow, NewPermission, NewRole, Ownership,
    Page, Permission, PermissionQuery, PermissionRevision, Role, RoleLevel, RoleQuery,
    RoleRevision, ScopePredicate, designate, grantable_permissions_for, name_key, names_collide,
};

/// System permission modules seeded by the data migration.
const SYSTEM_MODULES: [&str; 7] = [
    "families",
    "communities",
    "sacraments",
    "church",
    "roles",
    "permissions",
    "users",
];

/// User account stored by the in-memory adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// User identifier.
    pub id: UserId,
    /// Tenant of the user; `None` for system users.
    pub tenant_id: Option<TenantId>,
    /// Assigned role.
    pub role_id: Option<RoleId>,
    /// Login email.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// System-level flags.
    pub flags: SystemFlags,
    /// Whether the user is the designated owner of its tenant.
    pub is_tenant_owner: bool,
}

impl UserAccount {
    /// Creates an unflagged account.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        tenant_id: Option<TenantId>,
        role_id: Option<RoleId>,
    ) -> Self {
        let email = email.into();
        Self {
            id: UserId::new(),
            tenant_id,
            role_id,
            display_name: email.clone(),
            email,
            flags: SystemFlags::none(),
            is_tenant_owner: false,
        }
    }

    /// Replaces the system flags.
    #[must_use]
    pub fn with_flags(mut self, flags: SystemFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl FlaggedRow for UserAccount {
    type Owner = TenantId;
    type Key = UserId;

    fn owner(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn key(&self) -> UserId {
        self.id
    }

    fn set_flag(&mut self, flag: ExclusiveFlag, value: bool) {
        match flag {
            ExclusiveFlag::TenantOwner => self.is_tenant_owner = value,
        }
    }
}

#[derive(Debug, Clone)]
struct TenantRecord {
    slug: String,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    tenants: BTreeMap<TenantId, TenantRecord>,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    users: BTreeMap<UserId, UserAccount>,
    role_grants: BTreeSet<(RoleId, PermissionId)>,
    user_grants: BTreeSet<(UserId, PermissionId)>,
}

impl CatalogState {
    fn insert_role(&mut self, role: &NewRole) -> AppResult<Role> {
        let now = Utc::now();
        let created = Role {
            id: RoleId::new(),
            name: role.name.as_str().to_owned(),
            description: role.description.clone(),
            level: role.level,
            tenant_id: role.ownership.tenant_id,
            is_custom: role.ownership.is_custom,
            active: role.active,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.ensure_tenant(created.tenant_id)?;
        ensure_unique(self.roles.values(), &created)?;
        self.roles.insert(created.id, created.clone());

        Ok(created)
    }

    fn ensure_tenant(&self, tenant_id: Option<TenantId>) -> AppResult<()> {
        match tenant_id {
            Some(tenant_id) if !self.tenants.contains_key(&tenant_id) => Err(
                AppError::Validation(format!("tenant '{tenant_id}' does not exist")),
            ),
            _ => Ok(()),
        }
    }

    fn replace_role_permissions(
        &mut self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
        grantable: ScopePredicate,
    ) -> AppResult<usize> {
        let requested: BTreeSet<PermissionId> = permission_ids.iter().copied().collect();
        for permission_id in &requested {
            let admitted = self.permissions.get(permission_id).is_some_and(|permission| {
                !permission.is_deleted() && grantable.admits(permission.ownership())
            });
            if !admitted {
                return Err(AppError::Validation(format!(
                    "permission '{permission_id}' cannot be granted here"
                )));
            }
        }

        self.role_grants
            .retain(|(stored_role, _)| *stored_role != role_id);
        self.role_grants
            .extend(requested.iter().map(|permission_id| (role_id, *permission_id)));

        Ok(requested.len())
    }

    fn live_permissions(&self, granted: impl Iterator<Item = PermissionId>) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = granted
            .filter_map(|permission_id| self.permissions.get(&permission_id))
            .filter(|permission| !permission.is_deleted())
            .cloned()
            .collect();
        permissions.sort_by(|left, right| {
            left.module
                .cmp(&right.module)
                .then_with(|| left.category.cmp(&right.category))
                .then_with(|| left.name.cmp(&right.name))
        });

        permissions
    }
}

fn live<K, R>(rows: &BTreeMap<K, R>, key: &K) -> AppResult<R>
where
    K: Ord + std::fmt::Display,
    R: CatalogResource + Clone,
{
    rows.get(key)
        .filter(|row| !row.is_deleted())
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("'{key}' was not found")))
}

fn trashed<K, R>(rows: &BTreeMap<K, R>, key: &K) -> AppResult<R>
where
    K: Ord + std::fmt::Display,
    R: CatalogResource + Clone,
{
    rows.get(key)
        .filter(|row| row.is_deleted())
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("'{key}' was not found in trash")))
}

fn ensure_unique<'a, R>(rows: impl Iterator<Item = &'a R>, candidate: &R) -> AppResult<()>
where
    R: CatalogResource + 'a,
{
    if candidate.is_deleted() {
        return Ok(());
    }

    let key = name_key(candidate.label());
    let candidate_id = candidate.resource_id();
    let taken = rows.into_iter().any(|row| {
        row.resource_id() != candidate_id
            && !row.is_deleted()
            && name_key(row.label()) == key
            && names_collide(row.ownership().tenant_id, candidate.ownership().tenant_id)
    });
    if taken {
        return Err(AppError::Validation(format!(
            "name '{}' already exists",
            candidate.label()
        )));
    }

    Ok(())
}

/// In-memory implementation of every access catalog port.
///
/// Multi-step writes stage a copy of the state and swap it in only when
/// every step succeeded.
#[derive(Debug, Default)]
pub struct InMemoryCatalogRepository {
    state: RwLock<CatalogState>,
    audit_events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryCatalogRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the same system catalog the data migration seeds.
    pub async fn with_system_catalog() -> AppResult<Self> {
        let repository = Self::new();
        for module in SYSTEM_MODULES {
            for (action, category) in [
                ("view", "read"),
                ("create", "write"),
                ("update", "write"),
                ("delete", "write"),
            ] {
                repository
                    .seed_system_permission(
                        format!("{module}.{action}").as_str(),
                        module,
                        category,
                    )
                    .await?;
            }
        }

        let (all, read_only): (Vec<PermissionId>, Vec<PermissionId>) = {
            let state = repository.state.read().await;
            (
                state.permissions.keys().copied().collect(),
                state
                    .permissions
                    .values()
                    .filter(|permission| permission.category == "read")
                    .map(|permission| permission.id)
                    .collect(),
            )
        };

        let administrator = repository
            .seed_system_role("System Administrator", RoleLevel::HIGHEST)
            .await?;
        repository
            .sync_role_permissions(administrator.id, &all, ScopePredicate::SystemOnly)
            .await?;
        let manager = repository
            .seed_system_role("System Manager", RoleLevel::new(2)?)
            .await?;
        repository
            .sync_role_permissions(manager.id, &read_only, ScopePredicate::SystemOnly)
            .await?;

        Ok(repository)
    }

    /// Inserts a global, system-managed permission.
    pub async fn seed_system_permission(
        &self,
        name: &str,
        module: &str,
        category: &str,
    ) -> AppResult<Permission> {
        let value = |value: &str| NonEmptyString::new(value);
        self.create_permission(NewPermission {
            name: value(name)?,
            display_name: value(name)?,
            description: None,
            module: value(module)?,
            category: value(category)?,
            ownership: Ownership::system(),
            active: true,
        })
        .await
    }

    /// Inserts a global, system-managed role.
    pub async fn seed_system_role(&self, name: &str, level: RoleLevel) -> AppResult<Role> {
        self.create_role(NewRole {
            name: NonEmptyString::new(name)?,
            description: None,
            level,
            ownership: Ownership::system(),
            active: true,
        })
        .await
    }

    /// Registers a tenant without provisioning it.
    pub async fn insert_tenant(&self, slug: &str) -> AppResult<TenantId> {
        let mut state = self.state.write().await;
        if state.tenants.values().any(|tenant| tenant.slug == slug) {
            return Err(AppError::Validation(format!(
                "tenant slug '{slug}' already exists"
            )));
        }

        let tenant_id = TenantId::new();
        state.tenants.insert(
            tenant_id,
            TenantRecord {
                slug: slug.to_owned(),
            },
        );
        Ok(tenant_id)
    }

    /// Stores a user account.
    pub async fn insert_user(&self, user: UserAccount) -> AppResult<UserId> {
        let mut state = self.state.write().await;
        state.ensure_tenant(user.tenant_id)?;
        if let Some(role_id) = user.role_id
            && !state.roles.contains_key(&role_id)
        {
            return Err(AppError::Validation(format!("role '{role_id}' does not exist")));
        }
        if state
            .users
            .values()
            .any(|stored| stored.email.eq_ignore_ascii_case(user.email.as_str()))
        {
            return Err(AppError::Validation(format!(
                "user '{}' already exists",
                user.email
            )));
        }

        let user_id = user.id;
        state.users.insert(user_id, user);
        Ok(user_id)
    }

    /// Builds the identity snapshot of a stored user.
    pub async fn identity_for(&self, user_id: UserId) -> AppResult<ActorIdentity> {
        let state = self.state.read().await;
        let user = state
            .users
            .get(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' was not found")))?;

        Ok(ActorIdentity::new(
            user.id,
            user.tenant_id,
            user.role_id,
            user.flags,
        ))
    }

    /// Returns the designated owner of a tenant.
    pub async fn tenant_owner(&self, tenant_id: TenantId) -> Option<UserId> {
        self.state
            .read()
            .await
            .users
            .values()
            .find(|user| user.tenant_id == Some(tenant_id) && user.is_tenant_owner)
            .map(|user| user.id)
    }

    /// Returns a copy of every appended audit event.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit_events.read().await.clone()
    }
}

#[async_trait]
impl RoleRepository for InMemoryCatalogRepository {
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Page<Role>> {
        let state = self.state.read().await;
        let mut rows: Vec<Role> = state
            .roles
            .values()
            .filter(|role| query.matches(role))
            .cloned()
            .collect();
        rows.sort_by(|left, right| query.compare(left, right));

        Ok(Page::from_sorted(rows, query.page))
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(&role_id).cloned())
    }

    async fn create_role(&self, role: NewRole) -> AppResult<Role> {
        self.state.write().await.insert_role(&role)
    }

    async fn update_role(&self, role_id: RoleId, revision: &RoleRevision) -> AppResult<Role> {
        let mut state = self.state.write().await;
        let mut revised = live(&state.roles, &role_id)?;
        revision.apply_to(&mut revised);
        ensure_unique(state.roles.values(), &revised)?;

        revised.updated_at = Utc::now();
        state.roles.insert(role_id, revised.clone());
        Ok(revised)
    }

    async fn set_role_active(&self, role_id: RoleId, active: bool) -> AppResult<Role> {
        let mut state = self.state.write().await;
        let role = state
            .roles
            .get_mut(&role_id)
            .filter(|role| !role.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        role.active = active;
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn restore_role(&self, role_id: RoleId) -> AppResult<Role> {
        let mut state = self.state.write().await;
        let mut restored = trashed(&state.roles, &role_id)?;
        restored.deleted_at = None;
        ensure_unique(state.roles.values(), &restored)?;

        restored.updated_at = Utc::now();
        state.roles.insert(role_id, restored.clone());
        Ok(restored)
    }

    async fn soft_delete_role(&self, role_id: RoleId) -> AppResult<Role> {
        let mut state = self.state.write().await;
        let holders = state
            .users
            .values()
            .filter(|user| user.role_id == Some(role_id))
            .count();
        let role = state
            .roles
            .get_mut(&role_id)
            .filter(|role| !role.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;
        if holders > 0 {
            return Err(AppError::HasDependents(format!(
                "role '{role_id}' is assigned to {holders} user(s)"
            )));
        }

        let now = Utc::now();
        role.deleted_at = Some(now);
        role.updated_at = now;
        Ok(role.clone())
    }
}

#[async_trait]
impl PermissionRepository for InMemoryCatalogRepository {
    async fn list_permissions(&self, query: &PermissionQuery) -> AppResult<Page<Permission>> {
        let state = self.state.read().await;
        let mut rows: Vec<Permission> = state
            .permissions
            .values()
            .filter(|permission| query.matches(permission))
            .cloned()
            .collect();
        rows.sort_by(|left, right| query.compare(left, right));

        Ok(Page::from_sorted(rows, query.page))
    }

    async fn list_modules(&self, scope: ScopePredicate) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        let modules: BTreeSet<String> = state
            .permissions
            .values()
            .filter(|permission| !permission.is_deleted() && scope.admits(permission.ownership()))
            .map(|permission| permission.module.clone())
            .collect();

        Ok(modules.into_iter().collect())
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<Permission>> {
        Ok(self.state.read().await.permissions.get(&permission_id).cloned())
    }

    async fn create_permission(&self, permission: NewPermission) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let created = Permission {
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
        state.ensure_tenant(created.tenant_id)?;
        ensure_unique(state.permissions.values(), &created)?;
        state.permissions.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_permission(
        &self,
        permission_id: PermissionId,
        revision: &PermissionRevision,
    ) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        let mut revised = live(&state.permissions, &permission_id)?;
        revision.apply_to(&mut revised);
        ensure_unique(state.permissions.values(), &revised)?;

        revised.updated_at = Utc::now();
        state.permissions.insert(permission_id, revised.clone());
        Ok(revised)
    }

    async fn set_permission_active(
        &self,
        permission_id: PermissionId,
        active: bool,
    ) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        let permission = state
            .permissions
            .get_mut(&permission_id)
            .filter(|permission| !permission.is_deleted())
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' was not found"))
            })?;

        permission.active = active;
        permission.updated_at = Utc::now();
        Ok(permission.clone())
    }

    async fn restore_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        let mut restored = trashed(&state.permissions, &permission_id)?;
        restored.deleted_at = None;
        ensure_unique(state.permissions.values(), &restored)?;

        restored.updated_at = Utc::now();
        state.permissions.insert(permission_id, restored.clone());
        Ok(restored)
    }

    async fn soft_delete_permission(&self, permission_id: PermissionId) -> AppResult<Permission> {
        let mut state = self.state.write().await;
        let permission = state
            .permissions
            .get_mut(&permission_id)
            .filter(|permission| !permission.is_deleted())
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' was not found"))
            })?;

        let now = Utc::now();
        permission.deleted_at = Some(now);
        permission.updated_at = now;
        Ok(permission.clone())
    }
}

#[async_trait]
impl GrantRepository for InMemoryCatalogRepository {
    async fn list_role_permissions(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state.live_permissions(
            state
                .role_grants
                .iter()
                .filter(|(stored_role, _)| *stored_role == role_id)
                .map(|(_, permission_id)| *permission_id),
        ))
    }

    async fn list_user_permissions(&self, user_id: UserId) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state.live_permissions(
            state
                .user_grants
                .iter()
                .filter(|(stored_user, _)| *stored_user == user_id)
                .map(|(_, permission_id)| *permission_id),
        ))
    }

    async fn assign_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&role_id) || !state.permissions.contains_key(&permission_id) {
            return Err(AppError::Validation(
                "grant: referenced row does not exist".to_owned(),
            ));
        }

        Ok(state.role_grants.insert((role_id, permission_id)))
    }

    async fn remove_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .write()
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
        let mut state = self.state.write().await;
        if !state
            .roles
            .get(&role_id)
            .is_some_and(|role| !role.is_deleted())
        {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        }

        let mut staged = state.clone();
        let granted = staged.replace_role_permissions(role_id, permission_ids, grantable)?;
        *state = staged;

        Ok(granted)
    }

    async fn assign_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) || !state.permissions.contains_key(&permission_id) {
            return Err(AppError::Validation(
                "grant: referenced row does not exist".to_owned(),
            ));
        }

        Ok(state.user_grants.insert((user_id, permission_id)))
    }

    async fn remove_user_permission(
        &self,
        user_id: UserId,
        permission_id: PermissionId,
    ) -> AppResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .user_grants
            .remove(&(user_id, permission_id)))
    }
}

#[async_trait]
impl IdentityRepository for InMemoryCatalogRepository {
    async fn find_assigned_role(&self, role_id: RoleId) -> AppResult<Option<AssignedRole>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .get(&role_id)
            .filter(|role| !role.is_deleted())
            .map(|role| AssignedRole {
                role_id: role.id,
                name: role.name.clone(),
                tenant_id: role.tenant_id,
            }))
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .get(&user_id)
            .map(|user| UserRecord {
                id: user.id,
                tenant_id: user.tenant_id,
                role_id: user.role_id,
            }))
    }

    async fn count_role_users(&self, role_id: RoleId) -> AppResult<u64> {
        let count = self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|user| user.role_id == Some(role_id))
            .count();

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid user count: {error}")))
    }
}

#[async_trait]
impl TenantProvisioningRepository for InMemoryCatalogRepository {
    async fn provision_tenant(
        &self,
        plan: TenantProvisioningPlan,
    ) -> AppResult<ProvisionedTenant> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();

        if staged
            .tenants
            .values()
            .any(|tenant| tenant.slug == plan.slug.as_str())
        {
            return Err(AppError::Validation(format!(
                "tenant slug '{}' already exists",
                plan.slug
            )));
        }
        staged.tenants.insert(
            plan.tenant_id,
            TenantRecord {
                slug: plan.slug.as_str().to_owned(),
            },
        );

        let administrator_role = staged.insert_role(&plan.administrator_role)?;

        let snapshot: Vec<PermissionId> = staged
            .permissions
            .values()
            .filter(|permission| {
                permission.ownership().is_system() && permission.active && !permission.is_deleted()
            })
            .map(|permission| permission.id)
            .collect();
        let granted_count = staged.replace_role_permissions(
            administrator_role.id,
            &snapshot,
            grantable_permissions_for(Some(plan.tenant_id)),
        )?;

        if staged
            .users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(plan.owner.email.as_str()))
        {
            return Err(AppError::Validation(format!(
                "user '{}' already exists",
                plan.owner.email
            )));
        }
        staged.users.insert(
            plan.owner.user_id,
            UserAccount {
                id: plan.owner.user_id,
                tenant_id: Some(plan.tenant_id),
                role_id: Some(administrator_role.id),
                email: plan.owner.email.as_str().to_owned(),
                display_name: plan.owner.display_name.as_str().to_owned(),
                flags: SystemFlags::none(),
                is_tenant_owner: false,
            },
        );
        designate(
            staged.users.values_mut(),
            ExclusiveFlag::TenantOwner,
            &plan.tenant_id,
            &plan.owner.user_id,
        )?;

        *state = staged;

        Ok(ProvisionedTenant {
            tenant_id: plan.tenant_id,
            name: plan.name.into(),
            slug: plan.slug.into(),
            administrator_role,
            owner_user_id: plan.owner.user_id,
            granted_count,
            empty_catalog_warning: snapshot.is_empty(),
        })
    }
}

#[async_trait]
impl AuditRepository for InMemoryCatalogRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.audit_events.write().await.push(event);
        Ok(())
    }
}
