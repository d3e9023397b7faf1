use chrono::{DateTime, Utc};
use parishdesk_core::{AppError, AppResult, NonEmptyString, PermissionId, RoleId, TenantId};
use serde::{Deserialize, Serialize};

use crate::actor::ADMINISTRATOR_ROLE_NAME;

/// Maximum length of role and permission names.
pub const NAME_MAX_LENGTH: usize = 100;

/// Catalog kinds governed by the access engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Role catalog.
    Role,
    /// Permission catalog.
    Permission,
}

impl ResourceKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Permission => "permission",
        }
    }
}

/// Ownership markers shared by roles and permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ownership {
    /// Owning tenant; `None` marks a global row.
    pub tenant_id: Option<TenantId>,
    /// Whether the row was created through the catalog write path.
    pub is_custom: bool,
}

impl Ownership {
    /// Global row seeded by data migration.
    #[must_use]
    pub fn system() -> Self {
        Self {
            tenant_id: None,
            is_custom: false,
        }
    }

    /// Tenant-owned custom row.
    #[must_use]
    pub fn custom(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            is_custom: true,
        }
    }

    /// Tenant-scoped but system-managed row, such as the provisioned Administrator role.
    #[must_use]
    pub fn tenant_managed(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            is_custom: false,
        }
    }

    /// Returns whether this is a global, system-managed row.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.tenant_id.is_none() && !self.is_custom
    }

    /// Returns whether the markers are inconsistent (custom without a tenant).
    #[must_use]
    pub fn is_anomalous(&self) -> bool {
        self.tenant_id.is_none() && self.is_custom
    }
}

/// Implemented by catalog rows so policy can inspect them uniformly.
pub trait CatalogResource {
    /// Catalog kind of the row.
    fn kind(&self) -> ResourceKind;
    /// Stable identifier rendered for messages and audit.
    fn resource_id(&self) -> String;
    /// Display label used in messages.
    fn label(&self) -> &str;
    /// Ownership markers.
    fn ownership(&self) -> Ownership;
    /// Soft-delete marker.
    fn is_deleted(&self) -> bool;
}

/// Role level between 1 (highest) and 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RoleLevel(u8);

impl RoleLevel {
    /// Highest privilege level.
    pub const HIGHEST: Self = Self(1);
    /// Default level for custom roles.
    pub const DEFAULT: Self = Self(5);

    /// Creates a validated role level.
    pub fn new(value: u8) -> AppResult<Self> {
        if !(1..=10).contains(&value) {
            return Err(AppError::Validation(format!(
                "role level must be between 1 and 10, got {value}"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the numeric level.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for RoleLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for RoleLevel {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleLevel> for u8 {
    fn from(value: RoleLevel) -> Self {
        value.0
    }
}

/// Persisted role row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Role name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Privilege level.
    pub level: RoleLevel,
    /// Owning tenant; `None` for global roles.
    pub tenant_id: Option<TenantId>,
    /// Whether the role was created through the write path.
    pub is_custom: bool,
    /// Status flag.
    pub active: bool,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CatalogResource for Role {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Role
    }

    fn resource_id(&self) -> String {
        self.id.to_string()
    }

    fn label(&self) -> &str {
        self.name.as_str()
    }

    fn ownership(&self) -> Ownership {
        Ownership {
            tenant_id: self.tenant_id,
            is_custom: self.is_custom,
        }
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Persisted permission row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Stable permission identifier.
    pub id: PermissionId,
    /// Machine name, e.g. `families.view`.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Functional module, e.g. `families`.
    pub module: String,
    /// Category inside the module, e.g. `read`.
    pub category: String,
    /// Owning tenant; `None` for global permissions.
    pub tenant_id: Option<TenantId>,
    /// Whether the permission was created through the write path.
    pub is_custom: bool,
    /// Status flag.
    pub active: bool,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CatalogResource for Permission {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Permission
    }

    fn resource_id(&self) -> String {
        self.id.to_string()
    }

    fn label(&self) -> &str {
        self.name.as_str()
    }

    fn ownership(&self) -> Ownership {
        Ownership {
            tenant_id: self.tenant_id,
            is_custom: self.is_custom,
        }
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Client-supplied role payload before sanitization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    /// Requested name.
    pub name: String,
    /// Requested description.
    pub description: Option<String>,
    /// Requested level; defaults to 5.
    pub level: Option<u8>,
    /// Requested tenant; honored only for super admins.
    pub tenant_id: Option<TenantId>,
    /// Requested custom marker; honored only for super admins.
    pub is_custom: Option<bool>,
    /// Requested status; defaults to active.
    pub active: Option<bool>,
}

/// Client-supplied permission payload before sanitization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDraft {
    /// Requested machine name.
    pub name: String,
    /// Requested display name; defaults to the machine name.
    pub display_name: Option<String>,
    /// Requested description.
    pub description: Option<String>,
    /// Requested module.
    pub module: String,
    /// Requested category.
    pub category: String,
    /// Requested tenant; honored only for super admins.
    pub tenant_id: Option<TenantId>,
    /// Requested custom marker; honored only for super admins.
    pub is_custom: Option<bool>,
    /// Requested status; defaults to active.
    pub active: Option<bool>,
}

/// Sanitized role ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Validated name.
    pub name: NonEmptyString,
    /// Description.
    pub description: Option<String>,
    /// Validated level.
    pub level: RoleLevel,
    /// Final ownership markers.
    pub ownership: Ownership,
    /// Initial status.
    pub active: bool,
}

/// Sanitized permission ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    /// Validated machine name.
    pub name: NonEmptyString,
    /// Validated display name.
    pub display_name: NonEmptyString,
    /// Description.
    pub description: Option<String>,
    /// Validated module.
    pub module: NonEmptyString,
    /// Validated category.
    pub category: NonEmptyString,
    /// Final ownership markers.
    pub ownership: Ownership,
    /// Initial status.
    pub active: bool,
}

/// Partial role update. Ownership markers are never part of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanges {
    /// New name.
    pub name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New level.
    pub level: Option<u8>,
}

impl RoleChanges {
    /// Validates the requested fields.
    pub fn validate(&self) -> AppResult<RoleRevision> {
        Ok(RoleRevision {
            name: self.name.as_deref().map(validate_name).transpose()?,
            description: self.description.clone().map(normalize_optional),
            level: self.level.map(RoleLevel::new).transpose()?,
        })
    }
}

/// Validated descriptive role update. `None` leaves the stored value untouched.
///
/// Status and tombstone fields are never part of a revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRevision {
    /// New name.
    pub name: Option<NonEmptyString>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New level.
    pub level: Option<RoleLevel>,
}

impl RoleRevision {
    /// Writes the revised fields onto a stored row.
    pub fn apply_to(&self, role: &mut Role) {
        if let Some(name) = &self.name {
            role.name = name.as_str().to_owned();
        }
        if let Some(description) = &self.description {
            role.description.clone_from(description);
        }
        if let Some(level) = self.level {
            role.level = level;
        }
    }
}

/// Partial permission update. Ownership markers are never part of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionChanges {
    /// New machine name.
    pub name: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New module.
    pub module: Option<String>,
    /// New category.
    pub category: Option<String>,
}

impl PermissionChanges {
    /// Validates the requested fields.
    pub fn validate(&self) -> AppResult<PermissionRevision> {
        Ok(PermissionRevision {
            name: self.name.as_deref().map(validate_name).transpose()?,
            display_name: self.display_name.as_deref().map(validate_name).transpose()?,
            description: self.description.clone().map(normalize_optional),
            module: self.module.as_deref().map(NonEmptyString::new).transpose()?,
            category: self.category.as_deref().map(NonEmptyString::new).transpose()?,
        })
    }
}

/// Validated descriptive permission update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionRevision {
    /// New machine name.
    pub name: Option<NonEmptyString>,
    /// New display name.
    pub display_name: Option<NonEmptyString>,
    /// New description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New module.
    pub module: Option<NonEmptyString>,
    /// New category.
    pub category: Option<NonEmptyString>,
}

impl PermissionRevision {
    /// Writes the revised fields onto a stored row.
    pub fn apply_to(&self, permission: &mut Permission) {
        if let Some(name) = &self.name {
            permission.name = name.as_str().to_owned();
        }
        if let Some(display_name) = &self.display_name {
            permission.display_name = display_name.as_str().to_owned();
        }
        if let Some(description) = &self.description {
            permission.description.clone_from(description);
        }
        if let Some(module) = &self.module {
            permission.module = module.as_str().to_owned();
        }
        if let Some(category) = &self.category {
            permission.category = category.as_str().to_owned();
        }
    }
}

/// Validates a role or permission name.
pub fn validate_name(value: &str) -> AppResult<NonEmptyString> {
    let name = NonEmptyString::new(value)?;
    if name.as_str().chars().count() > NAME_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "name must be at most {NAME_MAX_LENGTH} characters"
        )));
    }

    Ok(name)
}

/// Canonical key used for name uniqueness comparisons.
#[must_use]
pub fn name_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Returns whether two rows with the same name key would collide.
///
/// Names are unique inside one tenant. A global row occupies its name in
/// every tenant namespace.
#[must_use]
pub fn names_collide(left: Option<TenantId>, right: Option<TenantId>) -> bool {
    left.is_none() || right.is_none() || left == right
}

/// Rejects role names that only a tenant's provisioned Administrator may carry.
///
/// A global role named like the Administrator would collide with the
/// Administrator of every tenant provisioned afterwards.
pub fn ensure_role_name_allowed(tenant_id: Option<TenantId>, name: &str) -> AppResult<()> {
    if tenant_id.is_none() && name_key(name) == name_key(ADMINISTRATOR_ROLE_NAME) {
        return Err(AppError::Validation(format!(
            "'{name}' is reserved for tenant administrator roles"
        )));
    }

    Ok(())
}

/// Trims optional free text and drops it when blank.
#[must_use]
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
