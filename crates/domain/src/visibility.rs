//! Read-time scoping of the role and permission catalogs.
//!
//! Tenant actors see only their own roles, but they see the global system
//! permissions next to their own custom permissions. The asymmetry is policy
//! and is pinned by tests in this module and in the service tests.

use std::cmp::Ordering;

use parishdesk_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorClass};
use crate::catalog::{CatalogResource, Ownership, Permission, Role};

/// Default page size for paginated listings.
pub const DEFAULT_PER_PAGE: u32 = 15;
/// Largest accepted page size.
pub const MAX_PER_PAGE: u32 = 100;
/// Transport value requesting the full filtered set.
pub const ALL_PAGES_SENTINEL: &str = "all";

/// Row-level scoping predicate derived from the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopePredicate {
    /// Every row.
    Unrestricted,
    /// `tenant_id = T`.
    TenantOwned(TenantId),
    /// `tenant_id IS NULL AND is_custom = false`.
    SystemOnly,
    /// `(tenant_id IS NULL AND is_custom = false) OR (tenant_id = T AND is_custom = true)`.
    SystemOrTenantCustom(TenantId),
}

impl ScopePredicate {
    /// Evaluates the predicate against a row's ownership markers.
    #[must_use]
    pub fn admits(&self, ownership: Ownership) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::TenantOwned(tenant_id) => ownership.tenant_id == Some(*tenant_id),
            Self::SystemOnly => ownership.is_system(),
            Self::SystemOrTenantCustom(tenant_id) => {
                ownership.is_system()
                    || (ownership.tenant_id == Some(*tenant_id) && ownership.is_custom)
            }
        }
    }
}

/// Resolves the role scope for an actor.
///
/// Only super admins may narrow the listing to another tenant.
pub fn role_scope(actor: &Actor, tenant_override: Option<TenantId>) -> AppResult<ScopePredicate> {
    actor.require_standing()?;
    match actor.class() {
        ActorClass::SuperAdmin => Ok(tenant_override
            .map(ScopePredicate::TenantOwned)
            .unwrap_or(ScopePredicate::Unrestricted)),
        ActorClass::SystemOperator => Ok(ScopePredicate::Unrestricted),
        ActorClass::TenantAdmin | ActorClass::TenantUser => tenant_of(actor)
            .map(ScopePredicate::TenantOwned),
        ActorClass::Orphan => Err(orphan_error(actor)),
    }
}

/// Resolves the permission scope for an actor.
pub fn permission_scope(actor: &Actor) -> AppResult<ScopePredicate> {
    actor.require_standing()?;
    match actor.class() {
        ActorClass::SuperAdmin | ActorClass::SystemOperator => Ok(ScopePredicate::Unrestricted),
        ActorClass::TenantAdmin | ActorClass::TenantUser => {
            tenant_of(actor).map(ScopePredicate::SystemOrTenantCustom)
        }
        ActorClass::Orphan => Err(orphan_error(actor)),
    }
}

/// Permissions that may be granted to a role or user owned by `tenant_id`.
#[must_use]
pub fn grantable_permissions_for(tenant_id: Option<TenantId>) -> ScopePredicate {
    tenant_id
        .map(ScopePredicate::SystemOrTenantCustom)
        .unwrap_or(ScopePredicate::SystemOnly)
}

/// Returns whether a user belonging to `user_tenant` is visible to the actor.
#[must_use]
pub fn user_visible(actor: &Actor, user_tenant: Option<TenantId>) -> bool {
    match actor.class() {
        ActorClass::SuperAdmin | ActorClass::SystemOperator => true,
        ActorClass::TenantAdmin | ActorClass::TenantUser => {
            user_tenant.is_some() && user_tenant == actor.tenant_id()
        }
        ActorClass::Orphan => false,
    }
}

fn tenant_of(actor: &Actor) -> AppResult<TenantId> {
    actor.confining_tenant().ok_or_else(|| orphan_error(actor))
}

fn orphan_error(actor: &Actor) -> AppError {
    AppError::TenantRequired(format!(
        "user '{}' is not associated with a tenant",
        actor.user_id()
    ))
}

/// Soft-delete handling for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashedFilter {
    /// Live rows only.
    #[default]
    Exclude,
    /// Live and soft-deleted rows.
    Include,
    /// Soft-deleted rows only.
    Only,
}

impl TrashedFilter {
    /// Evaluates the filter against a soft-delete marker.
    #[must_use]
    pub fn admits(&self, is_deleted: bool) -> bool {
        match self {
            Self::Exclude => !is_deleted,
            Self::Include => true,
            Self::Only => is_deleted,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Sortable role columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSortField {
    /// Role name.
    Name,
    /// Role level.
    Level,
    /// Creation timestamp.
    CreatedAt,
}

/// Sortable permission columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSortField {
    /// Machine name.
    Name,
    /// Display name.
    DisplayName,
    /// Module.
    Module,
    /// Category.
    Category,
    /// Creation timestamp.
    CreatedAt,
}

/// Caller-chosen sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec<F> {
    /// Column.
    pub field: F,
    /// Direction.
    pub direction: SortDirection,
}

/// Caller filters for role listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleListFilters {
    /// Status filter.
    pub active: Option<bool>,
    /// Tenant narrowing, honored for super admins only.
    pub tenant_id: Option<TenantId>,
    /// Free-text search over name and description.
    pub search: Option<String>,
    /// Soft-delete handling.
    #[serde(default)]
    pub trashed: TrashedFilter,
    /// Sort override.
    pub sort: Option<SortSpec<RoleSortField>>,
}

/// Caller filters for permission listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionListFilters {
    /// Status filter.
    pub active: Option<bool>,
    /// Module filter.
    pub module: Option<String>,
    /// Category filter.
    pub category: Option<String>,
    /// Free-text search over name, display name and description.
    pub search: Option<String>,
    /// Soft-delete handling.
    #[serde(default)]
    pub trashed: TrashedFilter,
    /// Sort override.
    pub sort: Option<SortSpec<PermissionSortField>>,
}

/// Resolved role listing: scope predicate ANDed with caller filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleQuery {
    /// Scope predicate.
    pub scope: ScopePredicate,
    /// Status filter.
    pub active: Option<bool>,
    /// Lowercased search term.
    pub search: Option<String>,
    /// Soft-delete handling.
    pub trashed: TrashedFilter,
    /// Sort override; `None` means level asc, created_at desc.
    pub sort: Option<SortSpec<RoleSortField>>,
    /// Page request.
    pub page: PageRequest,
}

impl RoleQuery {
    /// Builds the listing query for an actor.
    pub fn for_actor(
        actor: &Actor,
        filters: RoleListFilters,
        page: PageRequest,
    ) -> AppResult<Self> {
        Ok(Self {
            scope: role_scope(actor, filters.tenant_id)?,
            active: filters.active,
            search: normalize_search(filters.search),
            trashed: filters.trashed,
            sort: filters.sort,
            page,
        })
    }

    /// Evaluates scope and filters against one row.
    #[must_use]
    pub fn matches(&self, role: &Role) -> bool {
        self.scope.admits(role.ownership())
            && self.trashed.admits(role.is_deleted())
            && self.active.is_none_or(|active| role.active == active)
            && self.search.as_deref().is_none_or(|term| {
                contains_term(role.name.as_str(), term)
                    || role
                        .description
                        .as_deref()
                        .is_some_and(|description| contains_term(description, term))
            })
    }

    /// Orders two rows according to the requested sort.
    #[must_use]
    pub fn compare(&self, left: &Role, right: &Role) -> Ordering {
        let primary = match self.sort {
            None => left
                .level
                .cmp(&right.level)
                .then_with(|| right.created_at.cmp(&left.created_at)),
            Some(sort) => sort.direction.apply(match sort.field {
                RoleSortField::Name => left.name.to_lowercase().cmp(&right.name.to_lowercase()),
                RoleSortField::Level => left.level.cmp(&right.level),
                RoleSortField::CreatedAt => left.created_at.cmp(&right.created_at),
            }),
        };

        primary.then_with(|| left.id.cmp(&right.id))
    }
}

/// Resolved permission listing: scope predicate ANDed with caller filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionQuery {
    /// Scope predicate.
    pub scope: ScopePredicate,
    /// Status filter.
    pub active: Option<bool>,
    /// Module filter.
    pub module: Option<String>,
    /// Category filter.
    pub category: Option<String>,
    /// Lowercased search term.
    pub search: Option<String>,
    /// Soft-delete handling.
    pub trashed: TrashedFilter,
    /// Sort override; `None` means module, category, name ascending.
    pub sort: Option<SortSpec<PermissionSortField>>,
    /// Page request.
    pub page: PageRequest,
}

impl PermissionQuery {
    /// Builds the listing query for an actor.
    pub fn for_actor(
        actor: &Actor,
        filters: PermissionListFilters,
        page: PageRequest,
    ) -> AppResult<Self> {
        Ok(Self {
            scope: permission_scope(actor)?,
            active: filters.active,
            module: normalize_exact(filters.module),
            category: normalize_exact(filters.category),
            search: normalize_search(filters.search),
            trashed: filters.trashed,
            sort: filters.sort,
            page,
        })
    }

    /// Evaluates scope and filters against one row.
    #[must_use]
    pub fn matches(&self, permission: &Permission) -> bool {
        self.scope.admits(permission.ownership())
            && self.trashed.admits(permission.is_deleted())
            && self.active.is_none_or(|active| permission.active == active)
            && self
                .module
                .as_deref()
                .is_none_or(|module| permission.module == module)
            && self
                .category
                .as_deref()
                .is_none_or(|category| permission.category == category)
            && self.search.as_deref().is_none_or(|term| {
                contains_term(permission.name.as_str(), term)
                    || contains_term(permission.display_name.as_str(), term)
                    || permission
                        .description
                        .as_deref()
                        .is_some_and(|description| contains_term(description, term))
            })
    }

    /// Orders two rows according to the requested sort.
    #[must_use]
    pub fn compare(&self, left: &Permission, right: &Permission) -> Ordering {
        let primary = match self.sort {
            None => left
                .module
                .cmp(&right.module)
                .then_with(|| left.category.cmp(&right.category))
                .then_with(|| left.name.cmp(&right.name)),
            Some(sort) => sort.direction.apply(match sort.field {
                PermissionSortField::Name => left.name.cmp(&right.name),
                PermissionSortField::DisplayName => left.display_name.cmp(&right.display_name),
                PermissionSortField::Module => left.module.cmp(&right.module),
                PermissionSortField::Category => left.category.cmp(&right.category),
                PermissionSortField::CreatedAt => left.created_at.cmp(&right.created_at),
            }),
        };

        primary.then_with(|| left.id.cmp(&right.id))
    }
}

fn normalize_search(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
}

fn normalize_exact(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn contains_term(haystack: &str, lowercase_term: &str) -> bool {
    haystack.to_lowercase().contains(lowercase_term)
}

/// Requested slice of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRequest {
    /// One page of `per_page` rows, 1-based.
    Page {
        /// Page number starting at 1.
        page: u32,
        /// Rows per page.
        per_page: u32,
    },
    /// The full filtered set.
    All,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::Page {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Creates a clamped page request.
    #[must_use]
    pub fn page(page: u32, per_page: u32) -> Self {
        Self::Page {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Parses transport values; `per_page=all` selects the full set.
    pub fn parse(page: Option<&str>, per_page: Option<&str>) -> AppResult<Self> {
        let per_page = match per_page.map(str::trim).filter(|value| !value.is_empty()) {
            None => DEFAULT_PER_PAGE,
            Some(value) if value.eq_ignore_ascii_case(ALL_PAGES_SENTINEL) => return Ok(Self::All),
            Some(value) => value.parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid per_page '{value}': {error}"))
            })?,
        };
        let page = match page.map(str::trim).filter(|value| !value.is_empty()) {
            None => 1,
            Some(value) => value.parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid page '{value}': {error}"))
            })?,
        };

        Ok(Self::page(page, per_page))
    }

    /// Returns `(offset, limit)` for paginated requests.
    #[must_use]
    pub fn window(&self) -> Option<(u64, u64)> {
        match self {
            Self::Page { page, per_page } => Some((
                u64::from(page.saturating_sub(1)) * u64::from(*per_page),
                u64::from(*per_page),
            )),
            Self::All => None,
        }
    }
}

/// Pagination metadata returned with every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Rows matching the filters.
    pub total: u64,
    /// Current page, 1-based.
    pub current_page: u32,
    /// Last page, at least 1.
    pub last_page: u32,
    /// Page size.
    pub per_page: u32,
    /// 1-based position of the first returned row.
    pub from: Option<u64>,
    /// 1-based position of the last returned row.
    pub to: Option<u64>,
}

impl PageMeta {
    /// Computes metadata for a request, the total count and the returned row count.
    #[must_use]
    pub fn new(request: PageRequest, total: u64, returned: usize) -> Self {
        let returned = u64::try_from(returned).unwrap_or(u64::MAX);
        match request {
            PageRequest::All => Self {
                total,
                current_page: 1,
                last_page: 1,
                per_page: u32::try_from(total).unwrap_or(u32::MAX),
                from: (returned > 0).then_some(1),
                to: (returned > 0).then_some(returned),
            },
            PageRequest::Page { page, per_page } => {
                let last_page = u32::try_from(total.div_ceil(u64::from(per_page)))
                    .unwrap_or(u32::MAX)
                    .max(1);
                let offset = u64::from(page.saturating_sub(1)) * u64::from(per_page);
                Self {
                    total,
                    current_page: page,
                    last_page,
                    per_page,
                    from: (returned > 0).then_some(offset + 1),
                    to: (returned > 0).then_some(offset + returned),
                }
            }
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Returned rows.
    pub items: Vec<T>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Slices an already filtered and ordered set.
    #[must_use]
    pub fn from_sorted(rows: Vec<T>, request: PageRequest) -> Self {
        let total = u64::try_from(rows.len()).unwrap_or(u64::MAX);
        let items: Vec<T> = match request.window() {
            None => rows,
            Some((offset, limit)) => rows
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
        };
        let meta = PageMeta::new(request, total, items.len());

        Self { items, meta }
    }

    /// Maps the rows while keeping the metadata.
    #[must_use]
    pub fn map<U>(self, transform: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(transform).collect(),
            meta: self.meta,
        }
    }
}
