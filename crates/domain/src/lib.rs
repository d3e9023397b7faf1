//! Pure access-catalog policy: classification, scoping and write authorization.

#![forbid(unsafe_code)]

mod actor;
mod audit;
mod catalog;
mod designation;
mod policy;
mod visibility;

pub use actor::{
    ADMINISTRATOR_ROLE_NAME, Actor, ActorClass, AssignedRole, classify, requires_role_lookup,
};
pub use audit::{AuditAction, AuditOutcome};
pub use catalog::{
    CatalogResource, NAME_MAX_LENGTH, NewPermission, NewRole, Ownership, Permission,
    PermissionChanges, PermissionDraft, PermissionRevision, ResourceKind, Role, RoleChanges,
    RoleDraft, RoleLevel, RoleRevision, ensure_role_name_allowed, name_key, names_collide,
    normalize_optional, validate_name,
};
pub use designation::{ExclusiveFlag, FlaggedRow, designate};
pub use policy::{
    MutationAction, authorize_target, authorize_user_grant, can_manage,
    sanitize_administrator_role, sanitize_permission_draft, sanitize_role_draft,
};
pub use visibility::{
    ALL_PAGES_SENTINEL, DEFAULT_PER_PAGE, MAX_PER_PAGE, Page, PageMeta, PageRequest,
    PermissionListFilters, PermissionQuery, PermissionSortField, RoleListFilters, RoleQuery,
    RoleSortField, ScopePredicate, SortDirection, SortSpec, TrashedFilter,
    grantable_permissions_for, permission_scope, role_scope, user_visible,
};
