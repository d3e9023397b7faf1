use std::sync::Arc;

use parishdesk_core::{AppError, AppResult, PermissionId};
use parishdesk_domain::{
    Actor, AuditAction, CatalogResource, MutationAction, Page, PageRequest, Permission,
    PermissionChanges, PermissionDraft, PermissionListFilters, PermissionQuery, TrashedFilter,
    authorize_target, permission_scope, sanitize_permission_draft,
};
use serde::Serialize;

use crate::access_ports::{AuditRepository, PermissionRepository};
use crate::audit_trail::{AuditTrail, Operation, found};

const PERMISSION_RESOURCE: &str = "rbac_permission";

/// Permissions of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionModuleGroup {
    /// Module name.
    pub module: String,
    /// Permissions of the module in listing order.
    pub permissions: Vec<Permission>,
}

/// Application service for the permission catalog.
#[derive(Clone)]
pub struct PermissionService {
    permissions: Arc<dyn PermissionRepository>,
    audit: AuditTrail,
}

impl PermissionService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        permissions: Arc<dyn PermissionRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            permissions,
            audit: AuditTrail::new(audit_repository),
        }
    }

    /// Lists permissions visible to the actor.
    pub async fn list(
        &self,
        actor: &Actor,
        filters: PermissionListFilters,
        page: PageRequest,
    ) -> AppResult<Page<Permission>> {
        let operation = Operation::new(
            "permission.list",
            AuditAction::CatalogRead,
            PERMISSION_RESOURCE,
            actor,
        );
        let result: AppResult<Page<Permission>> = async {
            let query = PermissionQuery::for_actor(actor, filters, page)?;
            self.permissions.list_permissions(&query).await
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Lists every visible permission matching the filters, grouped by module.
    pub async fn list_grouped(
        &self,
        actor: &Actor,
        filters: PermissionListFilters,
    ) -> AppResult<Vec<PermissionModuleGroup>> {
        let page = self.list(actor, filters, PageRequest::All).await?;

        let mut groups: Vec<PermissionModuleGroup> = Vec::new();
        for permission in page.items {
            match groups.iter_mut().find(|group| group.module == permission.module) {
                Some(group) => group.permissions.push(permission),
                None => groups.push(PermissionModuleGroup {
                    module: permission.module.clone(),
                    permissions: vec![permission],
                }),
            }
        }

        Ok(groups)
    }

    /// Lists distinct modules of live permissions visible to the actor.
    pub async fn list_modules(&self, actor: &Actor) -> AppResult<Vec<String>> {
        let operation = Operation::new(
            "permission.modules",
            AuditAction::CatalogRead,
            PERMISSION_RESOURCE,
            actor,
        );
        let result: AppResult<Vec<String>> = async {
            let scope = permission_scope(actor)?;
            self.permissions.list_modules(scope).await
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Returns one visible permission.
    pub async fn get(&self, actor: &Actor, permission_id: PermissionId) -> AppResult<Permission> {
        let operation = Operation::new(
            "permission.get",
            AuditAction::CatalogRead,
            PERMISSION_RESOURCE,
            actor,
        )
        .target(permission_id);
        let result = self
            .visible(actor, permission_id, TrashedFilter::Exclude)
            .await;

        self.audit.conclude(operation, result).await
    }

    /// Creates a permission after stripping ownership markers the actor may not choose.
    pub async fn create(&self, actor: &Actor, draft: PermissionDraft) -> AppResult<Permission> {
        let operation = Operation::new(
            "permission.create",
            AuditAction::PermissionCreated,
            PERMISSION_RESOURCE,
            actor,
        );
        let result: AppResult<Permission> = async {
            let new_permission = sanitize_permission_draft(actor, draft)?;
            let permission = self.permissions.create_permission(new_permission).await?;
            self.audit
                .succeeded(
                    &operation.clone().target(permission.id),
                    permission.tenant_id,
                    format!("created permission '{}'", permission.name),
                )
                .await?;

            Ok(permission)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Updates descriptive fields of a custom permission.
    pub async fn update(
        &self,
        actor: &Actor,
        permission_id: PermissionId,
        changes: PermissionChanges,
    ) -> AppResult<Permission> {
        let operation = Operation::new(
            "permission.update",
            AuditAction::PermissionUpdated,
            PERMISSION_RESOURCE,
            actor,
        )
        .target(permission_id);
        let result: AppResult<Permission> = async {
            let current = self
                .visible(actor, permission_id, TrashedFilter::Exclude)
                .await?;
            authorize_target(actor, &current, MutationAction::Update)?;

            let updated = self
                .permissions
                .update_permission(current.id, &changes.validate()?)
                .await?;
            self.audit
                .succeeded(
                    &operation,
                    updated.tenant_id,
                    format!("updated permission '{}'", updated.name),
                )
                .await?;

            Ok(updated)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Soft deletes a custom permission.
    pub async fn delete(
        &self,
        actor: &Actor,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        let operation = Operation::new(
            "permission.delete",
            AuditAction::PermissionDeleted,
            PERMISSION_RESOURCE,
            actor,
        )
        .target(permission_id);
        let result: AppResult<Permission> = async {
            let current = self
                .visible(actor, permission_id, TrashedFilter::Exclude)
                .await?;
            authorize_target(actor, &current, MutationAction::Delete)?;

            let deleted = self.permissions.soft_delete_permission(current.id).await?;
            self.audit
                .succeeded(
                    &operation,
                    deleted.tenant_id,
                    format!("deleted permission '{}'", deleted.name),
                )
                .await?;

            Ok(deleted)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    /// Marks a permission active.
    pub async fn activate(
        &self,
        actor: &Actor,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        self.change_status(actor, permission_id, MutationAction::Activate)
            .await
    }

    /// Marks a permission inactive.
    pub async fn deactivate(
        &self,
        actor: &Actor,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        self.change_status(actor, permission_id, MutationAction::Deactivate)
            .await
    }

    /// Clears the soft-delete marker of a permission.
    pub async fn restore(
        &self,
        actor: &Actor,
        permission_id: PermissionId,
    ) -> AppResult<Permission> {
        self.change_status(actor, permission_id, MutationAction::Restore)
            .await
    }

    async fn change_status(
        &self,
        actor: &Actor,
        permission_id: PermissionId,
        action: MutationAction,
    ) -> AppResult<Permission> {
        let (name, audit_action) = match action {
            MutationAction::Activate => ("permission.activate", AuditAction::PermissionActivated),
            MutationAction::Deactivate => {
                ("permission.deactivate", AuditAction::PermissionDeactivated)
            }
            _ => ("permission.restore", AuditAction::PermissionRestored),
        };
        let operation =
            Operation::new(name, audit_action, PERMISSION_RESOURCE, actor).target(permission_id);
        let result: AppResult<Permission> = async {
            let trashed = if action == MutationAction::Restore {
                TrashedFilter::Only
            } else {
                TrashedFilter::Exclude
            };
            let current = self.visible(actor, permission_id, trashed).await?;
            authorize_target(actor, &current, action)?;

            let permission = match action {
                MutationAction::Activate => {
                    self.permissions
                        .set_permission_active(current.id, true)
                        .await?
                }
                MutationAction::Deactivate => {
                    self.permissions
                        .set_permission_active(current.id, false)
                        .await?
                }
                _ => self.permissions.restore_permission(current.id).await?,
            };
            self.audit
                .succeeded(
                    &operation,
                    permission.tenant_id,
                    format!("{} permission '{}'", action.as_str(), permission.name),
                )
                .await?;

            Ok(permission)
        }
        .await;

        self.audit.conclude(operation, result).await
    }

    async fn visible(
        &self,
        actor: &Actor,
        permission_id: PermissionId,
        trashed: TrashedFilter,
    ) -> AppResult<Permission> {
        let scope = permission_scope(actor)?;
        let permission = found(
            self.permissions.find_permission(permission_id).await?,
            "permission",
            permission_id,
        )?;
        if !scope.admits(permission.ownership()) || !trashed.admits(permission.is_deleted()) {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' was not found"
            )));
        }

        Ok(permission)
    }
}
