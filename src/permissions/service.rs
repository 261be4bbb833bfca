//! Permission service and caller-side visibility state
//!
//! `PermissionService` is the only way to change overrides, so the
//! owner/admin guard lives here and runs before any store call.
//! `DataVisibility` is what a screen holds while deciding what to render.

use std::sync::Arc;

use tracing::{error, info};

use super::error::PermissionError;
use super::resolver::{RolePermissions, UnknownFieldPolicy};
use super::roles::{DataCategory, Role};
use super::store::PermissionStore;

/// Reads and changes role visibility overrides through a store
#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Fetches every override for an organization
    ///
    /// An organization with no overrides yields an empty set. Storage errors
    /// are logged and returned; callers must not treat them as "visible".
    pub async fn fetch_role_permissions(
        &self,
        organization_id: &str,
    ) -> Result<RolePermissions, PermissionError> {
        match self.store.fetch_for_organization(organization_id).await {
            Ok(rows) => Ok(RolePermissions::new(organization_id, rows)),
            Err(e) => {
                error!(organization_id, "Failed to fetch role permissions: {}", e);
                Err(e)
            }
        }
    }

    /// Stores an override for a configurable role
    ///
    /// # Returns
    /// * `Err(PermissionError::ImmutableRole)` for owner or admin, without
    ///   touching the store
    pub async fn update_role_permissions(
        &self,
        organization_id: &str,
        role: Role,
        categories: &[DataCategory],
    ) -> Result<(), PermissionError> {
        ensure_configurable(role)?;

        let mut categories = categories.to_vec();
        categories.sort();
        categories.dedup();

        self.store
            .upsert(organization_id, role, &categories)
            .await
            .map_err(|e| {
                error!(organization_id, %role, "Failed to update role permissions: {}", e);
                e
            })?;
        info!(organization_id, %role, ?categories, "Role permissions updated");
        Ok(())
    }

    /// Removes an override so the role falls back to compiled defaults
    ///
    /// Owner and admin are rejected the same way as in
    /// [`update_role_permissions`](Self::update_role_permissions).
    pub async fn reset_role_permissions(
        &self,
        organization_id: &str,
        role: Role,
    ) -> Result<(), PermissionError> {
        ensure_configurable(role)?;

        self.store.delete(organization_id, role).await.map_err(|e| {
            error!(organization_id, %role, "Failed to reset role permissions: {}", e);
            e
        })?;
        info!(organization_id, %role, "Role permissions reset to defaults");
        Ok(())
    }
}

fn ensure_configurable(role: Role) -> Result<(), PermissionError> {
    if role.is_privileged() {
        return Err(PermissionError::ImmutableRole(role));
    }
    Ok(())
}

/// Load state of a caller's permission lookup
#[derive(Debug, Clone, PartialEq)]
pub enum VisibilityState {
    /// The fetch has not completed
    Loading,
    /// Overrides are known
    Ready(RolePermissions),
    /// The fetch failed with the given message
    Failed(String),
}

/// What one user, acting in one role, may see in one organization
///
/// Only a completed fetch can grant visibility. While loading, or after a
/// failed fetch, every category and field is hidden.
#[derive(Debug, Clone, PartialEq)]
pub struct DataVisibility {
    role: Role,
    policy: UnknownFieldPolicy,
    state: VisibilityState,
}

impl DataVisibility {
    /// Starts in the loading state
    pub fn loading(role: Role) -> Self {
        Self {
            role,
            policy: UnknownFieldPolicy::default(),
            state: VisibilityState::Loading,
        }
    }

    /// Fetches overrides for the organization and settles into `Ready` or
    /// `Failed`
    pub async fn load(service: &PermissionService, organization_id: &str, role: Role) -> Self {
        let mut visibility = Self::loading(role);
        visibility.resolve(service.fetch_role_permissions(organization_id).await);
        visibility
    }

    /// Sets the policy for fields with no known category
    pub fn with_policy(mut self, policy: UnknownFieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Records the outcome of a fetch
    pub fn resolve(&mut self, result: Result<RolePermissions, PermissionError>) {
        self.state = match result {
            Ok(permissions) => VisibilityState::Ready(permissions),
            Err(e) => VisibilityState::Failed(e.to_string()),
        };
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> &VisibilityState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, VisibilityState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            VisibilityState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn can_see_category(&self, category: DataCategory) -> bool {
        match &self.state {
            VisibilityState::Ready(permissions) => permissions.can_see_category(self.role, category),
            VisibilityState::Loading | VisibilityState::Failed(_) => false,
        }
    }

    pub fn can_see_field(&self, field: &str) -> bool {
        match &self.state {
            VisibilityState::Ready(permissions) => {
                permissions.can_see_field(self.role, field, self.policy)
            }
            VisibilityState::Loading | VisibilityState::Failed(_) => false,
        }
    }
}
