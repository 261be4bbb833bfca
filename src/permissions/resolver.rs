//! Pure visibility resolution over a set of organization overrides
//!
//! Nothing here touches storage. Given the override rows for one
//! organization, these functions decide what each role may see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use super::roles::{category_for_field, default_categories, DataCategory, Role};

/// A stored visibility override for one role in one organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDataPermission {
    /// Owning tenant
    pub organization_id: String,
    /// The configurable role this row applies to
    pub role: Role,
    /// Categories the role may view. Tags this build does not know are
    /// dropped on read.
    #[serde(deserialize_with = "known_categories")]
    pub visible_categories: Vec<DataCategory>,
    /// When the override was first created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the override was last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reads a tag array, skipping tags that name no known category
fn known_categories<'de, D>(deserializer: D) -> Result<Vec<DataCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Vec::<String>::deserialize(deserializer)?;
    Ok(tags
        .iter()
        .filter_map(|tag| {
            let category = DataCategory::from_str(tag);
            if category.is_none() {
                warn!(tag = %tag, "Ignoring unknown data category");
            }
            category
        })
        .collect())
}

/// What to do with a field that has no known category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
    /// Show unmapped fields
    #[default]
    Visible,
    /// Hide unmapped fields
    Hidden,
}

impl UnknownFieldPolicy {
    /// Parses `visible` or `hidden`, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "visible" | "show" => Some(Self::Visible),
            "hidden" | "hide" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// Finds the override row for `role`, if one exists
fn override_for(permissions: &[RoleDataPermission], role: Role) -> Option<&RoleDataPermission> {
    permissions.iter().find(|p| p.role == role)
}

/// Decides whether `role` may see `category`
///
/// Owner and admin always can. Other roles use the organization's override
/// when one is present and the compiled default otherwise.
pub fn is_category_visible(
    permissions: &[RoleDataPermission],
    role: Role,
    category: DataCategory,
) -> bool {
    if role.is_privileged() {
        return true;
    }

    match override_for(permissions, role) {
        Some(row) => row.visible_categories.contains(&category),
        None => default_categories(role).contains(&category),
    }
}

/// The effective category set for `role`, in canonical order
pub fn visible_categories(permissions: &[RoleDataPermission], role: Role) -> Vec<DataCategory> {
    DataCategory::all()
        .iter()
        .copied()
        .filter(|category| is_category_visible(permissions, role, *category))
        .collect()
}

/// Decides whether `role` may see a named field
///
/// The field is resolved to its owning category. Fields with no mapping
/// follow `policy`.
pub fn is_field_visible(
    permissions: &[RoleDataPermission],
    role: Role,
    field: &str,
    policy: UnknownFieldPolicy,
) -> bool {
    match category_for_field(field) {
        Some(category) => is_category_visible(permissions, role, category),
        None => policy == UnknownFieldPolicy::Visible,
    }
}

/// All overrides for one organization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolePermissions {
    organization_id: String,
    rows: Vec<RoleDataPermission>,
}

impl RolePermissions {
    /// Wraps the rows fetched for `organization_id`
    ///
    /// Rows belonging to other organizations and overrides for privileged
    /// roles are dropped.
    pub fn new(organization_id: impl Into<String>, rows: Vec<RoleDataPermission>) -> Self {
        let organization_id = organization_id.into();
        let rows = rows
            .into_iter()
            .filter(|row| row.organization_id == organization_id && !row.role.is_privileged())
            .collect();
        Self {
            organization_id,
            rows,
        }
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// The stored override rows
    pub fn rows(&self) -> &[RoleDataPermission] {
        &self.rows
    }

    /// Whether `role` currently has an organization override
    pub fn is_overridden(&self, role: Role) -> bool {
        override_for(&self.rows, role).is_some()
    }

    pub fn can_see_category(&self, role: Role, category: DataCategory) -> bool {
        is_category_visible(&self.rows, role, category)
    }

    pub fn can_see_field(&self, role: Role, field: &str, policy: UnknownFieldPolicy) -> bool {
        is_field_visible(&self.rows, role, field, policy)
    }

    pub fn visible_categories(&self, role: Role) -> Vec<DataCategory> {
        visible_categories(&self.rows, role)
    }
}
