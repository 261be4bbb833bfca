//! Organization roles, data categories and their compiled-in defaults

use std::fmt;

use serde::{Deserialize, Serialize};

/// An organization-scoped permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Editor,
    Viewer,
}

impl Role {
    /// Returns a slice containing all roles, most privileged first.
    pub fn all() -> &'static [Role] {
        &[Role::Owner, Role::Admin, Role::Editor, Role::Viewer]
    }

    /// Owner and admin always see everything and cannot be reconfigured.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Lowercase name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// Parses a role name, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "editor" => Some(Role::Editor),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named group of related fields, the unit of visibility control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    /// Costs, estimates and spend
    Budget,
    /// Leads captured at shows
    Leads,
    /// Shipping, freight and booth setup
    Logistics,
    /// Vendor and supplier records
    Vendors,
    /// Personal contact details
    Contacts,
    /// Uploaded files and attachments
    Documents,
    /// ROI and performance metrics
    Analytics,
}

impl DataCategory {
    /// Returns a slice containing every category.
    pub fn all() -> &'static [DataCategory] {
        &[
            DataCategory::Budget,
            DataCategory::Leads,
            DataCategory::Logistics,
            DataCategory::Vendors,
            DataCategory::Contacts,
            DataCategory::Documents,
            DataCategory::Analytics,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Budget => "budget",
            DataCategory::Leads => "leads",
            DataCategory::Logistics => "logistics",
            DataCategory::Vendors => "vendors",
            DataCategory::Contacts => "contacts",
            DataCategory::Documents => "documents",
            DataCategory::Analytics => "analytics",
        }
    }

    /// Parses a category tag, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<DataCategory> {
        let wanted = s.trim().to_lowercase();
        Self::all().iter().copied().find(|c| c.as_str() == wanted)
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories an editor sees when the organization has no override
const EDITOR_DEFAULTS: &[DataCategory] = &[
    DataCategory::Budget,
    DataCategory::Leads,
    DataCategory::Logistics,
    DataCategory::Vendors,
    DataCategory::Contacts,
    DataCategory::Documents,
];

/// Categories a viewer sees when the organization has no override
const VIEWER_DEFAULTS: &[DataCategory] = &[DataCategory::Logistics, DataCategory::Documents];

/// Compiled-in visibility for a role. Privileged roles get every category.
pub fn default_categories(role: Role) -> &'static [DataCategory] {
    match role {
        Role::Owner | Role::Admin => DataCategory::all(),
        Role::Editor => EDITOR_DEFAULTS,
        Role::Viewer => VIEWER_DEFAULTS,
    }
}

/// Field names and the category that owns them
///
/// Field names match the column names used across shows, budget items,
/// shipments, leads and attachments.
pub static FIELD_CATEGORIES: &[(&str, DataCategory)] = &[
    ("budget", DataCategory::Budget),
    ("estimated_cost", DataCategory::Budget),
    ("actual_cost", DataCategory::Budget),
    ("booth_cost", DataCategory::Budget),
    ("shipping_cost", DataCategory::Budget),
    ("travel_cost", DataCategory::Budget),
    ("total_spend", DataCategory::Budget),
    ("leads", DataCategory::Leads),
    ("lead_count", DataCategory::Leads),
    ("leads_collected", DataCategory::Leads),
    ("lead_score", DataCategory::Leads),
    ("tracking_number", DataCategory::Logistics),
    ("carrier", DataCategory::Logistics),
    ("ship_date", DataCategory::Logistics),
    ("delivery_date", DataCategory::Logistics),
    ("booth_number", DataCategory::Logistics),
    ("vendor_name", DataCategory::Vendors),
    ("vendor_contact", DataCategory::Vendors),
    ("contract_terms", DataCategory::Vendors),
    ("contact_name", DataCategory::Contacts),
    ("contact_email", DataCategory::Contacts),
    ("contact_phone", DataCategory::Contacts),
    ("attachment_url", DataCategory::Documents),
    ("contract_file", DataCategory::Documents),
    ("roi", DataCategory::Analytics),
    ("cost_per_lead", DataCategory::Analytics),
    ("conversion_rate", DataCategory::Analytics),
];

/// Looks up the category that owns a field
///
/// # Returns
///
/// Returns `Some(DataCategory)` if the field is mapped, `None` otherwise
pub fn category_for_field(field: &str) -> Option<DataCategory> {
    FIELD_CATEGORIES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, category)| *category)
}
