//! Role-based data visibility
//!
//! Maps an organization role to the data categories it may see. Owner and
//! admin see everything. Editor and viewer start from compiled-in defaults
//! and may carry a per-organization override. Unlike the response cache,
//! storage failures here are surfaced to the caller, never papered over.

mod error;
mod resolver;
mod roles;
mod service;
mod store;
mod supabase;

pub use error::PermissionError;
pub use resolver::{
    is_category_visible, is_field_visible, visible_categories, RoleDataPermission,
    RolePermissions, UnknownFieldPolicy,
};
pub use roles::{category_for_field, default_categories, DataCategory, Role, FIELD_CATEGORIES};
pub use service::{DataVisibility, PermissionService, VisibilityState};
pub use store::{FilePermissionStore, MemoryPermissionStore, PermissionStore};
pub use supabase::SupabasePermissionStore;
