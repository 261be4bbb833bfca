//! Executes parsed CLI commands against the configured stores

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::cache::{FileStore, ResponseCache};
use crate::cli::{CacheCommand, Command, PermsCommand};
use crate::config::Config;
use crate::permissions::{
    DataCategory, DataVisibility, FilePermissionStore, PermissionError, PermissionService,
    PermissionStore, Role, RolePermissions, SupabasePermissionStore,
};

/// Errors that stop a command
#[derive(Debug, Error)]
pub enum CommandError {
    /// The value given to `cache set` is not JSON
    #[error("Value is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

/// Picks the permission backend: Supabase when configured, else a local file
pub fn permission_store(config: &Config) -> Arc<dyn PermissionStore> {
    match &config.supabase {
        Some(supabase) => {
            debug!(url = %supabase.url, "Using Supabase permission store");
            Arc::new(SupabasePermissionStore::new(
                supabase.url.clone(),
                supabase.api_key.clone(),
            ))
        }
        None => {
            let path = config.permissions_path();
            debug!(path = %path.display(), "Using local permission store");
            Arc::new(FilePermissionStore::new(path))
        }
    }
}

/// Runs one command and returns the text to print
pub async fn run(command: Command, config: &Config) -> Result<String, CommandError> {
    match command {
        Command::Cache(command) => {
            let cache = ResponseCache::new(FileStore::with_path(config.cache_path()));
            run_cache(command, &cache)
        }
        Command::Perms(command) => {
            let service = PermissionService::new(permission_store(config));
            run_perms(command, &service, config).await
        }
    }
}

fn run_cache(command: CacheCommand, cache: &ResponseCache<FileStore>) -> Result<String, CommandError> {
    match command {
        CacheCommand::Get { key } => match cache.get_cached::<serde_json::Value>(&key) {
            Some(value) => Ok(serde_json::to_string_pretty(&value)?),
            None => Ok(format!("{key}: not cached")),
        },
        CacheCommand::Set { key, value } => {
            let value: serde_json::Value = serde_json::from_str(&value)?;
            cache.set_cache(&key, &value);
            Ok(format!("{key}: cached ({} entries)", cache.len()))
        }
        CacheCommand::Clear { key } => {
            cache.clear_cache(&key);
            Ok(format!("{key}: cleared"))
        }
        CacheCommand::ClearAll => {
            cache.clear_all_cache();
            Ok("cache cleared".to_string())
        }
    }
}

async fn run_perms(
    command: PermsCommand,
    service: &PermissionService,
    config: &Config,
) -> Result<String, CommandError> {
    match command {
        PermsCommand::Show { org } => {
            let permissions = service.fetch_role_permissions(&org).await?;
            Ok(render_permissions(&permissions))
        }
        PermsCommand::Set {
            org,
            role,
            categories,
        } => {
            service.update_role_permissions(&org, role, &categories).await?;
            Ok(format!("{org}/{role}: override saved"))
        }
        PermsCommand::Reset { org, role } => {
            service.reset_role_permissions(&org, role).await?;
            Ok(format!("{org}/{role}: reset to defaults"))
        }
        PermsCommand::Check {
            org,
            role,
            category,
            field,
        } => {
            let visibility = DataVisibility::load(service, &org, role)
                .await
                .with_policy(config.unknown_fields);
            if let Some(message) = visibility.error() {
                return Err(PermissionError::Unavailable(message.to_string()).into());
            }

            // clap guarantees exactly one of --category / --field
            let (target, visible) = match category {
                Some(category) => (category.to_string(), visibility.can_see_category(category)),
                None => {
                    let field = field.unwrap_or_default();
                    let visible = visibility.can_see_field(&field);
                    (field, visible)
                }
            };
            Ok(format!(
                "{role} {target}: {}",
                if visible { "visible" } else { "hidden" }
            ))
        }
    }
}

/// One line per role: name, effective categories, and where they come from
fn render_permissions(permissions: &RolePermissions) -> String {
    Role::all()
        .iter()
        .map(|role| {
            let source = if role.is_privileged() {
                "fixed"
            } else if permissions.is_overridden(*role) {
                "override"
            } else {
                "default"
            };
            let categories: Vec<&str> = permissions
                .visible_categories(*role)
                .iter()
                .map(DataCategory::as_str)
                .collect();
            let listed = if categories.is_empty() {
                "(none)".to_string()
            } else {
                categories.join(", ")
            };
            format!("{:<7} {:<9} {}", role.as_str(), source, listed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
