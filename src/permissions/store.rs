//! Storage backends for role permission overrides
//!
//! A backend only needs three operations keyed by `(organization_id, role)`:
//! fetch every row for an organization, upsert one row, delete one row.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use super::error::PermissionError;
use super::resolver::RoleDataPermission;
use super::roles::{DataCategory, Role};

/// Contract for persisting role permission overrides
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Returns every override row for the organization. No rows is not an error.
    async fn fetch_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<RoleDataPermission>, PermissionError>;

    /// Creates or replaces the override for `(organization_id, role)`
    async fn upsert(
        &self,
        organization_id: &str,
        role: Role,
        categories: &[DataCategory],
    ) -> Result<RoleDataPermission, PermissionError>;

    /// Deletes the override for `(organization_id, role)`, if any
    async fn delete(&self, organization_id: &str, role: Role) -> Result<(), PermissionError>;
}

type RowKey = (String, Role);

/// Applies an upsert to a keyed row set, keeping the original `created_at`
fn upsert_row(
    rows: &mut BTreeMap<RowKey, RoleDataPermission>,
    organization_id: &str,
    role: Role,
    categories: &[DataCategory],
) -> RoleDataPermission {
    let now = Utc::now();
    let key = (organization_id.to_string(), role);
    let created_at = rows
        .get(&key)
        .and_then(|existing| existing.created_at)
        .unwrap_or(now);

    let row = RoleDataPermission {
        organization_id: organization_id.to_string(),
        role,
        visible_categories: categories.to_vec(),
        created_at: Some(created_at),
        updated_at: Some(now),
    };
    rows.insert(key, row.clone());
    row
}

fn rows_for(
    rows: &BTreeMap<RowKey, RoleDataPermission>,
    organization_id: &str,
) -> Vec<RoleDataPermission> {
    rows.values()
        .filter(|row| row.organization_id == organization_id)
        .cloned()
        .collect()
}

/// In-memory permission store
#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    rows: RwLock<BTreeMap<RowKey, RoleDataPermission>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn fetch_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<RoleDataPermission>, PermissionError> {
        Ok(rows_for(&*self.rows.read().await, organization_id))
    }

    async fn upsert(
        &self,
        organization_id: &str,
        role: Role,
        categories: &[DataCategory],
    ) -> Result<RoleDataPermission, PermissionError> {
        let mut rows = self.rows.write().await;
        Ok(upsert_row(&mut rows, organization_id, role, categories))
    }

    async fn delete(&self, organization_id: &str, role: Role) -> Result<(), PermissionError> {
        self.rows
            .write()
            .await
            .remove(&(organization_id.to_string(), role));
        Ok(())
    }
}

/// Permission store kept as a JSON array of rows on disk
///
/// Unlike the response cache, a corrupt file is an error here: guessing at
/// permissions would risk showing data that should be hidden.
#[derive(Debug)]
pub struct FilePermissionStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FilePermissionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<RowKey, RoleDataPermission>, PermissionError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let rows: Vec<RoleDataPermission> = serde_json::from_str(&content).map_err(|e| {
            warn!(path = %self.path.display(), "Permission file is unreadable: {}", e);
            e
        })?;

        Ok(rows
            .into_iter()
            .map(|row| ((row.organization_id.clone(), row.role), row))
            .collect())
    }

    async fn save(
        &self,
        rows: &BTreeMap<RowKey, RoleDataPermission>,
    ) -> Result<(), PermissionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let list: Vec<&RoleDataPermission> = rows.values().collect();
        let json = serde_json::to_string_pretty(&list)?;

        // Readers only ever see a complete file
        let staging = self.staging_path();
        fs::write(&staging, json).await?;
        if let Err(e) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Temporary file in the same directory as the target
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PermissionStore for FilePermissionStore {
    async fn fetch_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<RoleDataPermission>, PermissionError> {
        let _guard = self.guard.lock().await;
        Ok(rows_for(&self.load().await?, organization_id))
    }

    async fn upsert(
        &self,
        organization_id: &str,
        role: Role,
        categories: &[DataCategory],
    ) -> Result<RoleDataPermission, PermissionError> {
        let _guard = self.guard.lock().await;
        let mut rows = self.load().await?;
        let row = upsert_row(&mut rows, organization_id, role, categories);
        self.save(&rows).await?;
        Ok(row)
    }

    async fn delete(&self, organization_id: &str, role: Role) -> Result<(), PermissionError> {
        let _guard = self.guard.lock().await;
        let mut rows = self.load().await?;
        if rows.remove(&(organization_id.to_string(), role)).is_some() {
            self.save(&rows).await?;
        }
        Ok(())
    }
}
