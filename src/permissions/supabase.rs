//! Supabase (PostgREST) permission backend
//!
//! Talks to the `role_data_permissions` table over the REST interface.
//! Rows are keyed by `(organization_id, role)`; upserts rely on the
//! table's unique constraint over those two columns.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::error::PermissionError;
use super::resolver::RoleDataPermission;
use super::roles::{DataCategory, Role};
use super::store::PermissionStore;

/// Table holding per-organization role overrides
const PERMISSIONS_TABLE: &str = "role_data_permissions";

/// Body sent when creating or replacing an override
#[derive(Debug, Serialize)]
struct UpsertRow<'a> {
    organization_id: &'a str,
    role: Role,
    visible_categories: &'a [DataCategory],
    updated_at: chrono::DateTime<Utc>,
}

/// Client for the hosted permission table
#[derive(Debug, Clone)]
pub struct SupabasePermissionStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabasePermissionStore {
    /// Creates a store for the project at `base_url` (e.g.
    /// `https://xyz.supabase.co`) authenticated with `api_key`
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    /// Creates a store with a custom HTTP client
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, PERMISSIONS_TABLE)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn fetch_request(&self, organization_id: &str) -> RequestBuilder {
        self.authorized(self.client.get(self.table_url()))
            .query(&[
                ("select", "*".to_string()),
                ("organization_id", format!("eq.{}", organization_id)),
            ])
    }

    fn upsert_request(
        &self,
        organization_id: &str,
        role: Role,
        categories: &[DataCategory],
    ) -> RequestBuilder {
        let body = [UpsertRow {
            organization_id,
            role,
            visible_categories: categories,
            updated_at: Utc::now(),
        }];
        self.authorized(self.client.post(self.table_url()))
            .query(&[("on_conflict", "organization_id,role")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
    }

    fn delete_request(&self, organization_id: &str, role: Role) -> RequestBuilder {
        self.authorized(self.client.delete(self.table_url())).query(&[
            ("organization_id", format!("eq.{}", organization_id)),
            ("role", format!("eq.{}", role)),
        ])
    }

    /// Reads the status and body of a response in one go
    async fn read(response: Response) -> Result<(StatusCode, String), PermissionError> {
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Returns the body of a success response, or a `Status` error carrying it
fn check_status(status: StatusCode, body: String) -> Result<String, PermissionError> {
    if status.is_success() {
        return Ok(body);
    }
    Err(PermissionError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Parses a PostgREST row array
fn parse_rows(
    status: StatusCode,
    body: String,
) -> Result<Vec<RoleDataPermission>, PermissionError> {
    let body = check_status(status, body)?;
    Ok(serde_json::from_str(&body)?)
}

/// Picks the row an upsert returned with `return=representation`
fn upserted_row(
    status: StatusCode,
    body: String,
    organization_id: &str,
    role: Role,
) -> Result<RoleDataPermission, PermissionError> {
    parse_rows(status, body)?
        .into_iter()
        .next()
        .ok_or_else(|| PermissionError::MissingRow {
            organization_id: organization_id.to_string(),
            role,
        })
}

#[async_trait]
impl PermissionStore for SupabasePermissionStore {
    async fn fetch_for_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<RoleDataPermission>, PermissionError> {
        let response = self.fetch_request(organization_id).send().await?;
        let (status, body) = Self::read(response).await?;
        let rows = parse_rows(status, body)?;
        debug!(organization_id, count = rows.len(), "Fetched role permissions");
        Ok(rows)
    }

    async fn upsert(
        &self,
        organization_id: &str,
        role: Role,
        categories: &[DataCategory],
    ) -> Result<RoleDataPermission, PermissionError> {
        let request = self.upsert_request(organization_id, role, categories);
        let (status, body) = Self::read(request.send().await?).await?;
        upserted_row(status, body, organization_id, role)
    }

    async fn delete(&self, organization_id: &str, role: Role) -> Result<(), PermissionError> {
        let response = self.delete_request(organization_id, role).send().await?;
        let (status, body) = Self::read(response).await?;
        check_status(status, body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SupabasePermissionStore {
        SupabasePermissionStore::new("https://project.supabase.co/", "anon-key")
    }

    #[test]
    fn test_fetch_request_filters_by_organization() {
        let request = store().fetch_request("org-42").build().unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/rest/v1/role_data_permissions");
        let query = request.url().query().unwrap_or_default();
        assert!(query.contains("organization_id=eq.org-42"), "{query}");
        assert!(query.contains("select=*") || query.contains("select=%2A"), "{query}");
    }

    #[test]
    fn test_requests_carry_api_key_headers() {
        let request = store().fetch_request("org-1").build().unwrap();

        assert_eq!(request.headers()["apikey"], "anon-key");
        assert_eq!(request.headers()["authorization"], "Bearer anon-key");
    }

    #[test]
    fn test_upsert_request_merges_on_conflict() {
        let request = store()
            .upsert_request("org-1", Role::Viewer, &[DataCategory::Budget])
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        let query = request.url().query().unwrap_or_default();
        assert!(query.starts_with("on_conflict=organization_id"), "{query}");
        assert_eq!(
            request.headers()["prefer"],
            "resolution=merge-duplicates,return=representation"
        );

        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json[0]["organization_id"], "org-1");
        assert_eq!(json[0]["role"], "viewer");
        assert_eq!(json[0]["visible_categories"][0], "budget");
    }

    #[test]
    fn test_delete_request_targets_single_row() {
        let request = store().delete_request("org-1", Role::Editor).build().unwrap();

        assert_eq!(request.method(), reqwest::Method::DELETE);
        let query = request.url().query().unwrap_or_default();
        assert!(query.contains("organization_id=eq.org-1"), "{query}");
        assert!(query.contains("role=eq.editor"), "{query}");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        assert_eq!(
            store().table_url(),
            "https://project.supabase.co/rest/v1/role_data_permissions"
        );
    }

    #[test]
    fn test_error_status_keeps_body() {
        let body = r#"{"message":"JWT expired"}"#.to_string();
        let result = parse_rows(StatusCode::UNAUTHORIZED, body);

        match result {
            Err(PermissionError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("JWT expired"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_error_status() {
        let result = check_status(StatusCode::FORBIDDEN, "denied".to_string());
        assert!(matches!(result, Err(PermissionError::Status { status: 403, .. })));
    }

    #[test]
    fn test_empty_upsert_representation_is_missing_row() {
        let result = upserted_row(StatusCode::CREATED, "[]".to_string(), "org-1", Role::Viewer);
        assert!(matches!(
            result,
            Err(PermissionError::MissingRow { role: Role::Viewer, .. })
        ));
    }

    #[test]
    fn test_parses_postgrest_rows() {
        let body = r#"[{
            "id": "0d6c1f7e-5b1a-4c1e-9f55-2a7e0c1d9b10",
            "organization_id": "org-1",
            "role": "editor",
            "visible_categories": ["budget", "vendors"],
            "created_at": "2026-03-01T12:30:45.123456+00:00",
            "updated_at": "2026-03-02T08:00:00.5+00:00"
        }]"#
        .to_string();

        let row = upserted_row(StatusCode::CREATED, body, "org-1", Role::Editor).unwrap();

        assert_eq!(row.role, Role::Editor);
        assert_eq!(
            row.visible_categories,
            vec![DataCategory::Budget, DataCategory::Vendors]
        );
        let created = row.created_at.unwrap();
        assert_eq!(created.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn test_empty_fetch_is_not_an_error() {
        let rows = parse_rows(StatusCode::OK, "[]".to_string()).unwrap();
        assert!(rows.is_empty());
    }
}
