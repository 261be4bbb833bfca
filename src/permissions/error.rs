use thiserror::Error;

use super::Role;

/// Errors that can occur when reading or changing role permissions
#[derive(Debug, Error)]
pub enum PermissionError {
    /// Owner and admin visibility is fixed
    #[error("Permissions for the {0} role cannot be changed")]
    ImmutableRole(Role),

    /// HTTP request to the permission backend failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Permission backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Reading or writing the local permission file failed
    #[error("Permission storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored rows could not be parsed or encoded
    #[error("Failed to parse permission data: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend accepted a write but returned nothing to confirm it
    #[error("Permission backend returned no row for {organization_id}/{role}")]
    MissingRow { organization_id: String, role: Role },

    /// The store is in an unusable state
    #[error("Permission storage unavailable: {0}")]
    Unavailable(String),
}

impl PermissionError {
    /// Whether this is an authorization refusal rather than a storage failure
    pub fn is_authorization(&self) -> bool {
        matches!(self, PermissionError::ImmutableRole(_))
    }
}
