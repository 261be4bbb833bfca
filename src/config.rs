//! Runtime configuration read from the environment

use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;
use thiserror::Error;
use tracing::{info, warn};

use crate::permissions::UnknownFieldPolicy;

/// Directory for local data files
pub const DATA_DIR_VAR: &str = "BOOTH_DATA_DIR";
/// Supabase project URL; enables the hosted permission store when set
pub const SUPABASE_URL_VAR: &str = "BOOTH_SUPABASE_URL";
/// Supabase API key, required together with the URL
pub const SUPABASE_KEY_VAR: &str = "BOOTH_SUPABASE_KEY";
/// `visible` or `hidden`, for fields with no known category
pub const UNKNOWN_FIELDS_VAR: &str = "BOOTH_UNKNOWN_FIELDS";

const CACHE_FILE_NAME: &str = "cache.json";
const PERMISSIONS_FILE_NAME: &str = "permissions.json";

/// Errors in the runtime configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No data directory was configured and none could be derived
    #[error("Could not determine a data directory; set BOOTH_DATA_DIR")]
    NoDataDir,

    /// Only one of the Supabase settings was provided
    #[error("BOOTH_SUPABASE_URL and BOOTH_SUPABASE_KEY must be set together")]
    IncompleteSupabase,

    /// A variable held a value that could not be understood
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Connection details for the hosted permission table
#[derive(Debug, Clone, PartialEq)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
}

/// Settings for the `booth` binary
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where the cache and permission files live
    pub data_dir: PathBuf,
    /// Hosted permission backend, if configured
    pub supabase: Option<SupabaseConfig>,
    /// How unmapped fields are treated
    pub unknown_fields: UnknownFieldPolicy,
}

impl Config {
    /// Loads configuration from process environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = match var(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let dir = ProjectDirs::from("", "", "booth")
                    .map(|dirs| dirs.data_dir().to_path_buf())
                    .ok_or(ConfigError::NoDataDir)?;
                info!("{DATA_DIR_VAR} not set, using default: {}", dir.display());
                dir
            }
        };

        let supabase = match (var(SUPABASE_URL_VAR), var(SUPABASE_KEY_VAR)) {
            (Some(url), Some(api_key)) => Some(SupabaseConfig { url, api_key }),
            (None, None) => None,
            _ => {
                warn!("Supabase is only partially configured");
                return Err(ConfigError::IncompleteSupabase);
            }
        };

        let unknown_fields = match var(UNKNOWN_FIELDS_VAR) {
            Some(value) => UnknownFieldPolicy::from_str(&value).ok_or(ConfigError::InvalidValue {
                key: UNKNOWN_FIELDS_VAR,
                value,
            })?,
            None => UnknownFieldPolicy::default(),
        };

        Ok(Self {
            data_dir,
            supabase,
            unknown_fields,
        })
    }

    /// File backing the response cache
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE_NAME)
    }

    /// File backing local permission overrides
    pub fn permissions_path(&self) -> PathBuf {
        self.data_dir.join(PERMISSIONS_FILE_NAME)
    }
}
