//! Command-line interface parsing for the booth tool
//!
//! This module handles parsing of CLI arguments using clap. Roles and data
//! categories are validated while parsing so bad names never reach the
//! cache or permission layers.

use clap::{ArgGroup, Parser, Subcommand};
use thiserror::Error;

use crate::permissions::{DataCategory, Role};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified role name is not recognized
    #[error("Invalid role: '{0}'. Valid roles: owner, admin, editor, viewer")]
    InvalidRole(String),

    /// The specified category name is not recognized
    #[error(
        "Invalid category: '{0}'. Valid categories: budget, leads, logistics, vendors, contacts, documents, analytics"
    )]
    InvalidCategory(String),
}

/// Booth - response cache and role data visibility tools
#[derive(Parser, Debug)]
#[command(name = "booth")]
#[command(about = "Manage the Booth response cache and role data visibility")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect and manage the local response cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Inspect and manage which data categories each role can see
    #[command(subcommand)]
    Perms(PermsCommand),
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print a fresh cached value
    Get { key: String },

    /// Cache a JSON value
    ///
    /// Examples:
    ///   booth cache set shows '[{"id": 1, "name": "CES"}]'
    Set { key: String, value: String },

    /// Remove one cached value
    Clear { key: String },

    /// Remove every cached value
    ClearAll,
}

#[derive(Subcommand, Debug)]
pub enum PermsCommand {
    /// Show the effective visibility of every role
    Show {
        #[arg(long)]
        org: String,
    },

    /// Override the categories an editor or viewer can see
    ///
    /// Examples:
    ///   booth perms set --org acme --role viewer budget logistics
    ///   booth perms set --org acme --role viewer      # hide everything
    Set {
        #[arg(long)]
        org: String,
        #[arg(long, value_parser = parse_role_arg)]
        role: Role,
        #[arg(value_parser = parse_category_arg)]
        categories: Vec<DataCategory>,
    },

    /// Drop an override so the role uses its defaults again
    Reset {
        #[arg(long)]
        org: String,
        #[arg(long, value_parser = parse_role_arg)]
        role: Role,
    },

    /// Check whether a role can see a category or a field
    #[command(group(ArgGroup::new("target").required(true).args(["category", "field"])))]
    Check {
        #[arg(long)]
        org: String,
        #[arg(long, value_parser = parse_role_arg)]
        role: Role,
        #[arg(long, value_parser = parse_category_arg)]
        category: Option<DataCategory>,
        #[arg(long)]
        field: Option<String>,
    },
}

/// Parses a role string argument into a Role.
///
/// # Returns
/// * `Ok(Role)` if the string names a role
/// * `Err(CliError::InvalidRole)` otherwise
pub fn parse_role_arg(s: &str) -> Result<Role, CliError> {
    Role::from_str(s).ok_or_else(|| CliError::InvalidRole(s.to_string()))
}

/// Parses a category string argument into a DataCategory.
pub fn parse_category_arg(s: &str) -> Result<DataCategory, CliError> {
    DataCategory::from_str(s).ok_or_else(|| CliError::InvalidCategory(s.to_string()))
}
