//! Booth core utilities
//!
//! A best-effort local response cache and the role-based data visibility
//! resolver used by the Booth trade-show platform, plus the pieces the
//! `booth` command-line tool is built from.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod permissions;
