//! asset-sync: Cloud Asset Inventory to BigQuery
//!
//! Each run lists the assets of a project, folder or organization, rebuilds
//! a flat list table from them, and brings one typed detail table per
//! supported resource type in line with that list.
//!
//! # Module Structure
//!
//! - [`asset`] - Cloud Asset records and paged listing
//! - [`config`] - Validated run configuration
//! - [`error`] - Run-level and row-level error types, exit codes
//! - [`gcp`] - Authentication, HTTP and REST URL construction
//! - [`inventory`] - List table refresh
//! - [`poll`] - Bounded readiness polling
//! - [`reconcile`] - Detail table reconciliation
//! - [`resource`] - Resource kinds with detail tables
//! - [`schema`] - Schema inference from record descriptions
//! - [`store`] - Tabular store trait, BigQuery implementation and SQL
//! - [`sync`] - The end-to-end run

pub mod asset;
pub mod config;
pub mod error;
pub mod gcp;
pub mod inventory;
pub mod poll;
pub mod reconcile;
pub mod resource;
pub mod schema;
pub mod store;
pub mod sync;

/// Version injected at compile time via ASSET_SYNC_VERSION (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("ASSET_SYNC_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
