//! Tabular store abstraction
//!
//! The reconciler and the inventory refresh only talk to [`TableStore`].
//! [`BigQueryStore`] implements it over the BigQuery v2 REST API; tests use
//! an in-memory implementation.
//!
//! # Module Structure
//!
//! - [`bigquery`] - BigQuery REST implementation
//! - [`sql`] - SQL text for the distinct-types, compare and delete queries

pub mod bigquery;
pub mod sql;

pub use bigquery::BigQueryStore;

use crate::gcp::ApiError;
use crate::schema::ColumnDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

/// Column of every detail table holding the resource identifier
pub const SELF_LINK_COLUMN: &str = "selfLink";

/// Synthetic column appended to every detail table
pub const UPDATED_TIMESTAMP_COLUMN: &str = "updatedTimestamp";

/// Replace `.` and `/` with `_`
///
/// `compute.googleapis.com/Address` becomes `compute_googleapis_com_Address`.
pub fn normalize_identifier(value: &str) -> String {
    value.replace(['.', '/'], "_")
}

/// Key both sides of the compare are joined on
///
/// Asset names (`//compute.googleapis.com/projects/...`) and self-links
/// (`https://www.googleapis.com/compute/v1/projects/...`) only agree from
/// `projects/` onward, and that tail is normalized with
/// [`normalize_identifier`].
pub fn join_key(identifier: &str) -> String {
    let tail = identifier
        .find("projects/")
        .map(|idx| &identifier[idx..])
        .unwrap_or(identifier);
    normalize_identifier(tail)
}

/// A BigQuery dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetRef {
    pub project: String,
    pub dataset: String,
}

impl DatasetRef {
    pub fn new(project: &str, dataset: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
        }
    }

    pub fn table(&self, table: &str) -> TableRef {
        TableRef {
            project: self.project.clone(),
            dataset: self.dataset.clone(),
            table: table.to_string(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.dataset)
    }
}

/// A BigQuery table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Compare the list table rows of one asset type against its detail table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareQuery {
    pub inventory: TableRef,
    pub detail: TableRef,
    pub asset_type: String,
}

/// One row of the compare result; either side may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffRow {
    /// Asset name from the list table
    pub name: Option<String>,
    /// Self-link from the detail table
    pub self_link: Option<String>,
    pub update_time: Option<DateTime<Utc>>,
    pub updated_timestamp: Option<DateTime<Utc>>,
}

/// Operations the sync needs from the tabular store
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn dataset_exists(&self, dataset: &DatasetRef) -> Result<bool, ApiError>;

    async fn create_dataset(&self, dataset: &DatasetRef, location: &str) -> Result<(), ApiError>;

    async fn table_exists(&self, table: &TableRef) -> Result<bool, ApiError>;

    async fn create_table(&self, table: &TableRef, schema: &[ColumnDescriptor]) -> Result<(), ApiError>;

    async fn delete_table(&self, table: &TableRef) -> Result<(), ApiError>;

    /// Bulk streaming insert, used for the list table
    async fn insert_rows(&self, table: &TableRef, rows: &[Value]) -> Result<(), ApiError>;

    /// Append-only load validated against `schema`, used for detail tables
    async fn load_rows(
        &self,
        table: &TableRef,
        schema: &[ColumnDescriptor],
        rows: &[Value],
    ) -> Result<(), ApiError>;

    /// Distinct `asset_type` values of the list table, sorted
    async fn distinct_asset_types(&self, inventory: &TableRef) -> Result<Vec<String>, ApiError>;

    /// Rows that differ between the list table and a detail table
    async fn compare(&self, query: &CompareQuery) -> Result<Vec<DiffRow>, ApiError>;

    /// Delete the detail row with the given self-link
    async fn delete_row(&self, table: &TableRef, self_link: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(
            normalize_identifier("compute.googleapis.com/Address"),
            "compute_googleapis_com_Address"
        );
    }

    #[test]
    fn test_join_key_aligns_name_and_self_link() {
        let name = "//compute.googleapis.com/projects/demo-host/regions/us-east1/addresses/ip-1";
        let self_link = "https://www.googleapis.com/compute/v1/projects/demo-host/regions/us-east1/addresses/ip-1";
        assert_eq!(join_key(name), join_key(self_link));
        assert_eq!(join_key(name), "projects_demo-host_regions_us-east1_addresses_ip-1");
    }

    #[test]
    fn test_join_key_normalizes_dots_and_slashes() {
        assert_eq!(join_key("projects/demo.host"), join_key("projects/demo_host"));
    }

    #[test]
    fn test_join_key_without_projects_segment() {
        assert_eq!(join_key("folders/12.3"), "folders_12_3");
    }

    #[test]
    fn test_table_ref_display() {
        let table = DatasetRef::new("demo-host", "inv").table("t");
        assert_eq!(table.to_string(), "demo-host.inv.t");
    }
}
