//! Cloud Asset Inventory records
//!
//! [`ResourceRecord`] is the asset as returned by `assets.list`;
//! [`InventoryRow`] is its flattened form stored in the list table.

mod listing;

pub use listing::{AssetLister, PAGE_SIZE};

use crate::schema::{Describe, RecordDescription};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource payload of an asset
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourcePayload {
    pub version: String,
    pub discovery_document_uri: String,
    pub discovery_name: String,
    pub resource_url: String,
    pub parent: String,
    pub data: Value,
    pub location: String,
}

/// One asset from the listing API
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub name: String,
    pub asset_type: String,
    #[serde(default)]
    pub ancestors: Vec<String>,
    pub update_time: DateTime<Utc>,
    #[serde(default)]
    pub resource: ResourcePayload,
}

/// Resource payload columns of the list table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryResource {
    pub version: String,
    pub discovery_document_url: String,
    pub discovery_name: String,
    pub resource_url: String,
    pub parent: String,
    /// Payload rendered as JSON text
    pub data: String,
    pub location: String,
}

/// A row of the list table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryRow {
    pub name: String,
    pub asset_type: String,
    pub ancestors: Vec<String>,
    pub update_time: DateTime<Utc>,
    pub resource: InventoryResource,
}

impl Describe for InventoryResource {
    fn describe() -> RecordDescription {
        RecordDescription::new("InventoryResource")
            .field::<String>("version")
            .field::<String>("discovery_document_url")
            .field::<String>("discovery_name")
            .field::<String>("resource_url")
            .field::<String>("parent")
            .field::<String>("data")
            .field::<String>("location")
    }
}

crate::nested_record!(InventoryResource);

impl Describe for InventoryRow {
    fn describe() -> RecordDescription {
        RecordDescription::new("InventoryRow")
            .field::<String>("name")
            .field::<String>("asset_type")
            .field::<Vec<String>>("ancestors")
            .field::<DateTime<Utc>>("update_time")
            .field::<InventoryResource>("resource")
    }
}

impl From<&ResourceRecord> for InventoryRow {
    fn from(record: &ResourceRecord) -> Self {
        let data = match &record.resource.data {
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Self {
            name: record.name.clone(),
            asset_type: record.asset_type.clone(),
            ancestors: record.ancestors.clone(),
            update_time: record.update_time,
            resource: InventoryResource {
                version: record.resource.version.clone(),
                discovery_document_url: record.resource.discovery_document_uri.clone(),
                discovery_name: record.resource.discovery_name.clone(),
                resource_url: record.resource.resource_url.clone(),
                parent: record.resource.parent.clone(),
                data,
                location: record.resource.location.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{infer_schema, ColumnType};
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "name": "//compute.googleapis.com/projects/demo-host/regions/us-east1/addresses/ip-1",
            "assetType": "compute.googleapis.com/Address",
            "ancestors": ["projects/123456", "folders/42", "organizations/7"],
            "updateTime": "2024-03-01T10:00:00.123456Z",
            "resource": {
                "version": "v1",
                "discoveryDocumentUri": "https://www.googleapis.com/discovery/v1/apis/compute/v1/rest",
                "discoveryName": "Address",
                "parent": "//cloudresourcemanager.googleapis.com/projects/123456",
                "data": {"address": "10.0.0.2", "status": "IN_USE"},
                "location": "us-east1"
            }
        })
    }

    #[test]
    fn test_record_deserializes_from_api_shape() {
        let record: ResourceRecord = serde_json::from_value(sample()).unwrap();
        assert_eq!(record.asset_type, "compute.googleapis.com/Address");
        assert_eq!(record.ancestors.len(), 3);
        assert_eq!(record.resource.discovery_name, "Address");
        assert_eq!(record.resource.resource_url, "");
        assert_eq!(record.update_time.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn test_row_flattens_payload() {
        let record: ResourceRecord = serde_json::from_value(sample()).unwrap();
        let row = InventoryRow::from(&record);
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["asset_type"], "compute.googleapis.com/Address");
        assert_eq!(value["resource"]["location"], "us-east1");
        let data: Value = serde_json::from_str(value["resource"]["data"].as_str().unwrap()).unwrap();
        assert_eq!(data["status"], "IN_USE");
    }

    #[test]
    fn test_list_table_schema() {
        let columns = infer_schema(&InventoryRow::describe()).unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "asset_type", "ancestors", "update_time", "resource"]);
        assert!(columns[2].repeated);
        assert_eq!(columns[3].column_type, ColumnType::Timestamp);
        assert_eq!(columns[4].column_type, ColumnType::Record);
        assert_eq!(columns[4].fields.len(), 7);
    }
}
