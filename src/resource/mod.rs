//! Resource kinds synced into detail tables
//!
//! Every asset type with a detail table implements [`AssetKind`]: it names
//! its asset type, describes its columns and fetches one asset's full
//! record. The reconciler only ever sees `&dyn AssetKind`.
//!
//! # Module Structure
//!
//! - [`compute`] - Compute Engine kinds (addresses, forwarding rules, ...)
//! - [`registry`] - Lookup of kinds by detail table id

pub mod compute;
pub mod registry;

pub use compute::{ComputeAsset, ComputeResource};
pub use registry::AssetRegistry;

use crate::error::RowError;
use crate::schema::{infer_schema, ColumnDescriptor, ColumnType, RecordDescription, SchemaError};
use crate::store::{normalize_identifier, SELF_LINK_COLUMN, UPDATED_TIMESTAMP_COLUMN};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// A resource type that has a detail table
#[async_trait]
pub trait AssetKind: Send + Sync {
    /// Cloud Asset type, e.g. `compute.googleapis.com/Address`
    fn asset_type(&self) -> &str;

    /// Detail table id
    fn asset_table_id(&self) -> String {
        normalize_identifier(self.asset_type())
    }

    /// Detail table schema, `updatedTimestamp` included
    fn schema(&self) -> Result<Vec<ColumnDescriptor>, SchemaError>;

    /// Fetch the full record of the asset called `name`
    async fn fetch_detail(&self, name: &str) -> Result<DetailRecord, RowError>;
}

/// Inferred columns of `description` followed by `updatedTimestamp`
pub fn detail_schema(description: &RecordDescription) -> Result<Vec<ColumnDescriptor>, SchemaError> {
    let mut columns = infer_schema(description)?;
    columns.retain(|c| c.name != UPDATED_TIMESTAMP_COLUMN);
    columns.push(ColumnDescriptor::leaf(
        UPDATED_TIMESTAMP_COLUMN,
        ColumnType::Timestamp,
    ));
    Ok(columns)
}

/// A fetched resource, serialized, keyed by its self-link
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    self_link: String,
    fields: Map<String, Value>,
}

impl DetailRecord {
    /// Build a record from a JSON object; it must carry a non-empty `selfLink`
    pub fn new(name: &str, value: Value) -> Result<Self, RowError> {
        let Value::Object(fields) = value else {
            return Err(RowError::validation(name, "record is not a JSON object"));
        };

        let self_link = fields
            .get(SELF_LINK_COLUMN)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| RowError::validation(name, "selfLink is a required field"))?;

        Ok(Self { self_link, fields })
    }

    /// Serialize a typed resource
    pub fn from_resource<T: Serialize>(name: &str, resource: &T) -> Result<Self, RowError> {
        let value = serde_json::to_value(resource)
            .map_err(|err| RowError::validation(name, format!("cannot serialize record: {}", err)))?;
        Self::new(name, value)
    }

    pub fn self_link(&self) -> &str {
        &self.self_link
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Row to load, with `updatedTimestamp` set
    pub fn into_row(self, updated_timestamp: Option<DateTime<Utc>>) -> Value {
        let mut fields = self.fields;
        let stamp = updated_timestamp
            .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true)))
            .unwrap_or(Value::Null);
        fields.insert(UPDATED_TIMESTAMP_COLUMN.to_string(), stamp);
        Value::Object(fields)
    }
}

/// Where a Compute Engine resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Regional(String),
    Global,
}

/// Positional parse of `//compute.googleapis.com/projects/P/regions/R/<collection>/ID`
/// (or `.../projects/P/global/<collection>/ID`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetName {
    pub project: String,
    pub location: Location,
    pub id: String,
}

impl AssetName {
    pub fn parse(name: &str) -> Result<Self, RowError> {
        let segments: Vec<&str> = name.split('/').collect();
        let malformed = |reason: &str| RowError::validation(name, format!("malformed asset name: {}", reason));

        if segments.len() < 8 || segments.get(3) != Some(&"projects") {
            return Err(malformed("expected //<service>/projects/<project>/..."));
        }

        let project = segments[4];
        let id = segments[segments.len() - 1];
        if project.is_empty() || id.is_empty() {
            return Err(malformed("empty project or resource id"));
        }

        let location = match segments[5] {
            "regions" if segments.len() >= 9 && !segments[6].is_empty() => {
                Location::Regional(segments[6].to_string())
            }
            "global" => Location::Global,
            other => return Err(malformed(&format!("unexpected location segment `{}`", other))),
        };

        Ok(Self {
            project: project.to_string(),
            location,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_regional_name() {
        let name = AssetName::parse(
            "//compute.googleapis.com/projects/demo-host/regions/us-east1/addresses/ip-1",
        )
        .unwrap();
        assert_eq!(name.project, "demo-host");
        assert_eq!(name.location, Location::Regional("us-east1".to_string()));
        assert_eq!(name.id, "ip-1");
    }

    #[test]
    fn test_parse_global_name() {
        let name =
            AssetName::parse("//compute.googleapis.com/projects/demo-host/global/backendServices/web")
                .unwrap();
        assert_eq!(name.location, Location::Global);
        assert_eq!(name.id, "web");
    }

    #[test]
    fn test_parse_rejects_short_names() {
        for name in [
            "",
            "//compute.googleapis.com/projects/demo-host",
            "//compute.googleapis.com/folders/1/regions/r/addresses/x",
            "//compute.googleapis.com/projects/demo-host/zones/us-east1-b/disks/d",
            "//compute.googleapis.com/projects/demo-host/regions/us-east1/addresses/",
        ] {
            let err = AssetName::parse(name).unwrap_err();
            assert!(matches!(err, RowError::Validation { .. }), "{name}");
        }
    }

    #[test]
    fn test_detail_record_requires_self_link() {
        let err = DetailRecord::new("n", json!({"name": "ip-1"})).unwrap_err();
        assert_eq!(err.to_string(), "n: selfLink is a required field");

        let err = DetailRecord::new("n", json!({"selfLink": ""})).unwrap_err();
        assert!(matches!(err, RowError::Validation { .. }));

        assert!(DetailRecord::new("n", json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_into_row_sets_updated_timestamp() {
        let record = DetailRecord::new("n", json!({"selfLink": "https://x/projects/p/a"})).unwrap();
        assert_eq!(record.self_link(), "https://x/projects/p/a");

        let stamp = DateTime::parse_from_rfc3339("2024-03-01T10:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let row = record.into_row(Some(stamp));
        assert_eq!(row["updatedTimestamp"], "2024-03-01T10:00:00.500000Z");
        assert_eq!(row["selfLink"], "https://x/projects/p/a");
    }

    #[test]
    fn test_detail_schema_appends_updated_timestamp_once() {
        let description = RecordDescription::new("Thing")
            .field::<String>("selfLink")
            .field::<DateTime<Utc>>("updatedTimestamp")
            .field::<bool>("enabled");
        let columns = detail_schema(&description).unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["selfLink", "enabled", "updatedTimestamp"]);
        assert_eq!(columns[2].column_type, ColumnType::Timestamp);
        assert!(!columns[2].repeated);
    }
}
