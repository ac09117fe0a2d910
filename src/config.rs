//! Configuration Management
//!
//! Raw values come from flags or environment variables (see `main.rs`);
//! [`Config::resolve`] validates them and fills in defaults before any
//! remote call is made.

use crate::error::SyncError;
use crate::poll::PollPolicy;
use crate::store::DatasetRef;
use std::fmt;
use std::time::Duration;

/// Regions a dataset may be created in, besides the `us` and `eu` multi-regions
pub const GCP_REGIONS: &[&str] = &[
    "asia-east1",
    "asia-east2",
    "asia-northeast1",
    "asia-northeast2",
    "asia-northeast3",
    "asia-south1",
    "asia-south2",
    "asia-southeast1",
    "asia-southeast2",
    "australia-southeast1",
    "australia-southeast2",
    "europe-central2",
    "europe-north1",
    "europe-west1",
    "europe-west2",
    "europe-west3",
    "europe-west4",
    "europe-west6",
    "northamerica-northeast1",
    "northamerica-northeast2",
    "southamerica-east1",
    "us-central1",
    "us-east1",
    "us-east4",
    "us-west1",
    "us-west2",
    "us-west3",
    "us-west4",
];

const MULTI_REGIONS: &[&str] = &["us", "eu"];

pub const DEFAULT_DATASET_REGION: &str = "us";

pub const DEFAULT_INVENTORY_TABLE: &str = "cloudasset_googleapis_com_Asset";

/// Whether `region` is an accepted dataset location
pub fn is_known_region(region: &str) -> bool {
    GCP_REGIONS.contains(&region) || MULTI_REGIONS.contains(&region)
}

/// Root of the inventory walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Projects,
    Folders,
    Organizations,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 3] = [ScopeKind::Projects, ScopeKind::Folders, ScopeKind::Organizations];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Projects => "projects",
            ScopeKind::Folders => "folders",
            ScopeKind::Organizations => "organizations",
        }
    }
}

/// `projects/ID`, `folders/ID` or `organizations/ID`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub id: String,
}

impl Scope {
    /// Parse a scope; the kind is matched case-insensitively
    pub fn parse(value: &str) -> Result<Self, SyncError> {
        let value = value.trim().to_lowercase();
        let (kind, id) = value.split_once('/').unwrap_or((value.as_str(), ""));

        let Some(kind) = ScopeKind::ALL.into_iter().find(|k| k.as_str() == kind) else {
            let supported: Vec<&str> = ScopeKind::ALL.iter().map(|k| k.as_str()).collect();
            return Err(SyncError::Configuration(format!(
                "GOOGLE_CLOUD_ASSET_SCOPE: the scope type `{}` is not one of the supported scope types {:?}",
                kind, supported
            )));
        };
        if id.is_empty() || id.contains('/') {
            return Err(SyncError::Configuration(format!(
                "GOOGLE_CLOUD_ASSET_SCOPE: `{}` must look like {}/<id>",
                value,
                kind.as_str()
            )));
        }

        Ok(Self {
            kind,
            id: id.to_string(),
        })
    }

    /// `gcp_asset_inventory_<kind>_<id>` with `-` replaced by `_`
    pub fn default_dataset(&self) -> String {
        format!("gcp_asset_inventory_{}_{}", self.kind.as_str(), self.id).replace('-', "_")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

/// Unvalidated inputs, as given on the command line or in the environment
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub project: Option<String>,
    /// Comma separated
    pub asset_types: Option<String>,
    pub scope: Option<String>,
    pub dataset: Option<String>,
    pub dataset_region: Option<String>,
    pub inventory_table: Option<String>,
    pub ready_interval_secs: u64,
    pub ready_max_attempts: u32,
}

/// Validated run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Project owning the dataset and running the queries
    pub project: String,
    pub asset_types: Vec<String>,
    pub scope: Scope,
    pub dataset: String,
    pub dataset_region: String,
    pub inventory_table: String,
    pub readiness: PollPolicy,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Validate `raw`, falling back to the gcloud default project
    pub fn resolve(raw: RawConfig) -> Result<Self, SyncError> {
        Self::resolve_with(raw, crate::gcp::auth::get_default_project)
    }

    fn resolve_with(
        raw: RawConfig,
        default_project: impl FnOnce() -> Option<String>,
    ) -> Result<Self, SyncError> {
        let project = non_empty(raw.project)
            .or_else(default_project)
            .ok_or_else(|| {
                SyncError::Configuration(
                    "GOOGLE_CLOUD_PROJECT must be set (or a gcloud default project configured)"
                        .to_string(),
                )
            })?;

        let asset_types: Vec<String> = raw
            .asset_types
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if asset_types.is_empty() {
            return Err(SyncError::Configuration(
                "GOOGLE_CLOUD_ASSET_TYPES must be set and contain at least one item".to_string(),
            ));
        }

        let scope = non_empty(raw.scope)
            .ok_or_else(|| SyncError::Configuration("GOOGLE_CLOUD_ASSET_SCOPE must be set".to_string()))
            .and_then(|s| Scope::parse(&s))?;

        let dataset = non_empty(raw.dataset).unwrap_or_else(|| scope.default_dataset());

        let dataset_region = match non_empty(raw.dataset_region).map(|r| r.to_lowercase()) {
            None => DEFAULT_DATASET_REGION.to_string(),
            Some(region) if is_known_region(&region) => region,
            Some(region) => {
                return Err(SyncError::Configuration(format!(
                    "GOOGLE_CLOUD_DATASET_REGION: dataset region `{}` is not one of the supported regions",
                    region
                )));
            }
        };

        let inventory_table = non_empty(raw.inventory_table)
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| DEFAULT_INVENTORY_TABLE.to_string());

        if raw.ready_max_attempts == 0 {
            return Err(SyncError::Configuration(
                "ASSET_SYNC_READY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let readiness = PollPolicy::new(
            Duration::from_secs(raw.ready_interval_secs),
            raw.ready_max_attempts,
        );

        Ok(Self {
            project,
            asset_types,
            scope,
            dataset,
            dataset_region,
            inventory_table,
            readiness,
        })
    }

    pub fn dataset_ref(&self) -> DatasetRef {
        DatasetRef::new(&self.project, &self.dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawConfig {
        RawConfig {
            project: Some("demo-host".to_string()),
            asset_types: Some("compute.googleapis.com/Address, compute.googleapis.com/Subnetwork".to_string()),
            scope: Some("projects/demo-host".to_string()),
            ready_interval_secs: 5,
            ready_max_attempts: 60,
            ..Default::default()
        }
    }

    fn resolve(raw: RawConfig) -> Result<Config, SyncError> {
        Config::resolve_with(raw, || None)
    }

    #[test]
    fn test_defaults() {
        let config = resolve(raw()).unwrap();
        assert_eq!(config.asset_types.len(), 2);
        assert_eq!(config.asset_types[1], "compute.googleapis.com/Subnetwork");
        assert_eq!(config.dataset, "gcp_asset_inventory_projects_demo_host");
        assert_eq!(config.dataset_region, "us");
        assert_eq!(config.inventory_table, "cloudasset_googleapis_com_Asset");
        assert_eq!(config.readiness, PollPolicy::default());
        assert_eq!(config.scope.to_string(), "projects/demo-host");
    }

    #[test]
    fn test_project_falls_back_to_default() {
        let config = Config::resolve_with(
            RawConfig {
                project: None,
                ..raw()
            },
            || Some("fallback-project".to_string()),
        )
        .unwrap();
        assert_eq!(config.project, "fallback-project");

        let err = resolve(RawConfig {
            project: Some("  ".to_string()),
            ..raw()
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_asset_types_required() {
        for value in [None, Some(""), Some(" , ")] {
            let err = resolve(RawConfig {
                asset_types: value.map(String::from),
                ..raw()
            })
            .unwrap_err();
            assert!(err.to_string().contains("GOOGLE_CLOUD_ASSET_TYPES"));
        }
    }

    #[test]
    fn test_scope_validation() {
        assert!(Scope::parse("Folders/123").is_ok());
        assert!(Scope::parse("organizations/42").is_ok());
        for bad in ["billing/1", "projects", "projects/", "projects/a/b"] {
            assert!(Scope::parse(bad).is_err(), "{bad}");
        }
        let err = resolve(RawConfig { scope: None, ..raw() }).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLOUD_ASSET_SCOPE"));
    }

    #[test]
    fn test_region_validation() {
        let config = resolve(RawConfig {
            dataset_region: Some("EU".to_string()),
            ..raw()
        })
        .unwrap();
        assert_eq!(config.dataset_region, "eu");

        assert!(resolve(RawConfig {
            dataset_region: Some("europe-west9".to_string()),
            ..raw()
        })
        .is_err());
        assert!(is_known_region("australia-southeast2"));
    }

    #[test]
    fn test_explicit_dataset_and_table() {
        let config = resolve(RawConfig {
            dataset: Some("inventory".to_string()),
            inventory_table: Some("My_Assets".to_string()),
            ..raw()
        })
        .unwrap();
        assert_eq!(config.dataset, "inventory");
        assert_eq!(config.inventory_table, "my_assets");
        assert_eq!(config.dataset_ref().to_string(), "demo-host.inventory");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(resolve(RawConfig {
            ready_max_attempts: 0,
            ..raw()
        })
        .is_err());
    }
}
