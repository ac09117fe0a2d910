//! Compute Engine resource kinds
//!
//! Each kind is a typed struct mirroring the Compute REST representation
//! (camelCase keys) plus a [`Describe`] impl listing its columns in the same
//! order. [`ComputeAsset`] turns any of them into an [`AssetKind`].

use super::{detail_schema, AssetKind, AssetName, DetailRecord, Location};
use crate::error::RowError;
use crate::gcp::{ApiError, GcpClient};
use crate::schema::{ColumnDescriptor, Describe, RecordDescription, SchemaError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

/// A Compute Engine resource with a detail table
pub trait ComputeResource: Describe + DeserializeOwned + Serialize + Send + Sync + 'static {
    /// Cloud Asset type
    const ASSET_TYPE: &'static str;

    /// REST collection, e.g. `addresses`
    const COLLECTION: &'static str;

    /// Whether `.../global/<collection>/ID` names are served
    const GLOBAL: bool = false;
}

/// [`AssetKind`] over a Compute Engine `get` endpoint
pub struct ComputeAsset<R> {
    client: GcpClient,
    _resource: PhantomData<fn() -> R>,
}

impl<R: ComputeResource> ComputeAsset<R> {
    pub fn new(client: GcpClient) -> Self {
        Self {
            client,
            _resource: PhantomData,
        }
    }

    fn detail_url(&self, name: &str) -> Result<String, RowError> {
        let parsed = AssetName::parse(name)?;
        match parsed.location {
            Location::Regional(region) => Ok(self.client.compute_regional_url(
                &parsed.project,
                &region,
                R::COLLECTION,
                &parsed.id,
            )),
            Location::Global if R::GLOBAL => Ok(self.client.compute_global_url(
                &parsed.project,
                R::COLLECTION,
                &parsed.id,
            )),
            Location::Global => Err(RowError::validation(
                name,
                format!("{} has no global resources", R::ASSET_TYPE),
            )),
        }
    }
}

#[async_trait]
impl<R: ComputeResource> AssetKind for ComputeAsset<R> {
    fn asset_type(&self) -> &str {
        R::ASSET_TYPE
    }

    fn schema(&self) -> Result<Vec<ColumnDescriptor>, SchemaError> {
        detail_schema(&R::describe())
    }

    async fn fetch_detail(&self, name: &str) -> Result<DetailRecord, RowError> {
        let url = self.detail_url(name)?;
        let fetch_error = |source| RowError::Fetch {
            name: name.to_string(),
            source,
        };

        let value = self.client.get(&url).await.map_err(fetch_error)?;
        let resource: R = serde_json::from_value(value)
            .map_err(|source| fetch_error(ApiError::Decode { url: url.clone(), source }))?;

        tracing::debug!("Fetched {} {}", R::ASSET_TYPE, name);
        DetailRecord::from_resource(name, &resource)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    String(String),
}

/// int64/uint64 fields arrive as JSON strings; accept numbers too
fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr + Default,
    T::Err: Display,
{
    match Option::<NumberOrString<T>>::deserialize(deserializer)? {
        None => Ok(T::default()),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::String(s)) if s.is_empty() => Ok(T::default()),
        Some(NumberOrString::String(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// compute.googleapis.com/Address
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub address: String,
    pub address_type: String,
    pub creation_timestamp: String,
    pub description: String,
    #[serde(deserialize_with = "lenient_number")]
    pub id: u64,
    pub ip_version: String,
    pub ipv6_endpoint_type: String,
    pub kind: String,
    pub label_fingerprint: String,
    pub labels: HashMap<String, String>,
    pub name: String,
    pub network: String,
    pub network_tier: String,
    pub prefix_length: i64,
    pub purpose: String,
    pub region: String,
    pub self_link: String,
    pub status: String,
    pub subnetwork: String,
    pub users: Vec<String>,
}

impl Describe for Address {
    fn describe() -> RecordDescription {
        RecordDescription::new("Address")
            .field::<String>("address")
            .field::<String>("addressType")
            .field::<String>("creationTimestamp")
            .field::<String>("description")
            .field::<u64>("id")
            .field::<String>("ipVersion")
            .field::<String>("ipv6EndpointType")
            .field::<String>("kind")
            .field::<String>("labelFingerprint")
            .field::<HashMap<String, String>>("labels")
            .field::<String>("name")
            .field::<String>("network")
            .field::<String>("networkTier")
            .field::<i64>("prefixLength")
            .field::<String>("purpose")
            .field::<String>("region")
            .field::<String>("selfLink")
            .field::<String>("status")
            .field::<String>("subnetwork")
            .field::<Vec<String>>("users")
    }
}

impl ComputeResource for Address {
    const ASSET_TYPE: &'static str = "compute.googleapis.com/Address";
    const COLLECTION: &'static str = "addresses";
}

// =============================================================================
// compute.googleapis.com/ForwardingRule
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataFilterLabelMatch {
    pub name: String,
    pub value: String,
}

impl Describe for MetadataFilterLabelMatch {
    fn describe() -> RecordDescription {
        RecordDescription::new("MetadataFilterLabelMatch")
            .field::<String>("name")
            .field::<String>("value")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataFilter {
    pub filter_labels: Vec<MetadataFilterLabelMatch>,
    pub filter_match_criteria: String,
}

impl Describe for MetadataFilter {
    fn describe() -> RecordDescription {
        RecordDescription::new("MetadataFilter")
            .field::<Vec<MetadataFilterLabelMatch>>("filterLabels")
            .field::<String>("filterMatchCriteria")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDirectoryRegistration {
    pub namespace: String,
    pub service: String,
    pub service_directory_region: String,
}

impl Describe for ServiceDirectoryRegistration {
    fn describe() -> RecordDescription {
        RecordDescription::new("ServiceDirectoryRegistration")
            .field::<String>("namespace")
            .field::<String>("service")
            .field::<String>("serviceDirectoryRegion")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForwardingRule {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    pub all_ports: bool,
    pub allow_global_access: bool,
    pub backend_service: String,
    pub creation_timestamp: String,
    pub description: String,
    pub fingerprint: String,
    #[serde(deserialize_with = "lenient_number")]
    pub id: u64,
    pub ip_version: String,
    pub is_mirroring_collector: bool,
    pub kind: String,
    pub label_fingerprint: String,
    pub labels: HashMap<String, String>,
    pub load_balancing_scheme: String,
    pub metadata_filters: Vec<MetadataFilter>,
    pub name: String,
    pub network: String,
    pub network_tier: String,
    pub port_range: String,
    pub ports: Vec<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub psc_connection_id: u64,
    pub psc_connection_status: String,
    pub region: String,
    pub self_link: String,
    pub service_directory_registrations: Vec<ServiceDirectoryRegistration>,
    pub service_label: String,
    pub service_name: String,
    pub subnetwork: String,
    pub target: String,
}

impl Describe for ForwardingRule {
    fn describe() -> RecordDescription {
        RecordDescription::new("ForwardingRule")
            .field::<String>("IPAddress")
            .field::<String>("IPProtocol")
            .field::<bool>("allPorts")
            .field::<bool>("allowGlobalAccess")
            .field::<String>("backendService")
            .field::<String>("creationTimestamp")
            .field::<String>("description")
            .field::<String>("fingerprint")
            .field::<u64>("id")
            .field::<String>("ipVersion")
            .field::<bool>("isMirroringCollector")
            .field::<String>("kind")
            .field::<String>("labelFingerprint")
            .field::<HashMap<String, String>>("labels")
            .field::<String>("loadBalancingScheme")
            .field::<Vec<MetadataFilter>>("metadataFilters")
            .field::<String>("name")
            .field::<String>("network")
            .field::<String>("networkTier")
            .field::<String>("portRange")
            .field::<Vec<String>>("ports")
            .field::<u64>("pscConnectionId")
            .field::<String>("pscConnectionStatus")
            .field::<String>("region")
            .field::<String>("selfLink")
            .field::<Vec<ServiceDirectoryRegistration>>("serviceDirectoryRegistrations")
            .field::<String>("serviceLabel")
            .field::<String>("serviceName")
            .field::<String>("subnetwork")
            .field::<String>("target")
    }
}

impl ComputeResource for ForwardingRule {
    const ASSET_TYPE: &'static str = "compute.googleapis.com/ForwardingRule";
    const COLLECTION: &'static str = "forwardingRules";
}

// =============================================================================
// compute.googleapis.com/Subnetwork
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubnetworkLogConfig {
    pub aggregation_interval: String,
    pub enable: bool,
    pub filter_expr: String,
    pub flow_sampling: f64,
    pub metadata: String,
    pub metadata_fields: Vec<String>,
}

impl Describe for SubnetworkLogConfig {
    fn describe() -> RecordDescription {
        RecordDescription::new("SubnetworkLogConfig")
            .field::<String>("aggregationInterval")
            .field::<bool>("enable")
            .field::<String>("filterExpr")
            .field::<f64>("flowSampling")
            .field::<String>("metadata")
            .field::<Vec<String>>("metadataFields")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubnetworkSecondaryRange {
    pub ip_cidr_range: String,
    pub range_name: String,
}

impl Describe for SubnetworkSecondaryRange {
    fn describe() -> RecordDescription {
        RecordDescription::new("SubnetworkSecondaryRange")
            .field::<String>("ipCidrRange")
            .field::<String>("rangeName")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subnetwork {
    pub creation_timestamp: String,
    pub description: String,
    pub enable_flow_logs: bool,
    pub external_ipv6_prefix: String,
    pub fingerprint: String,
    pub gateway_address: String,
    #[serde(deserialize_with = "lenient_number")]
    pub id: u64,
    pub internal_ipv6_prefix: String,
    pub ip_cidr_range: String,
    pub ipv6_access_type: String,
    pub ipv6_cidr_range: String,
    pub kind: String,
    pub log_config: Option<SubnetworkLogConfig>,
    pub name: String,
    pub network: String,
    pub private_ip_google_access: bool,
    pub private_ipv6_google_access: String,
    pub purpose: String,
    pub region: String,
    pub role: String,
    pub secondary_ip_ranges: Vec<SubnetworkSecondaryRange>,
    pub self_link: String,
    pub stack_type: String,
    pub state: String,
}

impl Describe for Subnetwork {
    fn describe() -> RecordDescription {
        RecordDescription::new("Subnetwork")
            .field::<String>("creationTimestamp")
            .field::<String>("description")
            .field::<bool>("enableFlowLogs")
            .field::<String>("externalIpv6Prefix")
            .field::<String>("fingerprint")
            .field::<String>("gatewayAddress")
            .field::<u64>("id")
            .field::<String>("internalIpv6Prefix")
            .field::<String>("ipCidrRange")
            .field::<String>("ipv6AccessType")
            .field::<String>("ipv6CidrRange")
            .field::<String>("kind")
            .field::<Option<SubnetworkLogConfig>>("logConfig")
            .field::<String>("name")
            .field::<String>("network")
            .field::<bool>("privateIpGoogleAccess")
            .field::<String>("privateIpv6GoogleAccess")
            .field::<String>("purpose")
            .field::<String>("region")
            .field::<String>("role")
            .field::<Vec<SubnetworkSecondaryRange>>("secondaryIpRanges")
            .field::<String>("selfLink")
            .field::<String>("stackType")
            .field::<String>("state")
    }
}

impl ComputeResource for Subnetwork {
    const ASSET_TYPE: &'static str = "compute.googleapis.com/Subnetwork";
    const COLLECTION: &'static str = "subnetworks";
}

// =============================================================================
// compute.googleapis.com/BackendService
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Backend {
    pub balancing_mode: String,
    pub capacity_scaler: f64,
    pub description: String,
    pub failover: bool,
    pub group: String,
    pub max_connections: i64,
    pub max_rate: i64,
    pub max_rate_per_instance: f64,
    pub max_utilization: f64,
}

impl Describe for Backend {
    fn describe() -> RecordDescription {
        RecordDescription::new("Backend")
            .field::<String>("balancingMode")
            .field::<f64>("capacityScaler")
            .field::<String>("description")
            .field::<bool>("failover")
            .field::<String>("group")
            .field::<i64>("maxConnections")
            .field::<i64>("maxRate")
            .field::<f64>("maxRatePerInstance")
            .field::<f64>("maxUtilization")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionDraining {
    pub draining_timeout_sec: i64,
}

impl Describe for ConnectionDraining {
    fn describe() -> RecordDescription {
        RecordDescription::new("ConnectionDraining").field::<i64>("drainingTimeoutSec")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendServiceIap {
    pub enabled: bool,
    pub oauth2_client_id: String,
    pub oauth2_client_secret_sha256: String,
}

impl Describe for BackendServiceIap {
    fn describe() -> RecordDescription {
        RecordDescription::new("BackendServiceIAP")
            .field::<bool>("enabled")
            .field::<String>("oauth2ClientId")
            .field::<String>("oauth2ClientSecretSha256")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendServiceLogConfig {
    pub enable: bool,
    pub sample_rate: f64,
}

impl Describe for BackendServiceLogConfig {
    fn describe() -> RecordDescription {
        RecordDescription::new("BackendServiceLogConfig")
            .field::<bool>("enable")
            .field::<f64>("sampleRate")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendService {
    pub affinity_cookie_ttl_sec: i64,
    pub backends: Vec<Backend>,
    pub connection_draining: Option<ConnectionDraining>,
    pub creation_timestamp: String,
    pub custom_request_headers: Vec<String>,
    pub custom_response_headers: Vec<String>,
    pub description: String,
    #[serde(rename = "enableCDN")]
    pub enable_cdn: bool,
    pub fingerprint: String,
    pub health_checks: Vec<String>,
    pub iap: Option<BackendServiceIap>,
    #[serde(deserialize_with = "lenient_number")]
    pub id: u64,
    pub kind: String,
    pub load_balancing_scheme: String,
    pub locality_lb_policy: String,
    pub log_config: Option<BackendServiceLogConfig>,
    pub name: String,
    pub network: String,
    pub port: i64,
    pub port_name: String,
    pub protocol: String,
    pub region: String,
    pub security_policy: String,
    pub self_link: String,
    pub session_affinity: String,
    pub timeout_sec: i64,
}

impl Describe for BackendService {
    fn describe() -> RecordDescription {
        RecordDescription::new("BackendService")
            .field::<i64>("affinityCookieTtlSec")
            .field::<Vec<Backend>>("backends")
            .field::<Option<ConnectionDraining>>("connectionDraining")
            .field::<String>("creationTimestamp")
            .field::<Vec<String>>("customRequestHeaders")
            .field::<Vec<String>>("customResponseHeaders")
            .field::<String>("description")
            .field::<bool>("enableCDN")
            .field::<String>("fingerprint")
            .field::<Vec<String>>("healthChecks")
            .field::<Option<BackendServiceIap>>("iap")
            .field::<u64>("id")
            .field::<String>("kind")
            .field::<String>("loadBalancingScheme")
            .field::<String>("localityLbPolicy")
            .field::<Option<BackendServiceLogConfig>>("logConfig")
            .field::<String>("name")
            .field::<String>("network")
            .field::<i64>("port")
            .field::<String>("portName")
            .field::<String>("protocol")
            .field::<String>("region")
            .field::<String>("securityPolicy")
            .field::<String>("selfLink")
            .field::<String>("sessionAffinity")
            .field::<i64>("timeoutSec")
    }
}

impl ComputeResource for BackendService {
    const ASSET_TYPE: &'static str = "compute.googleapis.com/BackendService";
    const COLLECTION: &'static str = "backendServices";
    const GLOBAL: bool = true;
}

crate::nested_record!(
    MetadataFilterLabelMatch,
    MetadataFilter,
    ServiceDirectoryRegistration,
    SubnetworkLogConfig,
    SubnetworkSecondaryRange,
    Backend,
    ConnectionDraining,
    BackendServiceIap,
    BackendServiceLogConfig,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::{Endpoints, GcpCredentials};
    use crate::schema::{infer, ColumnType};
    use serde_json::{json, Value};
    use std::collections::BTreeSet;

    fn client() -> GcpClient {
        GcpClient::with_credentials(GcpCredentials::fixed("t"), Endpoints::default()).unwrap()
    }

    /// Columns and serialized keys agree both ways, apart from the skipped fields
    fn assert_columns_match_serialization<R: ComputeResource + Default>(skipped: &[&str]) {
        let serialized = serde_json::to_value(R::default()).unwrap();
        let keys: BTreeSet<&str> = serialized
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let columns = detail_schema(&R::describe()).unwrap();
        let names: BTreeSet<&str> = columns[..columns.len() - 1]
            .iter()
            .map(|c| c.name.as_str())
            .collect();

        let missing: Vec<&str> = names.difference(&keys).copied().collect();
        assert!(missing.is_empty(), "{} has no serialized key for {:?}", R::ASSET_TYPE, missing);

        let unmapped: BTreeSet<&str> = keys.difference(&names).copied().collect();
        let expected: BTreeSet<&str> = skipped.iter().copied().collect();
        assert_eq!(unmapped, expected, "{} serializes keys without a column", R::ASSET_TYPE);
    }

    #[test]
    fn test_describe_matches_serde_names() {
        assert_columns_match_serialization::<Address>(&["id", "labels"]);
        assert_columns_match_serialization::<ForwardingRule>(&["id", "labels", "pscConnectionId"]);
        assert_columns_match_serialization::<Subnetwork>(&["id"]);
    }

    #[test]
    fn test_backend_service_columns() {
        assert_columns_match_serialization::<BackendService>(&["id"]);

        let columns = detail_schema(&BackendService::describe()).unwrap();
        let backends = columns.iter().find(|c| c.name == "backends").unwrap();
        assert!(backends.repeated);
        assert_eq!(backends.column_type, ColumnType::Record);
        assert_eq!(backends.fields.len(), 9);
        let iap = columns.iter().find(|c| c.name == "iap").unwrap();
        assert!(!iap.repeated);
        assert_eq!(iap.fields.len(), 3);
    }

    #[test]
    fn test_unsigned_and_map_fields_are_skipped() {
        let inference = infer(&Address::describe()).unwrap();
        let skipped: Vec<&str> = inference.skipped.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(skipped, vec!["id", "labels"]);
        assert!(inference.columns.iter().any(|c| c.name == "selfLink"));
    }

    #[test]
    fn test_schema_ends_with_updated_timestamp() {
        let kind = ComputeAsset::<Subnetwork>::new(client());
        let columns = kind.schema().unwrap();
        assert_eq!(columns.last().unwrap().name, "updatedTimestamp");
        assert_eq!(kind.asset_table_id(), "compute_googleapis_com_Subnetwork");
    }

    #[test]
    fn test_lenient_numbers() {
        let address: Address = serde_json::from_value(json!({
            "id": "8217329431862396381",
            "prefixLength": 24,
            "selfLink": "https://www.googleapis.com/compute/v1/projects/p/regions/r/addresses/a",
            "labels": {"team": "net"},
            "somethingNew": true
        }))
        .unwrap();
        assert_eq!(address.id, 8217329431862396381);
        assert_eq!(address.prefix_length, 24);

        let numeric: ForwardingRule =
            serde_json::from_value(json!({"id": 7, "pscConnectionId": ""})).unwrap();
        assert_eq!(numeric.id, 7);
        assert_eq!(numeric.psc_connection_id, 0);
    }

    #[test]
    fn test_detail_urls() {
        let addresses = ComputeAsset::<Address>::new(client());
        assert_eq!(
            addresses
                .detail_url("//compute.googleapis.com/projects/p/regions/us-east1/addresses/ip-1")
                .unwrap(),
            "https://compute.googleapis.com/compute/v1/projects/p/regions/us-east1/addresses/ip-1"
        );
        assert!(addresses
            .detail_url("//compute.googleapis.com/projects/p/global/addresses/ip-1")
            .is_err());

        let backends = ComputeAsset::<BackendService>::new(client());
        assert_eq!(
            backends
                .detail_url("//compute.googleapis.com/projects/p/global/backendServices/web")
                .unwrap(),
            "https://compute.googleapis.com/compute/v1/projects/p/global/backendServices/web"
        );
    }

    #[test]
    fn test_dropped_fields_do_not_reach_the_row() {
        let value: Value = json!({
            "selfLink": "https://www.googleapis.com/compute/v1/projects/p/regions/r/subnetworks/s",
            "secondaryIpRanges": [{"rangeName": "pods", "ipCidrRange": "10.4.0.0/14"}],
            "unknownField": 1
        });
        let subnet: Subnetwork = serde_json::from_value(value).unwrap();
        let record = DetailRecord::from_resource("n", &subnet).unwrap();
        assert!(record.fields().get("unknownField").is_none());
        assert_eq!(record.fields()["secondaryIpRanges"][0]["rangeName"], "pods");
    }
}
