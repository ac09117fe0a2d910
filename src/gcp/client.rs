//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::GcpCredentials;
use super::http::{ApiError, GcpHttpClient};
use serde_json::Value;

/// Base URLs of the REST services this crate talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub cloudasset: String,
    pub bigquery: String,
    pub bigquery_upload: String,
    pub compute: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            cloudasset: "https://cloudasset.googleapis.com/v1".to_string(),
            bigquery: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            bigquery_upload: "https://bigquery.googleapis.com/upload/bigquery/v2".to_string(),
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
        }
    }
}

impl Endpoints {
    /// Same paths as production, served from another root (emulators, mock servers)
    pub fn rooted_at(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            cloudasset: format!("{}/v1", root),
            bigquery: format!("{}/bigquery/v2", root),
            bigquery_upload: format!("{}/upload/bigquery/v2", root),
            compute: format!("{}/compute/v1", root),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub endpoints: Endpoints,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new() -> anyhow::Result<Self> {
        let credentials = GcpCredentials::new().await?;
        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            endpoints: Endpoints::default(),
        })
    }

    /// Create a client from explicit credentials and endpoints
    pub fn with_credentials(
        credentials: GcpCredentials,
        endpoints: Endpoints,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            endpoints,
        })
    }

    async fn token(&self) -> Result<String, ApiError> {
        self.credentials.get_token().await.map_err(ApiError::Auth)
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value, ApiError> {
        let token = self.token().await?;
        self.http.get(url, &token).await
    }

    /// GET that maps a 404 to `None`
    pub async fn get_optional(&self, url: &str) -> Result<Option<Value>, ApiError> {
        match self.get(url).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let token = self.token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> Result<Value, ApiError> {
        let token = self.token().await?;
        self.http.delete(url, &token).await
    }

    /// Upload a payload with JSON metadata (`uploadType=multipart`)
    pub async fn upload(&self, url: &str, metadata: &Value, payload: &[u8]) -> Result<Value, ApiError> {
        let token = self.token().await?;
        self.http.post_related(url, &token, metadata, payload).await
    }

    // =========================================================================
    // Cloud Asset API helpers
    // =========================================================================

    /// Build the `assets.list` URL for a scope (`projects/x`, `folders/1`, ...)
    pub fn cloudasset_assets_url(&self, scope: &str) -> String {
        format!("{}/{}/assets", self.endpoints.cloudasset, scope)
    }

    // =========================================================================
    // BigQuery API helpers
    // =========================================================================

    /// Build BigQuery project URL
    pub fn bigquery_url(&self, project: &str, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoints.bigquery,
            urlencoding::encode(project),
            path
        )
    }

    /// Build BigQuery dataset URL
    pub fn bigquery_dataset_url(&self, project: &str, dataset: &str) -> String {
        self.bigquery_url(project, &format!("datasets/{}", urlencoding::encode(dataset)))
    }

    /// Build BigQuery table URL
    pub fn bigquery_table_url(&self, project: &str, dataset: &str, table: &str) -> String {
        format!(
            "{}/tables/{}",
            self.bigquery_dataset_url(project, dataset),
            urlencoding::encode(table)
        )
    }

    /// Build BigQuery job upload URL
    pub fn bigquery_upload_url(&self, project: &str) -> String {
        format!(
            "{}/projects/{}/jobs?uploadType=multipart",
            self.endpoints.bigquery_upload,
            urlencoding::encode(project)
        )
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, project: &str, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoints.compute,
            urlencoding::encode(project),
            path
        )
    }

    /// Build regional Compute Engine resource URL
    pub fn compute_regional_url(&self, project: &str, region: &str, collection: &str, id: &str) -> String {
        self.compute_url(
            project,
            &format!(
                "regions/{}/{}/{}",
                urlencoding::encode(region),
                collection,
                urlencoding::encode(id)
            ),
        )
    }

    /// Build global Compute Engine resource URL
    pub fn compute_global_url(&self, project: &str, collection: &str, id: &str) -> String {
        self.compute_url(
            project,
            &format!("global/{}/{}", collection, urlencoding::encode(id)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GcpClient {
        GcpClient::with_credentials(GcpCredentials::fixed("t"), Endpoints::default()).unwrap()
    }

    #[test]
    fn test_bigquery_urls() {
        let client = client();
        assert_eq!(
            client.bigquery_table_url("demo-host", "inv", "compute_googleapis_com_Address"),
            "https://bigquery.googleapis.com/bigquery/v2/projects/demo-host/datasets/inv/tables/compute_googleapis_com_Address"
        );
        assert_eq!(
            client.bigquery_upload_url("demo-host"),
            "https://bigquery.googleapis.com/upload/bigquery/v2/projects/demo-host/jobs?uploadType=multipart"
        );
    }

    #[test]
    fn test_compute_urls() {
        let client = client();
        assert_eq!(
            client.compute_regional_url("demo-host", "us-east1", "addresses", "ip-1"),
            "https://compute.googleapis.com/compute/v1/projects/demo-host/regions/us-east1/addresses/ip-1"
        );
        assert_eq!(
            client.compute_global_url("demo-host", "backendServices", "web"),
            "https://compute.googleapis.com/compute/v1/projects/demo-host/global/backendServices/web"
        );
    }

    #[test]
    fn test_rooted_endpoints_keep_paths() {
        let endpoints = Endpoints::rooted_at("http://127.0.0.1:9999/");
        assert_eq!(endpoints.bigquery, "http://127.0.0.1:9999/bigquery/v2");
        assert_eq!(endpoints.cloudasset, "http://127.0.0.1:9999/v1");
    }
}
