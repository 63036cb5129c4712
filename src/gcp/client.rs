//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication,
//! HTTP functionality and per-service URL builders.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;

/// Base URLs of every GCP service the inventory talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpEndpoints {
    pub compute: String,
    pub storage: String,
    pub storage_upload: String,
    pub bigquery: String,
    pub functions: String,
    pub apigateway: String,
    pub iam_credentials: String,
    /// Host used when building signed object URLs
    pub signed_url_host: String,
}

impl Default for GcpEndpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            storage: "https://storage.googleapis.com/storage/v1".to_string(),
            storage_upload: "https://storage.googleapis.com/upload/storage/v1".to_string(),
            bigquery: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            functions: "https://cloudfunctions.googleapis.com/v2".to_string(),
            apigateway: "https://apigateway.googleapis.com/v1".to_string(),
            iam_credentials: "https://iamcredentials.googleapis.com/v1".to_string(),
            signed_url_host: "storage.googleapis.com".to_string(),
        }
    }
}

impl GcpEndpoints {
    /// Route every service through one base URL (local emulators, mock servers)
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            compute: format!("{}/compute/v1", base),
            storage: format!("{}/storage/v1", base),
            storage_upload: format!("{}/upload/storage/v1", base),
            bigquery: format!("{}/bigquery/v2", base),
            functions: format!("{}/v2", base),
            apigateway: format!("{}/v1", base),
            iam_credentials: format!("{}/v1", base),
            signed_url_host: "storage.googleapis.com".to_string(),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub endpoints: GcpEndpoints,
}

impl GcpClient {
    /// Create a new GCP client against the public Google endpoints
    pub async fn new(project_id: &str) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Self::with_credentials(project_id, credentials, GcpEndpoints::default())
    }

    /// Create a client from explicit credentials and endpoints
    pub fn with_credentials(
        project_id: &str,
        credentials: GcpCredentials,
        endpoints: GcpEndpoints,
    ) -> Result<Self> {
        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            project_id: project_id.to_string(),
            endpoints,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    /// Upload raw bytes with the given content type
    pub async fn upload(&self, url: &str, bytes: Vec<u8>, content_type: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.post_bytes(url, &token, bytes, content_type).await
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoints.compute, self.project_id, path
        )
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, resource: &str) -> String {
        self.compute_url(&format!("global/{}", resource))
    }

    /// Build aggregated Compute Engine API URL (all zones / regions)
    pub fn compute_aggregated_url(&self, resource: &str) -> String {
        self.compute_url(&format!("aggregated/{}", resource))
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.storage, path)
    }

    /// Build Cloud Storage bucket URL
    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage media upload URL for one object
    pub fn storage_upload_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/b/{}/o?uploadType=media&name={}",
            self.endpoints.storage_upload,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        )
    }

    // =========================================================================
    // BigQuery API helpers
    // =========================================================================

    /// Build BigQuery API URL scoped to the current project
    pub fn bigquery_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoints.bigquery, self.project_id, path
        )
    }

    // =========================================================================
    // Cloud Functions API helpers
    // =========================================================================

    /// Build Cloud Functions (v2) URL for a location (`-` for all)
    pub fn functions_url(&self, location: &str, path: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/{}",
            self.endpoints.functions, self.project_id, location, path
        )
    }

    /// Build a Cloud Functions URL from a full resource name
    pub fn functions_resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoints.functions, name)
    }

    // =========================================================================
    // API Gateway helpers
    // =========================================================================

    /// Build API Gateway URL for a location
    pub fn apigateway_url(&self, location: &str, path: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/{}",
            self.endpoints.apigateway, self.project_id, location, path
        )
    }

    /// Build an API Gateway URL from a full resource name
    pub fn apigateway_resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoints.apigateway, name)
    }

    // =========================================================================
    // IAM Credentials helpers
    // =========================================================================

    /// Build the signBlob URL for a service account
    pub fn sign_blob_url(&self, service_account: &str) -> String {
        format!(
            "{}/projects/-/serviceAccounts/{}:signBlob",
            self.endpoints.iam_credentials,
            urlencoding::encode(service_account)
        )
    }
}

/// Format a GCP API error for display
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    super::http::format_gcp_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GcpClient {
        GcpClient::with_credentials(
            "test-project",
            GcpCredentials::from_token("t"),
            GcpEndpoints::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_compute_urls() {
        let client = client();
        assert_eq!(
            client.compute_aggregated_url("instances"),
            "https://compute.googleapis.com/compute/v1/projects/test-project/aggregated/instances"
        );
        assert_eq!(
            client.compute_global_url("firewalls"),
            "https://compute.googleapis.com/compute/v1/projects/test-project/global/firewalls"
        );
    }

    #[test]
    fn test_upload_url_encodes_object_name() {
        let client = client();
        assert_eq!(
            client.storage_upload_url("docs", "documentation/a b.html"),
            "https://storage.googleapis.com/upload/storage/v1/b/docs/o?uploadType=media&name=documentation%2Fa%20b.html"
        );
    }

    #[test]
    fn test_rooted_endpoints() {
        let endpoints = GcpEndpoints::rooted_at("http://127.0.0.1:8080/");
        assert_eq!(endpoints.compute, "http://127.0.0.1:8080/compute/v1");
        assert_eq!(endpoints.functions, "http://127.0.0.1:8080/v2");
        assert_eq!(endpoints.signed_url_host, "storage.googleapis.com");
    }
}
