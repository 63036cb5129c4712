//! GCP backend for the inventory
//!
//! One [`CategorySource`](crate::inventory::CategorySource) per category, all
//! sharing a single [`GcpClient`]. GCP labels play the role of tags.
//!
//! # Module Structure
//!
//! - [`fetcher`] - Paginated listing and JSON field helpers
//! - [`compute`] - Compute Engine instances, disks and firewall rules
//! - [`database`] - BigQuery tables
//! - [`storage`] - Cloud Storage buckets and the bucket label writer
//! - [`networking`] - Forwarding rules, backend services and health checks
//! - [`serverless`] - Cloud Functions
//! - [`api_gateway`] - API Gateway APIs, configs and gateways
//! - [`openapi`] - Routes from OpenAPI documents

pub mod api_gateway;
pub mod compute;
pub mod database;
pub mod fetcher;
pub mod networking;
pub mod openapi;
pub mod serverless;
pub mod storage;

use crate::gcp::client::GcpClient;
use crate::inventory::{Aggregator, CategorySources, ProviderIdentity, ProviderSession};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;

pub use storage::{BucketTagger, GcsBucketTagger};

pub const PROVIDER: &str = "gcp";

/// Session check: a usable token and a project to inventory
pub struct GcpSession {
    client: GcpClient,
}

impl GcpSession {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderSession for GcpSession {
    async fn identify(&self) -> Result<ProviderIdentity> {
        if self.client.project_id.trim().is_empty() {
            bail!("No GCP project configured");
        }
        self.client
            .get_token()
            .await
            .context("Failed to obtain GCP credentials")?;

        Ok(ProviderIdentity {
            provider: PROVIDER.to_string(),
            project: self.client.project_id.clone(),
        })
    }
}

/// Aggregator wired to every GCP category source
pub fn gcp_aggregator(client: &GcpClient) -> Aggregator {
    let sources = CategorySources {
        compute: Box::new(compute::ComputeSource::new(client.clone())),
        database: Box::new(database::DatabaseSource::new(client.clone())),
        storage: Box::new(storage::StorageSource::new(client.clone())),
        networking: Box::new(networking::NetworkingSource::new(client.clone())),
        serverless: Box::new(serverless::ServerlessSource::new(client.clone())),
        api_gateway: Box::new(api_gateway::ApiGatewaySource::new(client.clone())),
    };
    Aggregator::new(Box::new(GcpSession::new(client.clone())), sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::GcpCredentials;
    use crate::gcp::client::GcpEndpoints;

    #[tokio::test]
    async fn test_session_identifies_project() {
        let client = GcpClient::with_credentials(
            "my-project",
            GcpCredentials::from_token("t"),
            GcpEndpoints::default(),
        )
        .unwrap();
        let identity = GcpSession::new(client).identify().await.unwrap();
        assert_eq!(identity.provider, "gcp");
        assert_eq!(identity.project, "my-project");
    }

    #[tokio::test]
    async fn test_session_requires_project() {
        let client =
            GcpClient::with_credentials("", GcpCredentials::from_token("t"), GcpEndpoints::default())
                .unwrap();
        assert!(GcpSession::new(client).identify().await.is_err());
    }
}
