//! API Gateway APIs
//!
//! Each API carries its configs (with routes read from the embedded OpenAPI
//! documents) and its gateways, which serve as the API's stages.

use super::fetcher::{extract_short_name, list_all, str_field, str_or};
use super::openapi::routes_from_document;
use crate::gcp::client::GcpClient;
use crate::inventory::records::{ApiConfigRecord, ApiRecord, RouteRecord, StageRecord};
use crate::inventory::{CategorySource, Listing, TagSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;

pub struct ApiGatewaySource {
    client: GcpClient,
}

impl ApiGatewaySource {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }

    async fn config(&self, listed: &Value) -> Result<ApiConfigRecord> {
        let name = str_or(listed, "name", "");
        let url = format!("{}?view=FULL", self.client.apigateway_resource_url(&name));
        let config = self.client.get(&url).await?;

        Ok(ApiConfigRecord {
            config_id: extract_short_name(&name),
            state: str_or(&config, "state", "STATE_UNSPECIFIED"),
            routes: config_routes(&config)?,
        })
    }

    async fn stages(&self, api_id: &str) -> Result<Vec<StageRecord>> {
        let gateways = list_all(
            &self.client,
            &self.client.apigateway_url("-", "gateways"),
            "gateways",
        )
        .await?;

        Ok(gateways
            .iter()
            .filter(|gw| serves_api(gw, api_id))
            .map(|gw| StageRecord {
                stage_name: extract_short_name(&str_or(gw, "name", "-")),
                default_hostname: str_field(gw, "defaultHostname"),
                state: str_or(gw, "state", "STATE_UNSPECIFIED"),
                created_date: str_field(gw, "createTime"),
            })
            .collect())
    }
}

/// Whether a gateway's config belongs to the API with short id `api_id`.
///
/// Gateways may name their config with the project number while APIs use the
/// project id, so only the `/apis/<id>/configs/` segment is compared.
fn serves_api(gateway: &Value, api_id: &str) -> bool {
    let segment = format!("/apis/{}/configs/", api_id);
    str_field(gateway, "apiConfig").is_some_and(|config| config.contains(&segment))
}

/// Routes from every OpenAPI document of a fully-viewed config
fn config_routes(config: &Value) -> Result<Vec<RouteRecord>> {
    let mut routes = Vec::new();
    for document in config
        .get("openapiDocuments")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        let Some(contents) = document
            .get("document")
            .and_then(|d| str_field(d, "contents"))
        else {
            continue;
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(contents.as_bytes())
            .context("Decoding OpenAPI document")?;
        let text = String::from_utf8(bytes).context("OpenAPI document is not UTF-8")?;
        routes.extend(routes_from_document(&text)?);
    }
    Ok(routes)
}

#[async_trait]
impl CategorySource<ApiRecord> for ApiGatewaySource {
    async fn list(&self) -> Result<Vec<Listing>> {
        let items = list_all(
            &self.client,
            &self.client.apigateway_url("global", "apis"),
            "apis",
        )
        .await
        .context("Listing API Gateway APIs")?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let name = str_field(&item, "name")?;
                let display = str_field(&item, "displayName")
                    .unwrap_or_else(|| extract_short_name(&name));
                Some(
                    Listing::new(name, display)
                        .with_tags(TagSet::from_labels(item.get("labels")))
                        .with_raw(item),
                )
            })
            .collect())
    }

    async fn enrich(&self, listing: &Listing) -> Result<ApiRecord> {
        let configs_url = self
            .client
            .apigateway_resource_url(&format!("{}/configs", listing.id));
        let listed = list_all(&self.client, &configs_url, "apiConfigs").await?;

        let mut configs = Vec::new();
        for config in &listed {
            configs.push(self.config(config).await?);
        }

        let api_id = extract_short_name(&listing.id);
        let stages = match self.stages(&api_id).await {
            Ok(stages) => stages,
            Err(e) => {
                tracing::warn!("Skipping gateways of API {}: {:#}", listing.name, e);
                Vec::new()
            },
        };

        Ok(ApiRecord {
            api_name: listing.name.clone(),
            api_id,
            created_date: str_field(&listing.raw, "createTime"),
            managed_service: str_field(&listing.raw, "managedService"),
            configs,
            stages,
        })
    }
}
