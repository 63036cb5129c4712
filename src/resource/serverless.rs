//! Cloud Functions (2nd gen)

use super::fetcher::{extract_short_name, list_all, str_field, str_or, u64_field};
use crate::gcp::client::GcpClient;
use crate::inventory::records::FunctionRecord;
use crate::inventory::{CategorySource, Listing, TagSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub struct ServerlessSource {
    client: GcpClient,
}

impl ServerlessSource {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

fn function_record(name: &str, function: &Value) -> FunctionRecord {
    let build = function.get("buildConfig").unwrap_or(&Value::Null);
    let service = function.get("serviceConfig").unwrap_or(&Value::Null);

    FunctionRecord {
        function_name: extract_short_name(name),
        runtime: str_or(build, "runtime", "-"),
        handler: str_or(build, "entryPoint", "-"),
        memory: str_or(service, "availableMemory", "256M"),
        timeout_seconds: u64_field(service, "timeoutSeconds"),
        last_modified: str_field(function, "updateTime"),
        state: str_or(function, "state", "STATE_UNSPECIFIED"),
        function_url: str_field(function, "url").or_else(|| str_field(service, "uri")),
    }
}

#[async_trait]
impl CategorySource<FunctionRecord> for ServerlessSource {
    async fn list(&self) -> Result<Vec<Listing>> {
        let items = list_all(
            &self.client,
            &self.client.functions_url("-", "functions"),
            "functions",
        )
        .await
        .context("Listing Cloud Functions")?;

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let name = str_field(&item, "name")?;
                Some(
                    Listing::new(name.clone(), extract_short_name(&name))
                        .with_tags(TagSet::from_labels(item.get("labels")))
                        .with_raw(item),
                )
            })
            .collect())
    }

    async fn enrich(&self, listing: &Listing) -> Result<FunctionRecord> {
        let function = self
            .client
            .get(&self.client.functions_resource_url(&listing.id))
            .await?;
        Ok(function_record(&listing.id, &function))
    }
}
