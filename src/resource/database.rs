//! BigQuery tables

use super::fetcher::{list_all, millis_to_rfc3339, str_field, str_list, str_or, u64_field};
use crate::gcp::client::GcpClient;
use crate::inventory::records::{KeyField, TableRecord};
use crate::inventory::{CategorySource, Listing, TagSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub struct DatabaseSource {
    client: GcpClient,
}

impl DatabaseSource {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

fn table_reference(item: &Value) -> Option<(String, String)> {
    let reference = item.get("tableReference")?;
    Some((
        str_field(reference, "datasetId")?,
        str_field(reference, "tableId")?,
    ))
}

fn partitioning(table: &Value) -> Option<String> {
    let partitioning = table.get("timePartitioning")?;
    let kind = str_or(partitioning, "type", "DAY");
    Some(match str_field(partitioning, "field") {
        Some(field) => format!("{} ({})", kind, field),
        None => kind,
    })
}

#[async_trait]
impl CategorySource<TableRecord> for DatabaseSource {
    async fn list(&self) -> Result<Vec<Listing>> {
        let datasets = list_all(&self.client, &self.client.bigquery_url("datasets"), "datasets")
            .await
            .context("Listing BigQuery datasets")?;

        let mut listings = Vec::new();
        for dataset in &datasets {
            let Some(dataset_id) = dataset
                .get("datasetReference")
                .and_then(|r| str_field(r, "datasetId"))
            else {
                continue;
            };

            let url = self.client.bigquery_url(&format!("datasets/{}/tables", dataset_id));
            let tables = match list_all(&self.client, &url, "tables").await {
                Ok(tables) => tables,
                Err(e) => {
                    tracing::warn!("Skipping dataset {}: {:#}", dataset_id, e);
                    continue;
                },
            };

            for table in tables {
                let Some((dataset_id, table_id)) = table_reference(&table) else {
                    continue;
                };
                listings.push(
                    Listing::new(format!("{}.{}", dataset_id, table_id), table_id)
                        .with_tags(TagSet::from_labels(table.get("labels")))
                        .with_raw(table),
                );
            }
        }

        Ok(listings)
    }

    async fn enrich(&self, listing: &Listing) -> Result<TableRecord> {
        let (dataset_id, table_id) = table_reference(&listing.raw)
            .with_context(|| format!("Missing table reference for {}", listing.id))?;
        let url = self
            .client
            .bigquery_url(&format!("datasets/{}/tables/{}", dataset_id, table_id));
        let table = self.client.get(&url).await?;

        let primary_key = table
            .get("schema")
            .and_then(|s| s.get("fields"))
            .and_then(|f| f.as_array())
            .and_then(|fields| fields.first())
            .map(|field| KeyField {
                name: str_or(field, "name", "-"),
                field_type: str_or(field, "type", "-"),
            });

        let clustering = table
            .get("clustering")
            .map(|c| str_list(c, "fields"))
            .unwrap_or_default();

        Ok(TableRecord {
            table_name: table_id,
            dataset: dataset_id,
            table_type: str_or(&table, "type", "TABLE"),
            creation_date: u64_field(&table, "creationTime").and_then(millis_to_rfc3339),
            size_bytes: u64_field(&table, "numBytes").unwrap_or(0),
            item_count: u64_field(&table, "numRows").unwrap_or(0),
            location: str_field(&table, "location"),
            partitioning: partitioning(&table),
            clustering,
            primary_key,
        })
    }
}
