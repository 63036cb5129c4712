//! Cloud Storage buckets, plus the bucket labelling write used by the
//! tagging helper

use super::fetcher::{list_all, str_field, str_or};
use crate::gcp::client::GcpClient;
use crate::inventory::records::BucketRecord;
use crate::inventory::{CategorySource, Listing, TagSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct StorageSource {
    client: GcpClient,
}

impl StorageSource {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

fn versioning(bucket: &Value) -> String {
    let enabled = bucket
        .get("versioning")
        .and_then(|v| v.get("enabled"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if enabled { "Enabled" } else { "Disabled" }.to_string()
}

fn encryption(bucket: &Value) -> String {
    bucket
        .get("encryption")
        .and_then(|e| str_field(e, "defaultKmsKeyName"))
        .unwrap_or_else(|| "Not configured".to_string())
}

#[async_trait]
impl CategorySource<BucketRecord> for StorageSource {
    async fn list(&self) -> Result<Vec<Listing>> {
        let url = self.client.storage_url(&format!(
            "b?project={}",
            urlencoding::encode(&self.client.project_id)
        ));
        let items = list_all(&self.client, &url, "items")
            .await
            .context("Listing Cloud Storage buckets")?;

        Ok(items
            .into_iter()
            .map(|item| {
                let name = str_or(&item, "name", "-");
                Listing::new(name.clone(), name)
                    .with_tags(TagSet::from_labels(item.get("labels")))
                    .with_raw(item)
            })
            .collect())
    }

    async fn enrich(&self, listing: &Listing) -> Result<BucketRecord> {
        let bucket = self
            .client
            .get(&self.client.storage_bucket_url(&listing.id))
            .await?;

        Ok(BucketRecord {
            bucket_name: listing.name.clone(),
            creation_date: str_field(&bucket, "timeCreated"),
            region: str_or(&bucket, "location", "US"),
            storage_class: str_or(&bucket, "storageClass", "STANDARD"),
            versioning: versioning(&bucket),
            encryption: encryption(&bucket),
        })
    }
}

/// Writes one label onto a bucket
#[async_trait]
pub trait BucketTagger: Send + Sync {
    async fn put_bucket_tag(&self, bucket: &str, key: &str, value: &str) -> Result<()>;
}

/// Label writes through the Cloud Storage JSON API
pub struct GcsBucketTagger {
    client: GcpClient,
}

impl GcsBucketTagger {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BucketTagger for GcsBucketTagger {
    /// Replace `key` in the bucket's labels, keeping every other label
    async fn put_bucket_tag(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
        let url = self.client.storage_bucket_url(bucket);
        let current = self
            .client
            .get(&format!("{}?fields=labels", url))
            .await
            .with_context(|| format!("Reading labels of bucket {}", bucket))?;

        let mut labels = TagSet::from_labels(current.get("labels"));
        labels.insert(key, value);

        self.client
            .patch(&url, &json!({ "labels": labels }))
            .await
            .with_context(|| format!("Updating labels of bucket {}", bucket))?;

        tracing::info!("Labelled bucket {} with {}={}", bucket, key, value);
        Ok(())
    }
}
