//! Render, upload and link a report

use super::html::render_html;
use super::store::{DocumentStore, MAX_LINK_TTL};
use crate::inventory::Report;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

pub const DEFAULT_PREFIX: &str = "documentation";
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Where documents go and how long their links live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub bucket: Option<String>,
    pub prefix: String,
    pub link_ttl: Duration,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: DEFAULT_PREFIX.to_string(),
            link_ttl: MAX_LINK_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDocument {
    pub bucket: String,
    pub key: String,
    pub url: String,
}

pub struct Publisher {
    store: Box<dyn DocumentStore>,
    settings: PublishSettings,
}

impl Publisher {
    pub fn new(store: Box<dyn DocumentStore>, settings: PublishSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    pub async fn publish(&self, report: &Report) -> Result<PublishedDocument> {
        let Some(bucket) = self.settings.bucket.as_deref().filter(|b| !b.trim().is_empty())
        else {
            bail!("No documentation bucket configured (set docs_bucket or APPINV_DOCS_BUCKET)");
        };

        let key = object_key(
            &self.settings.prefix,
            report.metadata.app_id.as_str(),
            report.metadata.generated_at,
        );
        let html = render_html(report)?;

        self.store
            .put_object(bucket, &key, html.into_bytes(), HTML_CONTENT_TYPE)
            .await?;
        let url = self
            .store
            .signed_url(bucket, &key, self.settings.link_ttl.min(MAX_LINK_TTL))
            .await?;

        tracing::info!("Published documentation for app_id={} to {}", report.metadata.app_id, key);

        Ok(PublishedDocument {
            bucket: bucket.to_string(),
            key,
            url,
        })
    }
}

/// `<prefix>/infrastructure-doc-<app_id>-<YYYYmmdd-HHMMSS>.html`
pub fn object_key(prefix: &str, app_id: &str, generated_at: DateTime<Utc>) -> String {
    let name = format!(
        "infrastructure-doc-{}-{}.html",
        app_id,
        generated_at.format("%Y%m%d-%H%M%S")
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}
