//! Capability interfaces the aggregator is built from
//!
//! A provider backend supplies one [`ProviderSession`] and one
//! [`CategorySource`] per resource category. The aggregator owns none of the
//! underlying connections; it only drives these traits.

use super::tags::TagSet;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Who the aggregator is talking to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider: String,
    pub project: String,
}

/// Provider connectivity, checked once before any category is processed
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// Establish (or verify) provider access. Failure here is fatal for the run.
    async fn identify(&self) -> Result<ProviderIdentity>;
}

/// One entry of an unfiltered category listing
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    /// Identifier the source uses for follow-up calls
    pub id: String,
    pub name: String,
    /// Present when the listing response already carries the tag set
    pub tags: Option<TagSet>,
    /// Raw listing payload, for enrichment
    pub raw: Value,
}

impl Listing {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: None,
            raw: Value::Null,
        }
    }

    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

/// List / tag / enrich capability for one resource category
#[async_trait]
pub trait CategorySource<R>: Send + Sync {
    /// List every resource of the category, unfiltered
    async fn list(&self) -> Result<Vec<Listing>>;

    /// Tag set of one listed resource. The default reads the tags embedded in
    /// the listing; sources whose listings lack them override this with a
    /// secondary lookup.
    async fn tags(&self, listing: &Listing) -> Result<TagSet> {
        listing
            .tags
            .clone()
            .ok_or_else(|| anyhow!("No tags in listing for {}", listing.id))
    }

    /// Detail calls for a resource that passed the ownership filter
    async fn enrich(&self, listing: &Listing) -> Result<R>;
}
