//! Resource Aggregator
//!
//! Fans out over every category in [`Category::ALL`] order, filters each
//! listing by the ownership tag, enriches survivors and merges the results into
//! one [`Report`]. Failures are settled at the smallest granularity:
//!
//! - a tag lookup or enrichment failure drops that one resource,
//! - a listing failure drops that one category,
//! - only a provider session failure aborts the run.
//!
//! Everything runs sequentially; each provider call completes before the next
//! one starts.

use super::records::{
    ApiRecord, BucketRecord, FunctionRecord, InstanceRecord, LoadBalancerRecord, TableRecord,
};
use super::report::{Category, CategoryStatus, Report, ReportMetadata, Section};
use super::source::{CategorySource, Listing, ProviderSession};
use super::tags::AppId;
use anyhow::{Context, Result};
use chrono::Utc;

/// One source per category
pub struct CategorySources {
    pub compute: Box<dyn CategorySource<InstanceRecord>>,
    pub database: Box<dyn CategorySource<TableRecord>>,
    pub storage: Box<dyn CategorySource<BucketRecord>>,
    pub networking: Box<dyn CategorySource<LoadBalancerRecord>>,
    pub serverless: Box<dyn CategorySource<FunctionRecord>>,
    pub api_gateway: Box<dyn CategorySource<ApiRecord>>,
}

/// Result of processing one listed resource
#[derive(Debug)]
pub enum ResourceOutcome<R> {
    Kept(R),
    NotOwned,
    Failed(String),
}

/// Result of processing one whole category
#[derive(Debug)]
pub enum CategoryOutcome<R> {
    Matched(Vec<R>),
    Empty,
    Failed(String),
}

impl<R> CategoryOutcome<R> {
    fn settle(self, wrap: impl FnOnce(Vec<R>) -> Section) -> (CategoryStatus, Option<Section>) {
        match self {
            CategoryOutcome::Matched(records) => {
                (CategoryStatus::Matched(records.len()), Some(wrap(records)))
            },
            CategoryOutcome::Empty => (CategoryStatus::Empty, None),
            CategoryOutcome::Failed(reason) => (CategoryStatus::Failed(reason), None),
        }
    }
}

pub struct Aggregator {
    session: Box<dyn ProviderSession>,
    sources: CategorySources,
}

impl Aggregator {
    pub fn new(session: Box<dyn ProviderSession>, sources: CategorySources) -> Self {
        Self { session, sources }
    }

    /// Build the inventory report for one application
    pub async fn aggregate(&self, app_id: &AppId) -> Result<Report> {
        let identity = self
            .session
            .identify()
            .await
            .context("Failed to establish provider session")?;

        tracing::info!(
            "Aggregating resources for app_id={} in {}/{}",
            app_id,
            identity.provider,
            identity.project
        );

        let mut report = Report::new(ReportMetadata {
            app_id: app_id.clone(),
            generated_at: Utc::now(),
            provider: identity.provider,
            project: identity.project,
        });

        let sources = &self.sources;
        merge(
            &mut report,
            Category::Compute,
            sources.compute.as_ref(),
            app_id,
            Section::Compute,
        )
        .await;
        merge(
            &mut report,
            Category::Database,
            sources.database.as_ref(),
            app_id,
            Section::Database,
        )
        .await;
        merge(
            &mut report,
            Category::Storage,
            sources.storage.as_ref(),
            app_id,
            Section::Storage,
        )
        .await;
        merge(
            &mut report,
            Category::Networking,
            sources.networking.as_ref(),
            app_id,
            Section::Networking,
        )
        .await;
        merge(
            &mut report,
            Category::Serverless,
            sources.serverless.as_ref(),
            app_id,
            Section::Serverless,
        )
        .await;
        merge(
            &mut report,
            Category::ApiGateway,
            sources.api_gateway.as_ref(),
            app_id,
            Section::ApiGateway,
        )
        .await;

        tracing::info!(
            "Report for app_id={}: {} sections, {} resources",
            app_id,
            report.sections().len(),
            report.resource_count()
        );

        Ok(report)
    }
}

async fn merge<R>(
    report: &mut Report,
    category: Category,
    source: &dyn CategorySource<R>,
    app_id: &AppId,
    wrap: impl FnOnce(Vec<R>) -> Section,
) {
    let (status, section) = collect_category(category, source, app_id).await.settle(wrap);
    report.record(category, status, section);
}

/// List, filter and enrich one category
pub async fn collect_category<R>(
    category: Category,
    source: &dyn CategorySource<R>,
    app_id: &AppId,
) -> CategoryOutcome<R> {
    let listings = match source.list().await {
        Ok(listings) => listings,
        Err(e) => {
            tracing::warn!("Skipping {}: listing failed: {:#}", category, e);
            return CategoryOutcome::Failed(format!("{:#}", e));
        },
    };

    tracing::debug!("{}: {} resources listed", category, listings.len());

    let mut records = Vec::new();
    for listing in &listings {
        match examine(source, listing, app_id).await {
            ResourceOutcome::Kept(record) => records.push(record),
            ResourceOutcome::NotOwned => {},
            ResourceOutcome::Failed(reason) => {
                tracing::warn!("Skipping {} {}: {}", category, listing.id, reason);
            },
        }
    }

    if records.is_empty() {
        CategoryOutcome::Empty
    } else {
        CategoryOutcome::Matched(records)
    }
}

/// Tag lookup, ownership filter and enrichment for one listed resource
pub async fn examine<R>(
    source: &dyn CategorySource<R>,
    listing: &Listing,
    app_id: &AppId,
) -> ResourceOutcome<R> {
    let tags = match source.tags(listing).await {
        Ok(tags) => tags,
        Err(e) => return ResourceOutcome::Failed(format!("tag lookup failed: {:#}", e)),
    };

    if !tags.is_owned_by(app_id) {
        return ResourceOutcome::NotOwned;
    }

    match source.enrich(listing).await {
        Ok(record) => ResourceOutcome::Kept(record),
        Err(e) => ResourceOutcome::Failed(format!("enrichment failed: {:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::source::ProviderIdentity;
    use crate::inventory::tags::TagSet;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeSession {
        fail: bool,
    }

    #[async_trait]
    impl ProviderSession for FakeSession {
        async fn identify(&self) -> Result<ProviderIdentity> {
            if self.fail {
                return Err(anyhow!("no credentials"));
            }
            Ok(ProviderIdentity {
                provider: "fake".to_string(),
                project: "test-project".to_string(),
            })
        }
    }

    /// Source whose records are derived from the listing by `build`
    struct FakeSource<R> {
        listings: Option<Vec<Listing>>,
        lookup_tags: bool,
        failing: HashSet<String>,
        build: fn(&Listing) -> R,
        calls: Arc<AtomicUsize>,
    }

    impl<R> FakeSource<R> {
        fn new(listings: Vec<Listing>, build: fn(&Listing) -> R) -> Self {
            Self {
                listings: Some(listings),
                lookup_tags: false,
                failing: HashSet::new(),
                build,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_list(build: fn(&Listing) -> R) -> Self {
            let mut source = Self::new(Vec::new(), build);
            source.listings = None;
            source
        }

        fn failing_on(mut self, id: &str) -> Self {
            self.failing.insert(id.to_string());
            self
        }
    }

    #[async_trait]
    impl<R: Send + Sync + 'static> CategorySource<R> for FakeSource<R> {
        async fn list(&self) -> Result<Vec<Listing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.listings
                .clone()
                .ok_or_else(|| anyhow!("API request failed: 500 Internal Server Error"))
        }

        async fn tags(&self, listing: &Listing) -> Result<TagSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.lookup_tags && self.failing.contains(&format!("tags:{}", listing.id)) {
                return Err(anyhow!("tag lookup denied"));
            }
            Ok(listing.tags.clone().unwrap_or_default())
        }

        async fn enrich(&self, listing: &Listing) -> Result<R> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(&listing.id) {
                return Err(anyhow!("detail call failed"));
            }
            Ok((self.build)(listing))
        }
    }

    fn owned(id: &str, app: &str) -> Listing {
        Listing::new(id, id).with_tags([("app_id", app)].into_iter().collect())
    }

    fn instance(listing: &Listing) -> InstanceRecord {
        InstanceRecord {
            instance_id: listing.id.clone(),
            name: listing.name.clone(),
            instance_type: "e2-medium".to_string(),
            state: "running".to_string(),
            zone: None,
            network: None,
            subnetwork: None,
            private_ip: None,
            public_ip: None,
            cpu_platform: None,
            launch_time: None,
            volumes: Vec::new(),
            security_groups: Vec::new(),
        }
    }

    fn table(listing: &Listing) -> TableRecord {
        TableRecord {
            table_name: listing.name.clone(),
            dataset: "ds".to_string(),
            table_type: "TABLE".to_string(),
            creation_date: None,
            size_bytes: 0,
            item_count: 0,
            location: None,
            partitioning: None,
            clustering: Vec::new(),
            primary_key: None,
        }
    }

    fn bucket(listing: &Listing) -> BucketRecord {
        BucketRecord {
            bucket_name: listing.name.clone(),
            creation_date: None,
            region: "US".to_string(),
            storage_class: "STANDARD".to_string(),
            versioning: "Disabled".to_string(),
            encryption: "Not configured".to_string(),
        }
    }

    fn load_balancer(listing: &Listing) -> LoadBalancerRecord {
        LoadBalancerRecord {
            name: listing.name.clone(),
            ip_address: "10.0.0.1".to_string(),
            scheme: "EXTERNAL".to_string(),
            network: None,
            region: None,
            listeners: Vec::new(),
            target_groups: Vec::new(),
        }
    }

    fn function(listing: &Listing) -> FunctionRecord {
        FunctionRecord {
            function_name: listing.name.clone(),
            runtime: "python312".to_string(),
            handler: "main".to_string(),
            memory: "256M".to_string(),
            timeout_seconds: Some(60),
            last_modified: None,
            state: "ACTIVE".to_string(),
            function_url: None,
        }
    }

    fn api(listing: &Listing) -> ApiRecord {
        ApiRecord {
            api_name: listing.name.clone(),
            api_id: listing.id.clone(),
            created_date: None,
            managed_service: None,
            configs: Vec::new(),
            stages: Vec::new(),
        }
    }

    fn sources_with(
        compute: FakeSource<InstanceRecord>,
        storage: FakeSource<BucketRecord>,
        serverless: FakeSource<FunctionRecord>,
    ) -> CategorySources {
        CategorySources {
            compute: Box::new(compute),
            database: Box::new(FakeSource::new(vec![owned("t1", "other")], table)),
            storage: Box::new(storage),
            networking: Box::new(FakeSource::new(vec![owned("lb1", "100")], load_balancer)),
            serverless: Box::new(serverless),
            api_gateway: Box::new(FakeSource::new(vec![], api)),
        }
    }

    fn app() -> AppId {
        AppId::new("100").unwrap()
    }

    #[tokio::test]
    async fn test_single_running_instance() {
        let sources = sources_with(
            FakeSource::new(vec![owned("i-1", "100")], instance),
            FakeSource::new(vec![], bucket),
            FakeSource::new(vec![], function),
        );
        let aggregator = Aggregator::new(Box::new(FakeSession { fail: false }), sources);

        let report = aggregator.aggregate(&app()).await.unwrap();

        let Some(Section::Compute(instances)) = report.section(Category::Compute) else {
            panic!("compute section missing");
        };
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].state, "running");
        assert!(instances[0].volumes.is_empty());
        assert!(instances[0].security_groups.is_empty());
    }

    #[tokio::test]
    async fn test_sections_in_fixed_order_and_never_empty() {
        let sources = sources_with(
            FakeSource::new(vec![owned("i-1", "100")], instance),
            FakeSource::new(vec![owned("b-1", "100"), owned("b-2", "200")], bucket),
            FakeSource::new(vec![owned("f-1", "100")], function),
        );
        let aggregator = Aggregator::new(Box::new(FakeSession { fail: false }), sources);

        let report = aggregator.aggregate(&app()).await.unwrap();

        let categories: Vec<Category> = report.sections().iter().map(Section::category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Compute,
                Category::Storage,
                Category::Networking,
                Category::Serverless
            ]
        );
        assert!(report.sections().iter().all(|s| !s.is_empty()));
        assert_eq!(report.status(Category::Database), Some(&CategoryStatus::Empty));
        assert_eq!(report.status(Category::ApiGateway), Some(&CategoryStatus::Empty));
    }

    #[tokio::test]
    async fn test_listing_failure_skips_only_that_category() {
        let sources = sources_with(
            FakeSource::failing_list(instance),
            FakeSource::new(vec![owned("b-1", "100")], bucket),
            FakeSource::new(vec![owned("f-1", "100")], function),
        );
        let aggregator = Aggregator::new(Box::new(FakeSession { fail: false }), sources);

        let report = aggregator.aggregate(&app()).await.unwrap();

        assert!(report.section(Category::Compute).is_none());
        assert!(matches!(
            report.status(Category::Compute),
            Some(CategoryStatus::Failed(reason)) if reason.contains("500")
        ));
        assert!(report.section(Category::Storage).is_some());
        assert!(report.section(Category::Networking).is_some());
        assert!(report.section(Category::Serverless).is_some());
    }

    #[tokio::test]
    async fn test_enrichment_failure_drops_only_that_resource() {
        let storage = FakeSource::new(
            vec![owned("b-1", "100"), owned("b-2", "100"), owned("b-3", "100")],
            bucket,
        )
        .failing_on("b-2");
        let sources = sources_with(
            FakeSource::new(vec![], instance),
            storage,
            FakeSource::new(vec![], function),
        );
        let aggregator = Aggregator::new(Box::new(FakeSession { fail: false }), sources);

        let report = aggregator.aggregate(&app()).await.unwrap();

        let Some(Section::Storage(buckets)) = report.section(Category::Storage) else {
            panic!("storage section missing");
        };
        let names: Vec<&str> = buckets.iter().map(|b| b.bucket_name.as_str()).collect();
        assert_eq!(names, vec!["b-1", "b-3"]);
    }

    #[tokio::test]
    async fn test_tag_lookup_failure_drops_only_that_resource() {
        let mut compute = FakeSource::new(vec![owned("i-1", "100"), owned("i-2", "100")], instance)
            .failing_on("tags:i-1");
        compute.lookup_tags = true;

        let outcome = collect_category::<InstanceRecord>(Category::Compute, &compute, &app()).await;

        let CategoryOutcome::Matched(records) = outcome else {
            panic!("expected matched outcome");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, "i-2");
    }

    #[tokio::test]
    async fn test_untagged_and_mismatched_resources_are_excluded() {
        let listings = vec![
            Listing::new("i-untagged", "i-untagged"),
            Listing::new("i-other", "i-other")
                .with_tags([("env", "100"), ("owner", "100")].into_iter().collect()),
            owned("i-case", "App-100"),
            owned("i-mine", "App-100"),
        ];
        let source = FakeSource::new(listings, instance);
        let app_id = AppId::new("App-100").unwrap();
        let lower = AppId::new("app-100").unwrap();

        let CategoryOutcome::Matched(records) =
            collect_category::<InstanceRecord>(Category::Compute, &source, &app_id).await
        else {
            panic!("expected matches");
        };
        assert_eq!(records.len(), 2);

        let outcome = collect_category::<InstanceRecord>(Category::Compute, &source, &lower).await;
        assert!(matches!(outcome, CategoryOutcome::Empty));
    }

    #[tokio::test]
    async fn test_enrichment_only_for_owned_resources() {
        let source = FakeSource::new(vec![owned("a", "100"), owned("b", "200")], instance);
        let calls = source.calls.clone();

        let _ = collect_category::<InstanceRecord>(Category::Compute, &source, &app()).await;

        // one list, two tag lookups, one enrichment
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_matches_yields_empty_report() {
        let sources = CategorySources {
            compute: Box::new(FakeSource::new(vec![owned("i-1", "999")], instance)),
            database: Box::new(FakeSource::new(vec![], table)),
            storage: Box::new(FakeSource::new(vec![Listing::new("b", "b")], bucket)),
            networking: Box::new(FakeSource::new(vec![], load_balancer)),
            serverless: Box::new(FakeSource::new(vec![], function)),
            api_gateway: Box::new(FakeSource::new(vec![owned("api", "1000")], api)),
        };
        let aggregator = Aggregator::new(Box::new(FakeSession { fail: false }), sources);

        let report = aggregator.aggregate(&app()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.metadata.project, "test-project");
    }

    #[tokio::test]
    async fn test_session_failure_is_fatal_and_touches_no_category() {
        let compute = FakeSource::new(vec![owned("i-1", "100")], instance);
        let calls = compute.calls.clone();
        let sources = sources_with(
            compute,
            FakeSource::new(vec![], bucket),
            FakeSource::new(vec![], function),
        );
        let aggregator = Aggregator::new(Box::new(FakeSession { fail: true }), sources);

        let err = aggregator.aggregate(&app()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("no credentials"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
