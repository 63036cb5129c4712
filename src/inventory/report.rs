//! Aggregate report model and its encodings
//!
//! A [`Report`] is assembled once per aggregation run and never mutated
//! afterwards. Sections appear in [`Category::ALL`] order and only when at
//! least one resource matched. Serialization is kept separate from assembly:
//! the same report can be emitted as YAML, JSON or an HTML document.

use super::records::{
    ApiRecord, BucketRecord, FunctionRecord, InstanceRecord, LoadBalancerRecord, TableRecord,
};
use super::tags::AppId;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

/// Resource category, in fixed processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Compute,
    Database,
    Storage,
    Networking,
    Serverless,
    ApiGateway,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Compute,
        Category::Database,
        Category::Storage,
        Category::Networking,
        Category::Serverless,
        Category::ApiGateway,
    ];

    /// Key used for the section in serialized reports
    pub fn key(self) -> &'static str {
        match self {
            Category::Compute => "compute",
            Category::Database => "database",
            Category::Storage => "storage",
            Category::Networking => "networking",
            Category::Serverless => "serverless",
            Category::ApiGateway => "api_gateway",
        }
    }

    /// Key of the resource list inside a section
    pub fn items_key(self) -> &'static str {
        match self {
            Category::Compute => "instances",
            Category::Database => "tables",
            Category::Storage => "buckets",
            Category::Networking => "load_balancers",
            Category::Serverless => "functions",
            Category::ApiGateway => "apis",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::Compute => "Compute",
            Category::Database => "Database",
            Category::Storage => "Storage",
            Category::Networking => "Networking",
            Category::Serverless => "Serverless",
            Category::ApiGateway => "API Gateway",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One non-empty category section
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Compute(Vec<InstanceRecord>),
    Database(Vec<TableRecord>),
    Storage(Vec<BucketRecord>),
    Networking(Vec<LoadBalancerRecord>),
    Serverless(Vec<FunctionRecord>),
    ApiGateway(Vec<ApiRecord>),
}

impl Section {
    pub fn category(&self) -> Category {
        match self {
            Section::Compute(_) => Category::Compute,
            Section::Database(_) => Category::Database,
            Section::Storage(_) => Category::Storage,
            Section::Networking(_) => Category::Networking,
            Section::Serverless(_) => Category::Serverless,
            Section::ApiGateway(_) => Category::ApiGateway,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Section::Compute(items) => items.len(),
            Section::Database(items) => items.len(),
            Section::Storage(items) => items.len(),
            Section::Networking(items) => items.len(),
            Section::Serverless(items) => items.len(),
            Section::ApiGateway(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-entry map `{ key: items }`
struct Keyed<'a, T>(&'static str, &'a [T]);

impl<T: Serialize> Serialize for Keyed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let key = self.category().items_key();
        match self {
            Section::Compute(items) => Keyed(key, items).serialize(serializer),
            Section::Database(items) => Keyed(key, items).serialize(serializer),
            Section::Storage(items) => Keyed(key, items).serialize(serializer),
            Section::Networking(items) => Keyed(key, items).serialize(serializer),
            Section::Serverless(items) => Keyed(key, items).serialize(serializer),
            Section::ApiGateway(items) => Keyed(key, items).serialize(serializer),
        }
    }
}

fn serialize_sections<S: Serializer>(
    sections: &[Section],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(sections.len()))?;
    for section in sections {
        map.serialize_entry(section.category().key(), section)?;
    }
    map.end()
}

/// What happened to one category during an aggregation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryStatus {
    Matched(usize),
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub app_id: AppId,
    pub generated_at: DateTime<Utc>,
    pub provider: String,
    pub project: String,
}

/// The merged, per-category inventory of one application
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(rename = "resources", serialize_with = "serialize_sections")]
    sections: Vec<Section>,
    #[serde(skip)]
    statuses: Vec<(Category, CategoryStatus)>,
}

impl Report {
    pub fn new(metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            sections: Vec::new(),
            statuses: Vec::new(),
        }
    }

    /// Record a category's status, adding its section when it has resources.
    /// Sections are kept in category order whatever order they arrive in.
    pub(crate) fn record(
        &mut self,
        category: Category,
        status: CategoryStatus,
        section: Option<Section>,
    ) {
        if let Some(section) = section.filter(|s| !s.is_empty() && s.category() == category) {
            let at = self
                .sections
                .iter()
                .position(|s| s.category() > category)
                .unwrap_or(self.sections.len());
            self.sections.insert(at, section);
        }
        self.statuses.push((category, status));
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, category: Category) -> Option<&Section> {
        self.sections.iter().find(|s| s.category() == category)
    }

    pub fn status(&self, category: Category) -> Option<&CategoryStatus> {
        self.statuses
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, status)| status)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of resources across sections
    pub fn resource_count(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to encode report as YAML")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to encode report as JSON")
    }

    /// Encode the report in the requested format
    pub fn encode(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Yaml => self.to_yaml(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Html => crate::docs::render_html(self),
        }
    }
}

/// Output encodings for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Yaml,
    Json,
    Html,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::records::BucketRecord;

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            app_id: AppId::new("100").unwrap(),
            generated_at: DateTime::parse_from_rfc3339("2026-10-19T08:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
            provider: "gcp".to_string(),
            project: "test-project".to_string(),
        }
    }

    fn bucket(name: &str) -> BucketRecord {
        BucketRecord {
            bucket_name: name.to_string(),
            creation_date: None,
            region: "US".to_string(),
            storage_class: "STANDARD".to_string(),
            versioning: "Disabled".to_string(),
            encryption: "Not configured".to_string(),
        }
    }

    #[test]
    fn test_empty_report_has_no_sections() {
        let report = Report::new(metadata());
        assert!(report.is_empty());
        let yaml = report.to_yaml().unwrap();
        assert!(yaml.contains("resources: {}"));
        assert!(yaml.contains("app_id: '100'"));
    }

    #[test]
    fn test_sections_follow_category_order() {
        let mut report = Report::new(metadata());
        report.record(
            Category::Storage,
            CategoryStatus::Matched(1),
            Some(Section::Storage(vec![bucket("b1")])),
        );
        report.record(
            Category::Compute,
            CategoryStatus::Matched(1),
            Some(Section::Compute(vec![])),
        );
        report.record(
            Category::Database,
            CategoryStatus::Matched(1),
            Some(Section::Database(vec![])),
        );
        report.record(
            Category::Networking,
            CategoryStatus::Matched(1),
            Some(Section::Storage(vec![bucket("mislabelled")])),
        );

        let categories: Vec<Category> = report.sections().iter().map(Section::category).collect();
        assert_eq!(categories, vec![Category::Storage]);
    }

    #[test]
    fn test_yaml_layout_nests_items_under_category() {
        let mut report = Report::new(metadata());
        report.record(
            Category::Storage,
            CategoryStatus::Matched(1),
            Some(Section::Storage(vec![bucket("assets")])),
        );

        let value: serde_yaml::Value = serde_yaml::from_str(&report.to_yaml().unwrap()).unwrap();
        let name = &value["resources"]["storage"]["buckets"][0]["bucket_name"];
        assert_eq!(name.as_str(), Some("assets"));
        assert!(value["resources"]["storage"]["buckets"][0]
            .get("creation_date")
            .is_none());
    }

    #[test]
    fn test_statuses_are_not_serialized() {
        let mut report = Report::new(metadata());
        report.record(
            Category::Compute,
            CategoryStatus::Failed("boom".to_string()),
            None,
        );
        assert_eq!(
            report.status(Category::Compute),
            Some(&CategoryStatus::Failed("boom".to_string()))
        );
        assert!(!report.to_json().unwrap().contains("boom"));
    }
}
