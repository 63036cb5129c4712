//! Application inventory
//!
//! Provider-neutral core: the ownership rule, category records, the report
//! model and the aggregator that builds it from injected category sources.
//!
//! # Module Structure
//!
//! - [`tags`] - `AppId`, `TagSet` and the `app_id` ownership rule
//! - [`records`] - Category-specific resource records
//! - [`report`] - Report, sections and YAML / JSON encodings
//! - [`source`] - Capability traits implemented by provider backends
//! - [`aggregator`] - Fan-out / filter / merge over all categories

pub mod aggregator;
pub mod records;
pub mod report;
pub mod source;
pub mod tags;

pub use aggregator::{Aggregator, CategorySources};
pub use report::{Category, CategoryStatus, Report, ReportFormat, Section};
pub use source::{CategorySource, Listing, ProviderIdentity, ProviderSession};
pub use tags::{AppId, TagSet, OWNERSHIP_TAG};
