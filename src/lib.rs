//! appinv - discover, document and publish the GCP resources owned by an
//! application.
//!
//! Resources belong to an application when they carry the label
//! `app_id=<id>`. The [`inventory`] core aggregates them per category through
//! capability traits; [`resource`] implements those traits against the GCP
//! REST APIs; [`docs`] renders and publishes reports; [`router`] answers
//! agent requests.

pub mod config;
pub mod docs;
pub mod gcp;
pub mod inventory;
pub mod resource;
pub mod router;

/// Version injected at compile time via APPINV_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("APPINV_VERSION") {
    Some(v) => v,
    None => "dev",
};
