//! GCP API interaction module
//!
//! This module provides the core functionality for interacting with Google Cloud Platform
//! APIs: authentication, the HTTP client and per-service URL construction.
//!
//! # Module Structure
//!
//! - [`auth`] - Access tokens from the environment or Application Default Credentials
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use appinv::gcp::client::GcpClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new("my-project").await?;
//!     let buckets = client.get(&client.storage_url("b?project=my-project")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
