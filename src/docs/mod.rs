//! Documentation publishing
//!
//! - [`html`] - Report to standalone HTML document
//! - [`store`] - Object storage and signed links
//! - [`publisher`] - Ties rendering, upload and linking together

pub mod html;
pub mod publisher;
pub mod store;

pub use html::render_html;
pub use publisher::{object_key, PublishSettings, PublishedDocument, Publisher};
pub use store::{DocumentStore, GcsDocumentStore, MAX_LINK_TTL};
