//! Object storage for published documents
//!
//! Cloud Storage implementation: media upload plus V4 signed URLs
//! (`GOOG4-RSA-SHA256`). The RSA signature comes from the IAM Credentials
//! `signBlob` API, so no private key ever touches the local machine.

use crate::gcp::client::GcpClient;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;

pub const SIGNING_ALGORITHM: &str = "GOOG4-RSA-SHA256";

/// Longest validity a V4 signed URL may have (7 days)
pub const MAX_LINK_TTL: Duration = Duration::from_secs(604_800);

/// Write an object and hand out a time-limited link to it
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    async fn signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;
}

pub struct GcsDocumentStore {
    client: GcpClient,
    signer: Option<String>,
}

impl GcsDocumentStore {
    /// `signer` is the service account whose key signs the URLs
    pub fn new(client: GcpClient, signer: Option<String>) -> Self {
        Self { client, signer }
    }

    async fn sign(&self, signer: &str, payload: &str) -> Result<String> {
        let body = json!({
            "payload": base64::engine::general_purpose::STANDARD.encode(payload.as_bytes())
        });
        let response = self
            .client
            .post(&self.client.sign_blob_url(signer), Some(&body))
            .await
            .with_context(|| format!("Signing with service account {}", signer))?;

        let signed = response
            .get("signedBlob")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("signBlob response has no signedBlob"))?;
        let signature = base64::engine::general_purpose::STANDARD
            .decode(signed)
            .context("Decoding signBlob signature")?;
        Ok(hex::encode(signature))
    }

    async fn signed_url_at(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let Some(signer) = self.signer.as_deref() else {
            bail!("No signer service account configured (set signer_service_account or APPINV_SIGNER)");
        };

        let request = V4Request::new(
            &self.client.endpoints.signed_url_host,
            bucket,
            key,
            signer,
            ttl,
            now,
        );
        let signature = self.sign(signer, &request.string_to_sign()).await?;
        let signed = request.url(&signature);

        url::Url::parse(&signed).with_context(|| format!("Malformed signed URL for {}", key))?;
        Ok(signed)
    }
}

#[async_trait]
impl DocumentStore for GcsDocumentStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let size = bytes.len();
        self.client
            .upload(
                &self.client.storage_upload_url(bucket, key),
                bytes,
                content_type,
            )
            .await
            .with_context(|| format!("Uploading gs://{}/{}", bucket, key))?;
        tracing::info!("Uploaded gs://{}/{} ({} bytes)", bucket, key, size);
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
        self.signed_url_at(bucket, key, ttl, Utc::now()).await
    }
}

/// The pieces of a V4 signed GET request
struct V4Request {
    host: String,
    path: String,
    datetime: String,
    scope: String,
    query: Vec<(&'static str, String)>,
}

impl V4Request {
    fn new(
        host: &str,
        bucket: &str,
        key: &str,
        signer: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let scope = format!("{}/auto/storage/goog4_request", now.format("%Y%m%d"));
        let expires = ttl.min(MAX_LINK_TTL).as_secs().max(1);

        let mut query = vec![
            ("X-Goog-Algorithm", SIGNING_ALGORITHM.to_string()),
            ("X-Goog-Credential", format!("{}/{}", signer, scope)),
            ("X-Goog-Date", datetime.clone()),
            ("X-Goog-Expires", expires.to_string()),
            ("X-Goog-SignedHeaders", "host".to_string()),
        ];
        query.sort();

        Self {
            host: host.to_string(),
            path: format!("/{}/{}", encode_path(bucket), encode_path(key)),
            datetime,
            scope,
            query,
        }
    }

    fn canonical_query(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn canonical_request(&self) -> String {
        format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            self.path,
            self.canonical_query(),
            self.host
        )
    }

    fn string_to_sign(&self) -> String {
        let digest = Sha256::digest(self.canonical_request().as_bytes());
        format!(
            "{}\n{}\n{}\n{}",
            SIGNING_ALGORITHM,
            self.datetime,
            self.scope,
            hex::encode(digest)
        )
    }

    fn url(&self, signature: &str) -> String {
        format!(
            "https://{}{}?{}&X-Goog-Signature={}",
            self.host,
            self.path,
            self.canonical_query(),
            signature
        )
    }
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> V4Request {
        V4Request::new(
            "storage.googleapis.com",
            "docs-bucket",
            "documentation/infrastructure-doc-100-20240301-123000.html",
            "signer@demo.iam.gserviceaccount.com",
            Duration::from_secs(3600),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(encode_path("a b/c+d.html"), "a%20b/c%2Bd.html");
    }

    #[test]
    fn test_canonical_query_is_sorted_and_encoded() {
        let query = request().canonical_query();
        assert!(query.starts_with("X-Goog-Algorithm=GOOG4-RSA-SHA256&X-Goog-Credential="));
        assert!(query.contains(
            "signer%40demo.iam.gserviceaccount.com%2F20240301%2Fauto%2Fstorage%2Fgoog4_request"
        ));
        assert!(query.contains("X-Goog-Date=20240301T123000Z"));
        assert!(query.ends_with("X-Goog-Expires=3600&X-Goog-SignedHeaders=host"));
    }

    #[test]
    fn test_string_to_sign_layout() {
        let request = request();
        let lines: Vec<String> = request
            .string_to_sign()
            .lines()
            .map(|l| l.to_string())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "GOOG4-RSA-SHA256");
        assert_eq!(lines[1], "20240301T123000Z");
        assert_eq!(lines[2], "20240301/auto/storage/goog4_request");
        assert_eq!(lines[3].len(), 64);
        assert!(request
            .canonical_request()
            .starts_with("GET\n/docs-bucket/documentation/infrastructure-doc-100-"));
    }

    #[test]
    fn test_expiry_is_clamped() {
        let request = V4Request::new(
            "storage.googleapis.com",
            "b",
            "k",
            "s",
            Duration::from_secs(10 * 86_400),
            Utc::now(),
        );
        assert!(request.canonical_query().contains("X-Goog-Expires=604800&"));
    }

    #[test]
    fn test_url_appends_signature() {
        let url = request().url("abcd");
        assert!(url.starts_with("https://storage.googleapis.com/docs-bucket/documentation/"));
        assert!(url.ends_with("&X-Goog-Signature=abcd"));
        assert!(url::Url::parse(&url).is_ok());
    }
}
