//! Resource Fetcher
//!
//! Paginated listing and small JSON helpers shared by the GCP category sources.

use crate::gcp::client::GcpClient;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Fetch every page of a list endpoint, collecting the array at `items_path`
pub async fn list_all(client: &GcpClient, url: &str, items_path: &str) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page_url = with_page_token(url, page_token.as_deref());
        let response = client.get(&page_url).await?;
        all_items.extend(extract_items(&response, items_path));

        page_token = next_page_token(&response);
        if page_token.is_none() {
            break;
        }
    }

    Ok(all_items)
}

/// Fetch every page of a Compute Engine `aggregated/` endpoint, flattened
pub async fn list_aggregated(client: &GcpClient, url: &str) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page_url = with_page_token(url, page_token.as_deref());
        let response = client.get(&page_url).await?;
        all_items.extend(flatten_aggregated_items(&response));

        page_token = next_page_token(&response);
        if page_token.is_none() {
            break;
        }
    }

    Ok(all_items)
}

fn next_page_token(response: &Value) -> Option<String> {
    response
        .get("nextPageToken")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn with_page_token(url: &str, page_token: Option<&str>) -> String {
    match page_token {
        None => url.to_string(),
        Some(token) => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{}{}pageToken={}", url, separator, urlencoding::encode(token))
        },
    }
}

/// Extract the array found at a dot-separated path
pub fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    let mut current = response;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }
    current.as_array().cloned().unwrap_or_default()
}

/// Flatten an aggregated API response.
/// Aggregated responses have format: `{ "items": { "zones/us-central1-a": { "instances": [...] }, ... } }`
fn flatten_aggregated_items(response: &Value) -> Vec<Value> {
    let Some(items) = response.get("items").and_then(|v| v.as_object()) else {
        return vec![];
    };

    let mut all_items = Vec::new();
    for scope_data in items.values() {
        let Some(obj) = scope_data.as_object() else {
            continue;
        };
        for (key, value) in obj {
            // Scopes without resources only carry a warning
            if key == "warning" {
                continue;
            }
            if let Some(arr) = value.as_array() {
                all_items.extend(arr.iter().cloned());
            }
        }
    }
    all_items
}

/// Extract short name from GCP resource URL
/// e.g., "https://www.googleapis.com/compute/v1/projects/my-project/zones/us-central1-a" -> "us-central1-a"
pub fn extract_short_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Path of a self link relative to its project,
/// e.g. ".../projects/p/zones/z/disks/d" -> "zones/z/disks/d"
pub fn project_relative_path(link: &str) -> Option<&str> {
    let (_, after) = link.split_once("/projects/")?;
    let (_, rest) = after.split_once('/')?;
    (!rest.is_empty()).then_some(rest)
}

/// String field, if present
pub fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// String field or `default`
pub fn str_or(item: &Value, key: &str, default: &str) -> String {
    str_field(item, key).unwrap_or_else(|| default.to_string())
}

/// Integer field; GCP encodes int64 values as JSON strings
pub fn u64_field(item: &Value, key: &str) -> Option<u64> {
    match item.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Array of strings at `key`
pub fn str_list(item: &Value, key: &str) -> Vec<String> {
    item.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Convert a millisecond epoch (BigQuery timestamps) to RFC 3339
pub fn millis_to_rfc3339(millis: u64) -> Option<String> {
    let millis = i64::try_from(millis).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_aggregated_items_skips_warnings() {
        let response = json!({
            "items": {
                "zones/us-central1-a": {"instances": [{"name": "a"}, {"name": "b"}]},
                "zones/us-east1-b": {"warning": {"code": "NO_RESULTS_ON_PAGE"}},
                "zones/europe-west1-b": {"instances": [{"name": "c"}]}
            }
        });
        let names: Vec<String> = flatten_aggregated_items(&response)
            .iter()
            .filter_map(|v| str_field(v, "name"))
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"c".to_string()));
    }

    #[test]
    fn test_extract_items_by_path() {
        let response = json!({"a": {"b": [1, 2, 3]}});
        assert_eq!(extract_items(&response, "a.b").len(), 3);
        assert!(extract_items(&response, "a.missing").is_empty());
    }

    #[test]
    fn test_with_page_token() {
        assert_eq!(with_page_token("http://x/a", None), "http://x/a");
        assert_eq!(
            with_page_token("http://x/a?view=FULL", Some("t 2")),
            "http://x/a?view=FULL&pageToken=t%202"
        );
    }

    #[test]
    fn test_project_relative_path() {
        let link = "https://www.googleapis.com/compute/v1/projects/p1/zones/us-central1-a/disks/boot";
        assert_eq!(
            project_relative_path(link),
            Some("zones/us-central1-a/disks/boot")
        );
        assert_eq!(project_relative_path("disks/boot"), None);
    }

    #[test]
    fn test_u64_field_accepts_strings_and_numbers() {
        let item = json!({"sizeGb": "10", "port": 80, "bad": "x"});
        assert_eq!(u64_field(&item, "sizeGb"), Some(10));
        assert_eq!(u64_field(&item, "port"), Some(80));
        assert_eq!(u64_field(&item, "bad"), None);
    }

    #[test]
    fn test_millis_to_rfc3339() {
        assert_eq!(
            millis_to_rfc3339(1_700_000_000_000).as_deref(),
            Some("2023-11-14T22:13:20+00:00")
        );
    }
}
