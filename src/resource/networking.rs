//! Load balancers, discovered through their forwarding rules
//!
//! The forwarding rule is the listener. Its target is followed (proxy → URL
//! map → backend services, or a target pool) to find the target groups, and
//! each target group's health checks are resolved where possible.

use super::fetcher::{
    extract_short_name, list_aggregated, project_relative_path, str_field, str_list, str_or,
    u64_field,
};
use crate::gcp::client::GcpClient;
use crate::inventory::records::{
    HealthCheckRecord, ListenerRecord, LoadBalancerRecord, TargetGroupRecord,
};
use crate::inventory::{CategorySource, Listing, TagSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub struct NetworkingSource {
    client: GcpClient,
}

impl NetworkingSource {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }

    async fn get_link(&self, link: &str) -> Result<Value> {
        let path = project_relative_path(link)
            .with_context(|| format!("Unexpected resource link: {}", link))?;
        self.client.get(&self.client.compute_url(path)).await
    }

    /// Backend service (or target pool) links behind a forwarding rule
    async fn backend_links(&self, rule: &Value) -> Result<Vec<String>> {
        if let Some(service) = str_field(rule, "backendService") {
            return Ok(vec![service]);
        }
        let Some(target) = str_field(rule, "target") else {
            return Ok(Vec::new());
        };

        if target.contains("/targetPools/") {
            return Ok(vec![target]);
        }
        if target.contains("/targetTcpProxies/") || target.contains("/targetSslProxies/") {
            let proxy = self.get_link(&target).await?;
            return Ok(str_field(&proxy, "service").into_iter().collect());
        }
        if target.contains("/targetHttpProxies/") || target.contains("/targetHttpsProxies/") {
            let proxy = self.get_link(&target).await?;
            let Some(url_map) = str_field(&proxy, "urlMap") else {
                return Ok(Vec::new());
            };
            let url_map = self.get_link(&url_map).await?;
            return Ok(url_map_services(&url_map));
        }

        Ok(Vec::new())
    }

    async fn target_group(&self, link: &str) -> Result<TargetGroupRecord> {
        let backend = self.get_link(link).await?;

        let mut health_checks = Vec::new();
        for check in str_list(&backend, "healthChecks") {
            match self.get_link(&check).await {
                Ok(check) => health_checks.push(health_check(&check)),
                Err(e) => tracing::warn!("Skipping health check {}: {:#}", check, e),
            }
        }

        let is_pool = link.contains("/targetPools/");
        Ok(TargetGroupRecord {
            name: str_or(&backend, "name", &extract_short_name(link)),
            protocol: if is_pool {
                "TCP".to_string()
            } else {
                str_or(&backend, "protocol", "HTTP")
            },
            port_name: str_field(&backend, "portName"),
            timeout_sec: u64_field(&backend, "timeoutSec"),
            health_checks,
        })
    }
}

/// Distinct backend services referenced by a URL map, in document order
fn url_map_services(url_map: &Value) -> Vec<String> {
    let mut services: Vec<String> = Vec::new();
    let mut push = |link: Option<String>| {
        if let Some(link) = link {
            if link.contains("/backendServices/") && !services.contains(&link) {
                services.push(link);
            }
        }
    };

    push(str_field(url_map, "defaultService"));
    for matcher in url_map
        .get("pathMatchers")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
    {
        push(str_field(matcher, "defaultService"));
        for rule in matcher
            .get("pathRules")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
        {
            push(str_field(rule, "service"));
        }
    }
    services
}

/// Health check record from either a typed health check (`httpHealthCheck`,
/// `tcpHealthCheck`, ...) or a legacy HTTP health check
fn health_check(check: &Value) -> HealthCheckRecord {
    let typed = check.as_object().and_then(|obj| {
        obj.iter()
            .find(|(key, _)| key.ends_with("HealthCheck"))
            .map(|(_, value)| value)
    });
    let details = typed.unwrap_or(check);

    HealthCheckRecord {
        name: str_or(check, "name", "-"),
        protocol: str_or(check, "type", "HTTP"),
        port: u64_field(details, "port"),
        path: str_field(details, "requestPath"),
        interval: u64_field(check, "checkIntervalSec"),
        timeout: u64_field(check, "timeoutSec"),
    }
}

fn listener(rule: &Value) -> ListenerRecord {
    let port_range = str_field(rule, "portRange")
        .or_else(|| {
            let ports = str_list(rule, "ports");
            (!ports.is_empty()).then(|| ports.join(","))
        })
        .unwrap_or_else(|| "all".to_string());

    let target = str_field(rule, "target")
        .or_else(|| str_field(rule, "backendService"))
        .map(|t| extract_short_name(&t))
        .unwrap_or_else(|| "-".to_string());

    ListenerRecord {
        protocol: str_or(rule, "IPProtocol", "TCP"),
        port_range,
        target,
    }
}

#[async_trait]
impl CategorySource<LoadBalancerRecord> for NetworkingSource {
    async fn list(&self) -> Result<Vec<Listing>> {
        let items = list_aggregated(
            &self.client,
            &self.client.compute_aggregated_url("forwardingRules"),
        )
        .await
        .context("Listing forwarding rules")?;

        Ok(items
            .into_iter()
            .map(|item| {
                let name = str_or(&item, "name", "-");
                Listing::new(str_or(&item, "selfLink", &name), name)
                    .with_tags(TagSet::from_labels(item.get("labels")))
                    .with_raw(item)
            })
            .collect())
    }

    async fn enrich(&self, listing: &Listing) -> Result<LoadBalancerRecord> {
        let rule = &listing.raw;

        let mut target_groups = Vec::new();
        for link in self.backend_links(rule).await? {
            target_groups.push(self.target_group(&link).await?);
        }

        Ok(LoadBalancerRecord {
            name: listing.name.clone(),
            ip_address: str_or(rule, "IPAddress", "-"),
            scheme: str_or(rule, "loadBalancingScheme", "EXTERNAL"),
            network: str_field(rule, "network").map(|n| extract_short_name(&n)),
            region: str_field(rule, "region").map(|r| extract_short_name(&r)),
            listeners: vec![listener(rule)],
            target_groups,
        })
    }
}
