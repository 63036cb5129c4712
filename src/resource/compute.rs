//! Compute Engine instances
//!
//! Volumes come from the attached disks; security groups are the ingress
//! firewall rules of the instance's network that apply to it. The firewall
//! listing is fetched once per listing pass and shared by every instance.

use super::fetcher::{
    extract_short_name, list_aggregated, list_all, project_relative_path, str_field, str_list,
    str_or, u64_field,
};
use crate::gcp::client::GcpClient;
use crate::inventory::records::{InboundRule, InstanceRecord, SecurityGroupRecord, VolumeRecord};
use crate::inventory::{CategorySource, Listing, TagSet};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

pub struct ComputeSource {
    client: GcpClient,
    firewalls: Mutex<Option<Vec<Value>>>,
}

impl ComputeSource {
    pub fn new(client: GcpClient) -> Self {
        Self {
            client,
            firewalls: Mutex::new(None),
        }
    }

    async fn volume(&self, attached: &Value) -> Result<VolumeRecord> {
        let source = str_or(attached, "source", "");
        let path = project_relative_path(&source)
            .with_context(|| format!("Unexpected disk source: {}", source))?;
        let disk = self.client.get(&self.client.compute_url(path)).await?;

        let encrypted = disk
            .get("diskEncryptionKey")
            .and_then(|key| str_field(key, "kmsKeyName"))
            .unwrap_or_else(|| "google-managed".to_string());

        Ok(VolumeRecord {
            volume_id: str_or(&disk, "name", &extract_short_name(&source)),
            size_gb: u64_field(&disk, "sizeGb").unwrap_or(0),
            volume_type: extract_short_name(&str_or(&disk, "type", "-")),
            boot: attached.get("boot").and_then(|v| v.as_bool()).unwrap_or(false),
            encrypted,
        })
    }

    async fn security_groups(
        &self,
        instance: &Value,
        network: &str,
    ) -> Result<Vec<SecurityGroupRecord>> {
        let mut cached = self.firewalls.lock().await;
        if cached.is_none() {
            let listed = list_all(
                &self.client,
                &self.client.compute_global_url("firewalls"),
                "items",
            )
            .await?;
            *cached = Some(listed);
        }
        let firewalls = cached.as_deref().unwrap_or_default();

        let target = FirewallTarget::of(instance, network);

        Ok(firewalls
            .iter()
            .filter(|fw| target.matches(fw))
            .map(|fw| SecurityGroupRecord {
                group_id: str_or(fw, "id", "-"),
                group_name: str_or(fw, "name", "-"),
                inbound_rules: inbound_rules(fw),
            })
            .collect())
    }
}

/// What an ingress firewall rule can select an instance by
struct FirewallTarget<'a> {
    network: &'a str,
    tags: Vec<String>,
    service_accounts: Vec<String>,
}

impl<'a> FirewallTarget<'a> {
    fn of(instance: &Value, network: &'a str) -> Self {
        Self {
            network,
            tags: instance
                .get("tags")
                .map(|tags| str_list(tags, "items"))
                .unwrap_or_default(),
            service_accounts: instance
                .get("serviceAccounts")
                .and_then(|v| v.as_array())
                .map(|accounts| accounts.iter().filter_map(|a| str_field(a, "email")).collect())
                .unwrap_or_default(),
        }
    }

    /// Whether an enabled ingress rule on the same network selects this instance
    fn matches(&self, firewall: &Value) -> bool {
        let direction = str_or(firewall, "direction", "INGRESS");
        let disabled = firewall
            .get("disabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if direction != "INGRESS" || disabled {
            return false;
        }
        if extract_short_name(&str_or(firewall, "network", "")) != self.network {
            return false;
        }

        let target_tags = str_list(firewall, "targetTags");
        let target_accounts = str_list(firewall, "targetServiceAccounts");
        if target_tags.is_empty() && target_accounts.is_empty() {
            return true;
        }
        target_tags.iter().any(|tag| self.tags.contains(tag))
            || target_accounts
                .iter()
                .any(|account| self.service_accounts.contains(account))
    }
}

fn inbound_rules(firewall: &Value) -> Vec<InboundRule> {
    let sources = {
        let mut sources = str_list(firewall, "sourceRanges");
        sources.extend(str_list(firewall, "sourceTags"));
        sources
    };

    firewall
        .get("allowed")
        .and_then(|v| v.as_array())
        .map(|allowed| {
            allowed
                .iter()
                .map(|rule| InboundRule {
                    protocol: str_or(rule, "IPProtocol", "all"),
                    ports: str_list(rule, "ports"),
                    sources: sources.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl CategorySource<InstanceRecord> for ComputeSource {
    async fn list(&self) -> Result<Vec<Listing>> {
        *self.firewalls.lock().await = None;

        let items = list_aggregated(&self.client, &self.client.compute_aggregated_url("instances"))
            .await
            .context("Listing Compute Engine instances")?;

        Ok(items
            .into_iter()
            .map(|item| {
                let name = str_or(&item, "name", "-");
                Listing::new(str_or(&item, "id", &name), name)
                    .with_tags(TagSet::from_labels(item.get("labels")))
                    .with_raw(item)
            })
            .collect())
    }

    async fn enrich(&self, listing: &Listing) -> Result<InstanceRecord> {
        let instance = &listing.raw;
        let nic = instance
            .get("networkInterfaces")
            .and_then(|v| v.as_array())
            .and_then(|nics| nics.first());

        let network = nic
            .and_then(|nic| str_field(nic, "network"))
            .map(|n| extract_short_name(&n));

        let mut volumes = Vec::new();
        if let Some(disks) = instance.get("disks").and_then(|v| v.as_array()) {
            for attached in disks {
                match self.volume(attached).await {
                    Ok(volume) => volumes.push(volume),
                    Err(e) => tracing::warn!("Skipping disk of instance {}: {:#}", listing.name, e),
                }
            }
        }

        let security_groups = match &network {
            Some(network) => self.security_groups(instance, network).await?,
            None => Vec::new(),
        };

        Ok(InstanceRecord {
            instance_id: listing.id.clone(),
            name: listing.name.clone(),
            instance_type: extract_short_name(&str_or(instance, "machineType", "-")),
            state: str_or(instance, "status", "UNKNOWN").to_lowercase(),
            zone: str_field(instance, "zone").map(|z| extract_short_name(&z)),
            subnetwork: nic
                .and_then(|nic| str_field(nic, "subnetwork"))
                .map(|s| extract_short_name(&s)),
            network,
            private_ip: nic.and_then(|nic| str_field(nic, "networkIP")),
            public_ip: nic
                .and_then(|nic| nic.get("accessConfigs"))
                .and_then(|v| v.as_array())
                .and_then(|configs| configs.iter().find_map(|c| str_field(c, "natIP"))),
            cpu_platform: str_field(instance, "cpuPlatform"),
            launch_time: str_field(instance, "lastStartTimestamp")
                .or_else(|| str_field(instance, "creationTimestamp")),
            volumes,
            security_groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target<'a>(network: &'a str, instance: Value) -> FirewallTarget<'a> {
        FirewallTarget::of(&instance, network)
    }

    #[test]
    fn test_firewall_without_targets_applies_to_network() {
        let fw = json!({
            "network": "https://www.googleapis.com/compute/v1/projects/p/global/networks/default",
            "allowed": [{"IPProtocol": "tcp", "ports": ["22"]}],
            "sourceRanges": ["0.0.0.0/0"]
        });
        assert!(target("default", json!({})).matches(&fw));
        assert!(!target("prod-vpc", json!({})).matches(&fw));
    }

    #[test]
    fn test_firewall_target_tags_must_intersect() {
        let fw = json!({
            "network": "global/networks/default",
            "targetTags": ["web"],
        });
        assert!(target("default", json!({"tags": {"items": ["web"]}})).matches(&fw));
        assert!(!target("default", json!({"tags": {"items": ["db"]}})).matches(&fw));
    }

    #[test]
    fn test_egress_and_disabled_rules_are_ignored() {
        let egress = json!({"network": "networks/default", "direction": "EGRESS"});
        let disabled = json!({"network": "networks/default", "disabled": true});
        assert!(!target("default", json!({})).matches(&egress));
        assert!(!target("default", json!({})).matches(&disabled));
    }

    #[test]
    fn test_firewall_target_service_accounts() {
        let fw = json!({
            "network": "global/networks/default",
            "targetServiceAccounts": ["web@p.iam.gserviceaccount.com"],
        });
        let runs_as = |email: &str| {
            json!({"serviceAccounts": [{"email": email, "scopes": []}]})
        };
        assert!(target("default", runs_as("web@p.iam.gserviceaccount.com")).matches(&fw));
        assert!(!target("default", runs_as("db@p.iam.gserviceaccount.com")).matches(&fw));
        assert!(!target("default", json!({})).matches(&fw));
    }

    #[test]
    fn test_inbound_rules_carry_sources() {
        let fw = json!({
            "allowed": [
                {"IPProtocol": "tcp", "ports": ["80", "443"]},
                {"IPProtocol": "icmp"}
            ],
            "sourceRanges": ["10.0.0.0/8"]
        });
        let rules = inbound_rules(&fw);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].ports, vec!["80", "443"]);
        assert!(rules[1].ports.is_empty());
        assert_eq!(rules[1].sources, vec!["10.0.0.0/8"]);
    }
}
