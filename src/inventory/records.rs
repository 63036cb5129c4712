//! Category-specific resource records
//!
//! Each category keeps its own schema; nothing here is forced into a common
//! shape. Fields that a provider may omit are `Option`s and are left out of
//! the serialized report when absent.

use serde::Serialize;

// =============================================================================
// Compute
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub name: String,
    pub instance_type: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_time: Option<String>,
    pub volumes: Vec<VolumeRecord>,
    pub security_groups: Vec<SecurityGroupRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeRecord {
    pub volume_id: String,
    pub size_gb: u64,
    pub volume_type: String,
    pub boot: bool,
    /// `google-managed` or the customer-managed key name
    pub encrypted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityGroupRecord {
    pub group_id: String,
    pub group_name: String,
    pub inbound_rules: Vec<InboundRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundRule {
    pub protocol: String,
    pub ports: Vec<String>,
    pub sources: Vec<String>,
}

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRecord {
    pub table_name: String,
    pub dataset: String,
    pub table_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    pub size_bytes: u64,
    pub item_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitioning: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clustering: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<KeyField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRecord {
    pub bucket_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    pub region: String,
    pub storage_class: String,
    pub versioning: String,
    pub encryption: String,
}

// =============================================================================
// Networking
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerRecord {
    pub name: String,
    pub ip_address: String,
    pub scheme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub listeners: Vec<ListenerRecord>,
    pub target_groups: Vec<TargetGroupRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerRecord {
    pub protocol: String,
    pub port_range: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetGroupRecord {
    pub name: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
    pub health_checks: Vec<HealthCheckRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckRecord {
    pub name: String,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

// =============================================================================
// Serverless
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionRecord {
    pub function_name: String,
    pub runtime: String,
    pub handler: String,
    pub memory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_url: Option<String>,
}

// =============================================================================
// API gateway
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRecord {
    pub api_name: String,
    pub api_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_service: Option<String>,
    pub configs: Vec<ApiConfigRecord>,
    pub stages: Vec<StageRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiConfigRecord {
    pub config_id: String,
    pub state: String,
    pub routes: Vec<RouteRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRecord {
    pub path: String,
    pub methods: Vec<MethodRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodRecord {
    pub http_method: String,
    pub authorization: String,
    pub api_key_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_hostname: Option<String>,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
}
