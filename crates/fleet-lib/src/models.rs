//! Core data models for the fleet inventory

use crate::error::CollectionWarning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One AWS account/region with its namespace suffix convention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub region: String,
    /// Ordered; first match wins. Empty means a single bucket.
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Reference used to resolve credentials, defaults to the environment name
    #[serde(default)]
    pub credentials_ref: Option<String>,
}

impl Environment {
    pub fn new(name: impl Into<String>, region: impl Into<String>, suffixes: &[&str]) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            credentials_ref: None,
        }
    }

    pub fn credentials_ref(&self) -> &str {
        self.credentials_ref.as_deref().unwrap_or(&self.name)
    }
}

/// Explicit AWS credentials handed to every data source call
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub reference: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl Credentials {
    /// Credentials carrying only a reference, for sources that need none
    pub fn anonymous(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("reference", &self.reference)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Everything a data source needs to address one cluster
#[derive(Debug, Clone)]
pub struct ClusterContext {
    pub environment: String,
    pub region: String,
    pub cluster: String,
    pub credentials: Credentials,
}

impl ClusterContext {
    pub fn new(environment: &Environment, cluster: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            environment: environment.name.clone(),
            region: environment.region.clone(),
            cluster: cluster.into(),
            credentials,
        }
    }
}

/// Raw CPU and memory usage strings as reported by the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUsage {
    pub cpu: String,
    pub memory: String,
}

impl RawUsage {
    pub fn new(cpu: impl Into<String>, memory: impl Into<String>) -> Self {
        Self {
            cpu: cpu.into(),
            memory: memory.into(),
        }
    }
}

/// One node at one observation instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSample {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    pub cpu_capacity_cores: f64,
    pub mem_capacity_gib: f64,
    pub cpu_util_cores: f64,
    pub mem_util_gib: f64,
    pub metrics_available: bool,
}

impl NodeSample {
    /// Memory utilization as a percentage of capacity, 0 when capacity is unknown
    pub fn mem_util_percent(&self) -> f64 {
        if self.mem_capacity_gib > 0.0 && self.mem_util_gib.is_finite() {
            self.mem_util_gib / self.mem_capacity_gib * 100.0
        } else {
            0.0
        }
    }
}

/// One pod with its utilization at one observation instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSample {
    pub namespace: String,
    pub pod_name: String,
    pub node_name: String,
    pub cpu_util_cores: f64,
    pub mem_util_gib: f64,
}

/// Replica state of one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSample {
    pub namespace: String,
    pub name: String,
    pub desired_replicas: u32,
    pub ready_replicas: u32,
}

impl DeploymentSample {
    pub fn is_fully_ready(&self) -> bool {
        self.ready_replicas >= self.desired_replicas
    }
}

/// A suffix group label with its pod count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceGroup {
    pub label: String,
    pub count: usize,
}

impl NamespaceGroup {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: 0,
        }
    }
}

/// Count for a label in an ordered group list, 0 when absent
pub fn group_count(groups: &[NamespaceGroup], label: &str) -> usize {
    groups
        .iter()
        .find(|g| g.label == label)
        .map(|g| g.count)
        .unwrap_or(0)
}

/// How completely a cluster was collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    /// Every line and metric was collected
    Complete,
    /// Collected with warnings, some entities missing
    Degraded,
    /// Raw listings could not be fetched
    Unreachable,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterStatus::Complete => "complete",
            ClusterStatus::Degraded => "degraded",
            ClusterStatus::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

/// Aggregated view of one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub cluster_name: String,
    pub environment: String,
    pub region: String,
    pub status: ClusterStatus,
    pub collected_at: i64,
    pub nodes: Vec<NodeSample>,
    pub pods: Vec<PodSample>,
    #[serde(default)]
    pub deployments: Vec<DeploymentSample>,
    pub namespace_counts: BTreeMap<String, usize>,
    /// Suffix order as configured, `others` last
    pub group_counts: Vec<NamespaceGroup>,
    pub top_cpu_pods: Vec<PodSample>,
    pub top_mem_pods: Vec<PodSample>,
    #[serde(default)]
    pub warnings: Vec<CollectionWarning>,
}

impl ClusterReport {
    /// Empty report for a cluster whose raw listings could not be fetched
    ///
    /// Every group in `group_labels` is present with a zero count.
    pub fn unreachable(
        cluster: &ClusterContext,
        group_labels: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            cluster_name: cluster.cluster.clone(),
            environment: cluster.environment.clone(),
            region: cluster.region.clone(),
            status: ClusterStatus::Unreachable,
            collected_at: chrono::Utc::now().timestamp(),
            nodes: Vec::new(),
            pods: Vec::new(),
            deployments: Vec::new(),
            namespace_counts: BTreeMap::new(),
            group_counts: group_labels.into_iter().map(NamespaceGroup::empty).collect(),
            top_cpu_pods: Vec::new(),
            top_mem_pods: Vec::new(),
            warnings: vec![CollectionWarning::ClusterUnreachable {
                cluster: cluster.cluster.clone(),
                reason: reason.into(),
            }],
        }
    }

    pub fn group_count(&self, label: &str) -> usize {
        group_count(&self.group_counts, label)
    }

    /// Pods counted from the pod listing, including those without metrics
    pub fn counted_pods(&self) -> usize {
        self.namespace_counts.values().sum()
    }

    pub fn total_cpu_capacity(&self) -> f64 {
        self.nodes.iter().map(|n| n.cpu_capacity_cores).sum()
    }

    pub fn total_cpu_util(&self) -> f64 {
        self.nodes.iter().map(|n| n.cpu_util_cores).sum()
    }

    pub fn total_mem_capacity_gib(&self) -> f64 {
        self.nodes.iter().map(|n| n.mem_capacity_gib).sum()
    }

    pub fn total_mem_util_gib(&self) -> f64 {
        self.nodes.iter().map(|n| n.mem_util_gib).sum()
    }
}

/// Per-suffix totals across all clusters of one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuffixSummary {
    pub environment: String,
    pub totals: Vec<NamespaceGroup>,
}

/// Aggregate over every collected cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    pub total_clusters: usize,
    pub total_nodes: usize,
    pub total_pods: usize,
    /// Sorted by environment, then cluster name
    pub clusters: Vec<ClusterReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix_summary: Option<SuffixSummary>,
    #[serde(default)]
    pub warnings: Vec<CollectionWarning>,
    /// False when the run was cancelled or hit its deadline
    pub complete: bool,
    pub generated_at: i64,
}

impl FleetReport {
    /// Fleet-level warnings followed by every cluster's warnings
    pub fn all_warnings(&self) -> impl Iterator<Item = (&str, &CollectionWarning)> {
        self.warnings.iter().map(|w| ("fleet", w)).chain(
            self.clusters
                .iter()
                .flat_map(|c| c.warnings.iter().map(move |w| (c.cluster_name.as_str(), w))),
        )
    }

    pub fn warning_count(&self) -> usize {
        self.all_warnings().count()
    }

    pub fn unreachable_clusters(&self) -> impl Iterator<Item = &ClusterReport> {
        self.clusters
            .iter()
            .filter(|c| c.status == ClusterStatus::Unreachable)
    }

    /// Pods in namespaces ending with `suffix`, across every cluster
    pub fn pods_with_suffix(&self, suffix: &str) -> usize {
        self.clusters
            .iter()
            .flat_map(|c| c.namespace_counts.iter())
            .filter(|(namespace, _)| namespace.ends_with(suffix))
            .map(|(_, count)| count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(capacity: f64, used: f64) -> NodeSample {
        NodeSample {
            name: "ip-10-0-0-1.ec2.internal".to_string(),
            instance_type: None,
            cpu_capacity_cores: 4.0,
            mem_capacity_gib: capacity,
            cpu_util_cores: 1.0,
            mem_util_gib: used,
            metrics_available: true,
        }
    }

    #[test]
    fn test_mem_util_percent() {
        assert!((node(16.0, 4.0).mem_util_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_mem_util_percent_zero_capacity() {
        let percent = node(0.0, 4.0).mem_util_percent();
        assert_eq!(percent, 0.0);
        assert!(!percent.is_nan());

        assert_eq!(node(-1.0, 4.0).mem_util_percent(), 0.0);
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials {
            reference: "DEV".to_string(),
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("very-secret".to_string()),
            session_token: Some("token".to_string()),
        };
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("token\""));
        assert!(creds.is_complete());
        assert!(!Credentials::anonymous("DEV").is_complete());
    }

    #[test]
    fn test_credentials_ref_defaults_to_name() {
        let mut env = Environment::new("dev", "us-east-1", &["dev"]);
        assert_eq!(env.credentials_ref(), "dev");
        env.credentials_ref = Some("DEV_ACCOUNT".to_string());
        assert_eq!(env.credentials_ref(), "DEV_ACCOUNT");
    }

    #[test]
    fn test_deployment_readiness() {
        let mut deployment = DeploymentSample {
            namespace: "app-dev".to_string(),
            name: "api".to_string(),
            desired_replicas: 3,
            ready_replicas: 2,
        };
        assert!(!deployment.is_fully_ready());
        deployment.ready_replicas = 3;
        assert!(deployment.is_fully_ready());
    }

    #[test]
    fn test_unreachable_report() {
        let env = Environment::new("dev", "us-east-1", &["dev"]);
        let ctx = ClusterContext::new(&env, "dev-core", Credentials::anonymous("DEV"));
        let report = ClusterReport::unreachable(
            &ctx,
            vec!["dev".to_string(), "others".to_string()],
            "i/o timeout",
        );

        assert_eq!(report.status, ClusterStatus::Unreachable);
        assert_eq!(report.group_counts.len(), 2);
        assert_eq!(report.counted_pods(), 0);
        assert!(report.warnings[0].is_cluster_level());
    }

    #[test]
    fn test_group_count_missing_label() {
        let groups = vec![NamespaceGroup {
            label: "dev".to_string(),
            count: 3,
        }];
        assert_eq!(group_count(&groups, "dev"), 3);
        assert_eq!(group_count(&groups, "devb"), 0);
    }
}
