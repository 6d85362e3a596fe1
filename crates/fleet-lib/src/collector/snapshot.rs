//! File-backed data source
//!
//! A snapshot is a JSON capture of raw collector output: per environment, the
//! cluster list and for each cluster the same node/pod/deployment lines and
//! usage strings a live collector would return. It lets a collection run
//! offline, and is what the tests drive the engine with.

use super::ClusterDataSource;
use crate::models::{ClusterContext, Credentials, Environment, RawUsage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::fs;

/// Raw output captured for a whole fleet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentSnapshot>,
}

/// Raw output captured for one environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Set when cluster listing failed for this environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
    #[serde(default)]
    pub clusters: Vec<ClusterSnapshot>,
}

/// Raw output captured for one cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub name: String,
    /// Set when the cluster could not be reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unreachable: Option<String>,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub pods: Vec<String>,
    /// `None` when deployments could not be listed
    #[serde(default = "default_deployments")]
    pub deployments: Option<Vec<String>>,
    #[serde(default)]
    pub node_usage: HashMap<String, RawUsage>,
    /// Keyed by `namespace/pod`
    #[serde(default)]
    pub pod_usage: HashMap<String, RawUsage>,
    #[serde(default)]
    pub instance_types: HashMap<String, String>,
}

fn default_deployments() -> Option<Vec<String>> {
    Some(Vec::new())
}

impl ClusterSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deployments: default_deployments(),
            ..Default::default()
        }
    }

    pub fn unreachable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            unreachable: Some(reason.into()),
            ..Self::new(name)
        }
    }

    pub fn node(mut self, line: impl Into<String>) -> Self {
        self.nodes.push(line.into());
        self
    }

    pub fn node_usage(mut self, node: &str, cpu: &str, memory: &str) -> Self {
        self.node_usage.insert(node.to_string(), RawUsage::new(cpu, memory));
        self
    }

    pub fn pod(mut self, line: impl Into<String>) -> Self {
        self.pods.push(line.into());
        self
    }

    pub fn pod_usage(mut self, namespace: &str, pod: &str, cpu: &str, memory: &str) -> Self {
        self.pod_usage
            .insert(format!("{}/{}", namespace, pod), RawUsage::new(cpu, memory));
        self
    }

    pub fn deployment(mut self, line: impl Into<String>) -> Self {
        self.deployments.get_or_insert_with(Vec::new).push(line.into());
        self
    }

    pub fn instance_type(mut self, node: &str, instance_type: &str) -> Self {
        self.instance_types
            .insert(node.to_string(), instance_type.to_string());
        self
    }
}

impl Snapshot {
    pub fn with_environment(mut self, name: &str, environment: EnvironmentSnapshot) -> Self {
        self.environments.insert(name.to_string(), environment);
        self
    }
}

impl EnvironmentSnapshot {
    pub fn with_clusters(clusters: Vec<ClusterSnapshot>) -> Self {
        Self {
            listing_error: None,
            clusters,
        }
    }
}

/// [`ClusterDataSource`] answering from a [`Snapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        Ok(Self::new(snapshot))
    }

    fn cluster(&self, cluster: &ClusterContext) -> Result<&ClusterSnapshot> {
        let environment = self
            .snapshot
            .environments
            .get(&cluster.environment)
            .with_context(|| format!("No snapshot for environment {}", cluster.environment))?;

        environment
            .clusters
            .iter()
            .find(|c| c.name == cluster.cluster)
            .with_context(|| format!("No snapshot for cluster {}", cluster.cluster))
    }

    fn reachable_cluster(&self, cluster: &ClusterContext) -> Result<&ClusterSnapshot> {
        let snapshot = self.cluster(cluster)?;
        if let Some(reason) = &snapshot.unreachable {
            anyhow::bail!("{}", reason);
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl ClusterDataSource for SnapshotSource {
    async fn list_clusters(
        &self,
        environment: &Environment,
        _credentials: &Credentials,
    ) -> Result<Vec<String>> {
        let Some(env) = self.snapshot.environments.get(&environment.name) else {
            return Ok(Vec::new());
        };

        if let Some(reason) = &env.listing_error {
            anyhow::bail!("{}", reason);
        }

        Ok(env.clusters.iter().map(|c| c.name.clone()).collect())
    }

    async fn fetch_raw_node_lines(&self, cluster: &ClusterContext) -> Result<Vec<String>> {
        Ok(self.reachable_cluster(cluster)?.nodes.clone())
    }

    async fn fetch_raw_pod_lines(&self, cluster: &ClusterContext) -> Result<Vec<String>> {
        Ok(self.reachable_cluster(cluster)?.pods.clone())
    }

    async fn fetch_pod_utilization(
        &self,
        cluster: &ClusterContext,
        namespace: &str,
        pod: &str,
    ) -> Option<RawUsage> {
        self.reachable_cluster(cluster)
            .ok()?
            .pod_usage
            .get(&format!("{}/{}", namespace, pod))
            .cloned()
    }

    async fn fetch_node_utilization(&self, cluster: &ClusterContext, node: &str) -> Option<RawUsage> {
        self.reachable_cluster(cluster)
            .ok()?
            .node_usage
            .get(node)
            .cloned()
    }

    async fn fetch_raw_deployment_lines(&self, cluster: &ClusterContext) -> Result<Vec<String>> {
        self.reachable_cluster(cluster)?
            .deployments
            .clone()
            .context("Deployments not captured")
    }

    async fn fetch_node_instance_type(&self, cluster: &ClusterContext, node: &str) -> Option<String> {
        self.reachable_cluster(cluster)
            .ok()?
            .instance_types
            .get(node)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(environment: &str, cluster: &str) -> ClusterContext {
        ClusterContext::new(
            &Environment::new(environment, "us-east-1", &[]),
            cluster,
            Credentials::anonymous(environment),
        )
    }

    #[tokio::test]
    async fn test_load_snapshot_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        let json = r#"{
            "environments": {
                "dev": {
                    "clusters": [
                        {
                            "name": "dev-core",
                            "nodes": ["ip-10-0-0-1|4|16091792Ki"],
                            "pods": ["app-dev|api-0|ip-10-0-0-1"],
                            "node_usage": {"ip-10-0-0-1": {"cpu": "512m", "memory": "4096Mi"}},
                            "pod_usage": {"app-dev/api-0": {"cpu": "12m", "memory": "256Mi"}}
                        }
                    ]
                }
            }
        }"#;
        fs::write(&path, json).await.unwrap();

        let source = SnapshotSource::load(&path).await.unwrap();
        let env = Environment::new("dev", "us-east-1", &["dev"]);
        let clusters = source
            .list_clusters(&env, &Credentials::anonymous("dev"))
            .await
            .unwrap();
        assert_eq!(clusters, vec!["dev-core"]);

        let ctx = context("dev", "dev-core");
        assert_eq!(source.fetch_raw_node_lines(&ctx).await.unwrap().len(), 1);
        assert_eq!(
            source.fetch_pod_utilization(&ctx, "app-dev", "api-0").await,
            Some(RawUsage::new("12m", "256Mi"))
        );
        assert_eq!(source.fetch_pod_utilization(&ctx, "app-dev", "api-1").await, None);
        // deployments default to an empty capture
        assert!(source.fetch_raw_deployment_lines(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = SnapshotSource::load(&temp_dir.path().join("missing.json")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_cluster() {
        let snapshot = Snapshot::default().with_environment(
            "dev",
            EnvironmentSnapshot::with_clusters(vec![ClusterSnapshot::unreachable(
                "dev-core",
                "connection refused",
            )]),
        );
        let source = SnapshotSource::new(snapshot);
        let ctx = context("dev", "dev-core");

        let err = source.fetch_raw_node_lines(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(source.fetch_node_utilization(&ctx, "any").await.is_none());
    }

    #[tokio::test]
    async fn test_listing_error() {
        let snapshot = Snapshot::default().with_environment(
            "prod",
            EnvironmentSnapshot {
                listing_error: Some("AccessDenied".to_string()),
                clusters: vec![],
            },
        );
        let source = SnapshotSource::new(snapshot);
        let env = Environment::new("prod", "us-east-1", &[]);
        assert!(source
            .list_clusters(&env, &Credentials::anonymous("prod"))
            .await
            .is_err());

        let unknown = Environment::new("accp", "us-east-1", &[]);
        assert!(source
            .list_clusters(&unknown, &Credentials::anonymous("accp"))
            .await
            .unwrap()
            .is_empty());
    }
}
