//! Raw data collection across the fleet
//!
//! The engine never talks to `kubectl` or AWS itself. Everything it needs
//! comes through a [`ClusterDataSource`]; [`FleetCollector`] drives one over
//! every cluster of the requested environments with a bounded worker pool.

mod r#loop;
mod snapshot;


pub use r#loop::{EnvironmentTarget, FleetCollector, FleetCollectorBuilder};
pub use snapshot::{ClusterSnapshot, EnvironmentSnapshot, Snapshot, SnapshotSource};

use crate::models::{ClusterContext, Credentials, Environment, RawUsage};
use anyhow::Result;

pub use async_trait::async_trait;

/// Source of raw cluster, node and pod data
///
/// Listing calls return an error when the cluster cannot be reached.
/// Utilization lookups return `None` when no metrics are available; they
/// never fail the cluster.
#[async_trait]
pub trait ClusterDataSource: Send + Sync {
    /// EKS cluster names in an environment
    async fn list_clusters(
        &self,
        environment: &Environment,
        credentials: &Credentials,
    ) -> Result<Vec<String>>;

    /// Node lines formatted as `name|cpuCapacity|memCapacity`
    async fn fetch_raw_node_lines(&self, cluster: &ClusterContext) -> Result<Vec<String>>;

    /// Pod lines formatted as `namespace|podName|nodeName`
    async fn fetch_raw_pod_lines(&self, cluster: &ClusterContext) -> Result<Vec<String>>;

    /// Current CPU and memory usage of one pod
    async fn fetch_pod_utilization(
        &self,
        cluster: &ClusterContext,
        namespace: &str,
        pod: &str,
    ) -> Option<RawUsage>;

    /// Current CPU and memory usage of one node
    async fn fetch_node_utilization(&self, cluster: &ClusterContext, node: &str) -> Option<RawUsage>;

    /// Deployment lines formatted as `namespace|name|desired|ready`
    async fn fetch_raw_deployment_lines(&self, _cluster: &ClusterContext) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// EC2 instance type backing a node
    async fn fetch_node_instance_type(&self, _cluster: &ClusterContext, _node: &str) -> Option<String> {
        None
    }
}
