//! Per-cluster aggregation
//!
//! Turns the raw node, pod and deployment lines of one cluster into a
//! [`ClusterReport`]. Every problem below the cluster level is local: the
//! offending line or entity is dropped, a [`CollectionWarning`] is recorded
//! and aggregation carries on.

use crate::classifier::NamespaceClassifier;
use crate::collector::ClusterDataSource;
use crate::config::DEFAULT_TOP_N;
use crate::error::{CollectionWarning, ParseError};
use crate::models::{
    ClusterContext, ClusterReport, ClusterStatus, DeploymentSample, Environment, NamespaceGroup,
    NodeSample, PodSample, RawUsage,
};
use crate::units::{parse_cpu, parse_memory_quantity};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Fields of a `name|cpuCapacity|memCapacity` node line
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLine {
    pub name: String,
    pub cpu_capacity_cores: f64,
    pub mem_capacity_gib: f64,
}

/// Fields of a `namespace|podName|nodeName` pod line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodLine {
    pub namespace: String,
    pub pod_name: String,
    pub node_name: String,
}

/// Parse a node line, converting capacities to cores and GiB
pub fn parse_node_line(line: &str) -> Result<NodeLine, CollectionWarning> {
    let fields: Vec<&str> = line.trim().split('|').collect();
    let [name, cpu, memory] = fields.as_slice() else {
        return Err(CollectionWarning::MalformedNodeLine {
            line: line.to_string(),
        });
    };

    if name.is_empty() {
        return Err(CollectionWarning::MalformedNodeLine {
            line: line.to_string(),
        });
    }

    let invalid = |e: ParseError| CollectionWarning::InvalidNodeCapacity {
        node: name.to_string(),
        reason: e.to_string(),
    };

    Ok(NodeLine {
        name: name.to_string(),
        cpu_capacity_cores: parse_cpu(cpu).map_err(invalid)?,
        mem_capacity_gib: parse_memory_quantity(memory).map_err(invalid)?,
    })
}

/// Parse a pod line; the node name may be empty for unscheduled pods
pub fn parse_pod_line(line: &str) -> Result<PodLine, CollectionWarning> {
    let fields: Vec<&str> = line.trim().split('|').collect();
    match fields.as_slice() {
        [namespace, pod_name, node_name] if !namespace.is_empty() && !pod_name.is_empty() => {
            Ok(PodLine {
                namespace: namespace.to_string(),
                pod_name: pod_name.to_string(),
                node_name: node_name.to_string(),
            })
        }
        _ => Err(CollectionWarning::MalformedPodLine {
            line: line.to_string(),
        }),
    }
}

/// Parse a `namespace|name|desired|ready` deployment line
///
/// Replica counts that are not plain numbers (kubectl prints `<no value>`
/// for a deployment with no ready replicas) count as 0.
pub fn parse_deployment_line(line: &str) -> Result<DeploymentSample, CollectionWarning> {
    let fields: Vec<&str> = line.trim().split('|').collect();
    match fields.as_slice() {
        [namespace, name, desired, ready] if !namespace.is_empty() && !name.is_empty() => {
            Ok(DeploymentSample {
                namespace: namespace.to_string(),
                name: name.to_string(),
                desired_replicas: desired.trim().parse().unwrap_or(0),
                ready_replicas: ready.trim().parse().unwrap_or(0),
            })
        }
        _ => Err(CollectionWarning::MalformedDeploymentLine {
            line: line.to_string(),
        }),
    }
}

/// Parse raw usage strings into (cores, GiB)
pub fn parse_usage(usage: &RawUsage) -> Result<(f64, f64), ParseError> {
    Ok((parse_cpu(&usage.cpu)?, parse_memory_quantity(&usage.memory)?))
}

/// The `n` highest entries by `metric`, ties kept in collection order
pub fn top_by<F>(pods: &[PodSample], n: usize, metric: F) -> Vec<PodSample>
where
    F: Fn(&PodSample) -> f64,
{
    let mut ranked: Vec<&PodSample> = pods.iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| metric(b).total_cmp(&metric(a)));
    ranked.into_iter().take(n).cloned().collect()
}

/// Builds [`ClusterReport`]s for the clusters of one environment
#[derive(Debug, Clone)]
pub struct ClusterAggregator {
    environment: Environment,
    classifier: NamespaceClassifier,
    top_n: usize,
}

impl ClusterAggregator {
    pub fn new(environment: Environment) -> Self {
        let classifier = NamespaceClassifier::for_environment(&environment);
        Self {
            environment,
            classifier,
            top_n: DEFAULT_TOP_N,
        }
    }

    /// Set the size of the top CPU / memory rankings
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Fetch raw lines for a cluster and aggregate them
    ///
    /// A failure to list nodes or pods makes the whole cluster unreachable.
    /// A failure to list deployments only costs the deployment inventory.
    pub async fn collect(&self, source: &dyn ClusterDataSource, cluster: &ClusterContext) -> ClusterReport {
        let node_lines = match source.fetch_raw_node_lines(cluster).await {
            Ok(lines) => lines,
            Err(e) => return self.unreachable(cluster, format!("{:#}", e)),
        };
        let pod_lines = match source.fetch_raw_pod_lines(cluster).await {
            Ok(lines) => lines,
            Err(e) => return self.unreachable(cluster, format!("{:#}", e)),
        };

        let mut extra_warnings = Vec::new();
        let deployment_lines = match source.fetch_raw_deployment_lines(cluster).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(cluster = %cluster.cluster, error = %e, "Failed to list deployments");
                extra_warnings.push(CollectionWarning::DeploymentsUnavailable {
                    reason: format!("{:#}", e),
                });
                Vec::new()
            }
        };

        let mut report = self
            .aggregate(cluster, &node_lines, &pod_lines, &deployment_lines, source)
            .await;

        if !extra_warnings.is_empty() {
            report.warnings.extend(extra_warnings);
            report.status = ClusterStatus::Degraded;
        }
        report
    }

    /// Aggregate already fetched raw lines into a report
    ///
    /// Pods are counted toward namespace and group tallies before their
    /// utilization is looked up, so a pod without metrics still shows in the
    /// tallies but not in `pods` or the rankings.
    pub async fn aggregate(
        &self,
        cluster: &ClusterContext,
        raw_node_lines: &[String],
        raw_pod_lines: &[String],
        raw_deployment_lines: &[String],
        source: &dyn ClusterDataSource,
    ) -> ClusterReport {
        let mut builder = ReportBuilder::new(&self.classifier);

        for line in non_empty(raw_node_lines) {
            match parse_node_line(line) {
                Ok(node) => {
                    let sample = self.build_node(source, cluster, node, &mut builder.warnings).await;
                    builder.nodes.push(sample);
                }
                Err(warning) => builder.warn(&cluster.cluster, warning),
            }
        }

        for line in non_empty(raw_pod_lines) {
            let pod = match parse_pod_line(line) {
                Ok(pod) => pod,
                Err(warning) => {
                    builder.warn(&cluster.cluster, warning);
                    continue;
                }
            };

            builder.count_pod(&pod.namespace);

            let usage = source
                .fetch_pod_utilization(cluster, &pod.namespace, &pod.pod_name)
                .await
                .filter(|u| !u.cpu.trim().is_empty());
            let Some(usage) = usage else {
                builder.warn(
                    &cluster.cluster,
                    CollectionWarning::PodMetricsUnavailable {
                        namespace: pod.namespace,
                        pod: pod.pod_name,
                    },
                );
                continue;
            };

            match parse_usage(&usage) {
                Ok((cpu, memory)) => builder.pods.push(PodSample {
                    namespace: pod.namespace,
                    pod_name: pod.pod_name,
                    node_name: pod.node_name,
                    cpu_util_cores: cpu,
                    mem_util_gib: memory,
                }),
                Err(e) => builder.warn(
                    &cluster.cluster,
                    CollectionWarning::InvalidPodMetrics {
                        namespace: pod.namespace,
                        pod: pod.pod_name,
                        reason: e.to_string(),
                    },
                ),
            }
        }

        for line in non_empty(raw_deployment_lines) {
            match parse_deployment_line(line) {
                Ok(deployment) => builder.deployments.push(deployment),
                Err(warning) => builder.warn(&cluster.cluster, warning),
            }
        }

        builder.finish(cluster, self.top_n)
    }

    async fn build_node(
        &self,
        source: &dyn ClusterDataSource,
        cluster: &ClusterContext,
        node: NodeLine,
        warnings: &mut Vec<CollectionWarning>,
    ) -> NodeSample {
        let instance_type = source.fetch_node_instance_type(cluster, &node.name).await;
        let usage = source
            .fetch_node_utilization(cluster, &node.name)
            .await
            .and_then(|u| parse_usage(&u).ok());

        let (cpu_util_cores, mem_util_gib, metrics_available) = match usage {
            Some((cpu, memory)) => (cpu, memory, true),
            None => {
                debug!(cluster = %cluster.cluster, node = %node.name, "Node metrics unavailable");
                warnings.push(CollectionWarning::NodeMetricsUnavailable {
                    node: node.name.clone(),
                });
                (0.0, 0.0, false)
            }
        };

        NodeSample {
            name: node.name,
            instance_type,
            cpu_capacity_cores: node.cpu_capacity_cores,
            mem_capacity_gib: node.mem_capacity_gib,
            cpu_util_cores,
            mem_util_gib,
            metrics_available,
        }
    }

    /// Empty report for a cluster whose raw listings could not be fetched
    pub fn unreachable(&self, cluster: &ClusterContext, reason: impl Into<String>) -> ClusterReport {
        let reason = reason.into();
        warn!(cluster = %cluster.cluster, error = %reason, "Cluster unreachable");
        ClusterReport::unreachable(cluster, self.classifier.group_labels(), reason)
    }
}

fn non_empty(lines: &[String]) -> impl Iterator<Item = &str> {
    lines.iter().map(|l| l.as_str()).filter(|l| !l.trim().is_empty())
}

/// Mutable state of a report under construction, owned by one worker
struct ReportBuilder<'a> {
    classifier: &'a NamespaceClassifier,
    nodes: Vec<NodeSample>,
    pods: Vec<PodSample>,
    deployments: Vec<DeploymentSample>,
    namespace_counts: BTreeMap<String, usize>,
    group_counts: Vec<NamespaceGroup>,
    warnings: Vec<CollectionWarning>,
}

impl<'a> ReportBuilder<'a> {
    fn new(classifier: &'a NamespaceClassifier) -> Self {
        Self {
            classifier,
            nodes: Vec::new(),
            pods: Vec::new(),
            deployments: Vec::new(),
            namespace_counts: BTreeMap::new(),
            group_counts: classifier
                .group_labels()
                .into_iter()
                .map(NamespaceGroup::empty)
                .collect(),
            warnings: Vec::new(),
        }
    }

    fn count_pod(&mut self, namespace: &str) {
        *self.namespace_counts.entry(namespace.to_string()).or_insert(0) += 1;

        let label = self.classifier.classify(namespace);
        if let Some(group) = self.group_counts.iter_mut().find(|g| g.label == label) {
            group.count += 1;
        }
    }

    fn warn(&mut self, cluster: &str, warning: CollectionWarning) {
        debug!(cluster = %cluster, warning = %warning, "Collection warning");
        self.warnings.push(warning);
    }

    fn finish(self, cluster: &ClusterContext, top_n: usize) -> ClusterReport {
        let top_cpu_pods = top_by(&self.pods, top_n, |p| p.cpu_util_cores);
        let top_mem_pods = top_by(&self.pods, top_n, |p| p.mem_util_gib);
        let status = if self.warnings.is_empty() {
            ClusterStatus::Complete
        } else {
            ClusterStatus::Degraded
        };

        ClusterReport {
            cluster_name: cluster.cluster.clone(),
            environment: cluster.environment.clone(),
            region: cluster.region.clone(),
            status,
            collected_at: chrono::Utc::now().timestamp(),
            nodes: self.nodes,
            pods: self.pods,
            deployments: self.deployments,
            namespace_counts: self.namespace_counts,
            group_counts: self.group_counts,
            top_cpu_pods,
            top_mem_pods,
            warnings: self.warnings,
        }
    }
}
