//! Fleet-wide aggregation
//!
//! A [`FleetReport`] is a purely additive fold over [`ClusterReport`]s, so
//! it does not matter in which order clusters finish or how partial
//! reports are combined.

use crate::classifier::NamespaceClassifier;
use crate::error::CollectionWarning;
use crate::models::{ClusterReport, Environment, FleetReport, NamespaceGroup, SuffixSummary};

/// Folds cluster reports into a fleet report
#[derive(Debug, Clone, Default)]
pub struct FleetAggregator {
    suffix_view: Option<Environment>,
}

impl FleetAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also total each suffix group across the clusters of `environment`
    pub fn with_suffix_view(environment: Environment) -> Self {
        Self {
            suffix_view: Some(environment),
        }
    }

    pub fn aggregate(&self, reports: Vec<ClusterReport>) -> FleetReport {
        let mut clusters = reports;
        sort_clusters(&mut clusters);

        let suffix_summary = self.suffix_view.as_ref().map(|env| {
            let labels = NamespaceClassifier::for_environment(env).group_labels();
            summarize(&clusters, &env.name, &labels)
        });

        Self::fold(clusters, suffix_summary)
    }

    /// Aggregate and summarize suffix groups across the clusters of `environment`
    pub fn aggregate_for_environment(
        &self,
        reports: Vec<ClusterReport>,
        environment: &Environment,
    ) -> FleetReport {
        let mut clusters = reports;
        sort_clusters(&mut clusters);

        let labels = NamespaceClassifier::for_environment(environment).group_labels();
        let summary = summarize(&clusters, &environment.name, &labels);
        Self::fold(clusters, Some(summary))
    }

    fn fold(clusters: Vec<ClusterReport>, suffix_summary: Option<SuffixSummary>) -> FleetReport {
        FleetReport {
            total_clusters: clusters.len(),
            total_nodes: clusters.iter().map(|c| c.nodes.len()).sum(),
            total_pods: clusters.iter().map(|c| c.pods.len()).sum(),
            generated_at: clusters.iter().map(|c| c.collected_at).max().unwrap_or(0),
            suffix_summary,
            warnings: Vec::new(),
            complete: true,
            clusters,
        }
    }
}

impl FleetReport {
    /// Combine two partial fleet reports
    ///
    /// Totals add up, clusters and warnings are unioned in canonical order
    /// and a suffix summary is recomputed over the merged clusters.
    pub fn merge(self, other: FleetReport) -> FleetReport {
        let summary_shape = self
            .suffix_summary
            .as_ref()
            .or(other.suffix_summary.as_ref())
            .map(|s| {
                let labels: Vec<String> = s.totals.iter().map(|g| g.label.clone()).collect();
                (s.environment.clone(), labels)
            });

        let mut clusters = self.clusters;
        clusters.extend(other.clusters);
        sort_clusters(&mut clusters);

        let mut warnings = self.warnings;
        warnings.extend(other.warnings);
        sort_warnings(&mut warnings);

        FleetReport {
            total_clusters: self.total_clusters + other.total_clusters,
            total_nodes: self.total_nodes + other.total_nodes,
            total_pods: self.total_pods + other.total_pods,
            suffix_summary: summary_shape
                .map(|(environment, labels)| summarize(&clusters, &environment, &labels)),
            warnings,
            complete: self.complete && other.complete,
            generated_at: self.generated_at.max(other.generated_at),
            clusters,
        }
    }

    /// Record run-level warnings; the report stays complete only if `complete`
    pub fn with_run_outcome(mut self, warnings: Vec<CollectionWarning>, complete: bool) -> Self {
        self.warnings.extend(warnings);
        sort_warnings(&mut self.warnings);
        self.complete = self.complete && complete;
        self
    }
}

fn sort_clusters(clusters: &mut [ClusterReport]) {
    clusters.sort_by(|a, b| {
        (a.environment.as_str(), a.cluster_name.as_str())
            .cmp(&(b.environment.as_str(), b.cluster_name.as_str()))
            .then(a.collected_at.cmp(&b.collected_at))
    });
}

fn sort_warnings(warnings: &mut [CollectionWarning]) {
    warnings.sort_by_cached_key(|w| w.to_string());
}

fn summarize(clusters: &[ClusterReport], environment: &str, labels: &[String]) -> SuffixSummary {
    let totals = labels
        .iter()
        .map(|label| NamespaceGroup {
            label: label.clone(),
            count: clusters
                .iter()
                .filter(|c| c.environment == environment)
                .map(|c| c.group_count(label))
                .sum(),
        })
        .collect();

    SuffixSummary {
        environment: environment.to_string(),
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{group_count, ClusterStatus, NodeSample, PodSample};
    use std::collections::BTreeMap;

    fn report(env: &str, name: &str, groups: &[(&str, usize)], nodes: usize, pods: usize) -> ClusterReport {
        let node = NodeSample {
            name: "node".to_string(),
            instance_type: None,
            cpu_capacity_cores: 2.0,
            mem_capacity_gib: 8.0,
            cpu_util_cores: 0.5,
            mem_util_gib: 2.0,
            metrics_available: true,
        };
        let pod = PodSample {
            namespace: "app-dev".to_string(),
            pod_name: "api".to_string(),
            node_name: "node".to_string(),
            cpu_util_cores: 0.1,
            mem_util_gib: 0.2,
        };

        ClusterReport {
            cluster_name: name.to_string(),
            environment: env.to_string(),
            region: "us-east-1".to_string(),
            status: ClusterStatus::Complete,
            collected_at: 1_700_000_000 + pods as i64,
            nodes: vec![node; nodes],
            pods: vec![pod; pods],
            deployments: vec![],
            namespace_counts: BTreeMap::from([("app-dev".to_string(), pods)]),
            group_counts: groups
                .iter()
                .map(|(label, count)| NamespaceGroup {
                    label: label.to_string(),
                    count: *count,
                })
                .collect(),
            top_cpu_pods: vec![],
            top_mem_pods: vec![],
            warnings: vec![],
        }
    }

    fn a() -> ClusterReport {
        report("dev", "dev-a", &[("dev", 3), ("devb", 1), ("devc", 0), ("others", 2)], 2, 6)
    }

    fn b() -> ClusterReport {
        report("dev", "dev-b", &[("dev", 1), ("others", 4)], 3, 5)
    }

    fn c() -> ClusterReport {
        report("prod", "prod-a", &[("proda", 7), ("others", 1)], 4, 8)
    }

    fn dev_env() -> Environment {
        Environment::new("dev", "us-east-1", &["dev", "devb", "devc"])
    }

    #[test]
    fn test_totals_are_sums() {
        let fleet = FleetAggregator::new().aggregate(vec![a(), b(), c()]);
        assert_eq!(fleet.total_clusters, 3);
        assert_eq!(fleet.total_nodes, 9);
        assert_eq!(fleet.total_pods, 19);
        assert!(fleet.complete);
        assert!(fleet.suffix_summary.is_none());
        assert_eq!(fleet.generated_at, 1_700_000_008);
    }

    #[test]
    fn test_empty_fleet() {
        let fleet = FleetAggregator::new().aggregate(vec![]);
        assert_eq!(fleet.total_clusters, 0);
        assert_eq!(fleet.generated_at, 0);
    }

    #[test]
    fn test_suffix_summary_fills_missing_groups() {
        let fleet = FleetAggregator::with_suffix_view(dev_env()).aggregate(vec![a(), b(), c()]);
        let summary = fleet.suffix_summary.unwrap();
        assert_eq!(summary.environment, "dev");

        let totals: Vec<(&str, usize)> = summary
            .totals
            .iter()
            .map(|g| (g.label.as_str(), g.count))
            .collect();
        // prod's "others" stays out of the dev view
        assert_eq!(
            totals,
            vec![("dev", 4), ("devb", 1), ("devc", 0), ("others", 6)]
        );
    }

    #[test]
    fn test_aggregate_for_environment() {
        let viewed = FleetAggregator::new().aggregate_for_environment(vec![a(), b(), c()], &dev_env());
        let configured = FleetAggregator::with_suffix_view(dev_env()).aggregate(vec![a(), b(), c()]);
        assert_eq!(viewed, configured);

        let prod = Environment::new("prod", "us-west-2", &["proda", "prodb"]);
        let summary = FleetAggregator::new()
            .aggregate_for_environment(vec![a(), c()], &prod)
            .suffix_summary
            .unwrap();
        assert_eq!(group_count(&summary.totals, "proda"), 7);
        assert_eq!(group_count(&summary.totals, "prodb"), 0);
        assert_eq!(group_count(&summary.totals, "others"), 1);
    }

    #[test]
    fn test_order_independent() {
        let aggregator = FleetAggregator::with_suffix_view(dev_env());
        let forward = aggregator.aggregate(vec![a(), b(), c()]);
        let backward = aggregator.aggregate(vec![c(), b(), a()]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_merge_is_associative() {
        let aggregator = FleetAggregator::with_suffix_view(dev_env());

        let direct = aggregator.aggregate(vec![a(), b(), c()]);
        let left = aggregator
            .aggregate(vec![a(), b()])
            .merge(aggregator.aggregate(vec![c()]));
        let right = aggregator
            .aggregate(vec![a()])
            .merge(aggregator.aggregate(vec![b(), c()]));

        assert_eq!(left, direct);
        assert_eq!(right, direct);
    }

    #[test]
    fn test_merge_is_commutative() {
        let aggregator = FleetAggregator::new();
        let ab = aggregator.aggregate(vec![a()]).merge(aggregator.aggregate(vec![b()]));
        let ba = aggregator.aggregate(vec![b()]).merge(aggregator.aggregate(vec![a()]));
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_run_outcome() {
        let fleet = FleetAggregator::new().aggregate(vec![a()]).with_run_outcome(
            vec![CollectionWarning::RunInterrupted {
                completed: 1,
                abandoned: 2,
            }],
            false,
        );
        assert!(!fleet.complete);
        assert_eq!(fleet.warning_count(), 1);

        let merged = fleet.merge(FleetAggregator::new().aggregate(vec![b()]));
        assert!(!merged.complete);
        assert_eq!(merged.total_clusters, 2);
    }

    #[test]
    fn test_pods_with_suffix() {
        let fleet = FleetAggregator::new().aggregate(vec![a(), b(), c()]);
        assert_eq!(fleet.pods_with_suffix("dev"), 19);
        assert_eq!(fleet.pods_with_suffix("prod"), 0);
    }
}
