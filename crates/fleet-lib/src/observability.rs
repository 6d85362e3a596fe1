//! Observability infrastructure for fleet collection runs
//!
//! Provides:
//! - Prometheus metrics (per-cluster collection latency, fleet totals, warning counts)
//! - Structured logging of run events with tracing

use crate::models::{ClusterReport, ClusterStatus, FleetReport};
use anyhow::{Context, Result};
use prometheus::{
    register_gauge, register_histogram, register_int_gauge, Encoder, Gauge, Histogram, IntGauge,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-cluster collection time (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<FleetMetricsInner> = OnceLock::new();

struct FleetMetricsInner {
    cluster_collection_seconds: Histogram,
    run_duration_seconds: Gauge,
    clusters_collected: IntGauge,
    clusters_unreachable: IntGauge,
    nodes_observed: IntGauge,
    pods_observed: IntGauge,
    pods_without_metrics: IntGauge,
    collection_warnings: IntGauge,
    last_run_complete: IntGauge,
    last_run_timestamp: IntGauge,
}

impl FleetMetricsInner {
    fn new() -> Self {
        Self {
            cluster_collection_seconds: register_histogram!(
                "fleet_inventory_cluster_collection_seconds",
                "Time spent collecting and aggregating one cluster",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cluster_collection_seconds"),

            run_duration_seconds: register_gauge!(
                "fleet_inventory_run_duration_seconds",
                "Wall time of the last collection run"
            )
            .expect("Failed to register run_duration_seconds"),

            clusters_collected: register_int_gauge!(
                "fleet_inventory_clusters_collected",
                "Clusters included in the last fleet report"
            )
            .expect("Failed to register clusters_collected"),

            clusters_unreachable: register_int_gauge!(
                "fleet_inventory_clusters_unreachable",
                "Clusters that could not be reached in the last run"
            )
            .expect("Failed to register clusters_unreachable"),

            nodes_observed: register_int_gauge!(
                "fleet_inventory_nodes",
                "Nodes in the last fleet report"
            )
            .expect("Failed to register nodes_observed"),

            pods_observed: register_int_gauge!(
                "fleet_inventory_pods",
                "Pods with utilization metrics in the last fleet report"
            )
            .expect("Failed to register pods_observed"),

            pods_without_metrics: register_int_gauge!(
                "fleet_inventory_pods_without_metrics",
                "Pods counted in namespace tallies but missing utilization metrics"
            )
            .expect("Failed to register pods_without_metrics"),

            collection_warnings: register_int_gauge!(
                "fleet_inventory_collection_warnings",
                "Warnings recorded during the last run"
            )
            .expect("Failed to register collection_warnings"),

            last_run_complete: register_int_gauge!(
                "fleet_inventory_last_run_complete",
                "1 if the last run covered every cluster, 0 if it was interrupted"
            )
            .expect("Failed to register last_run_complete"),

            last_run_timestamp: register_int_gauge!(
                "fleet_inventory_last_run_timestamp_seconds",
                "Unix time the last fleet report was generated"
            )
            .expect("Failed to register last_run_timestamp"),
        }
    }
}

/// Handle to the process-wide fleet metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct FleetMetrics {
    _private: (),
}

impl Default for FleetMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetMetrics {
    /// Create a metrics handle (registers the global metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(FleetMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &FleetMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_cluster_latency(&self, duration_secs: f64) {
        self.inner().cluster_collection_seconds.observe(duration_secs);
    }

    /// Publish the totals of a finished run
    pub fn record_fleet(&self, report: &FleetReport, duration_secs: f64) {
        let inner = self.inner();
        let without_metrics: usize = report
            .clusters
            .iter()
            .map(|c| c.counted_pods().saturating_sub(c.pods.len()))
            .sum();

        inner.run_duration_seconds.set(duration_secs);
        inner.clusters_collected.set(report.total_clusters as i64);
        inner
            .clusters_unreachable
            .set(report.unreachable_clusters().count() as i64);
        inner.nodes_observed.set(report.total_nodes as i64);
        inner.pods_observed.set(report.total_pods as i64);
        inner.pods_without_metrics.set(without_metrics as i64);
        inner.collection_warnings.set(report.warning_count() as i64);
        inner.last_run_complete.set(i64::from(report.complete));
        inner.last_run_timestamp.set(report.generated_at);
    }

    /// Encode the default registry in the Prometheus text format
    pub fn render_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
    }
}

/// Structured logger for collection run events
#[derive(Clone)]
pub struct RunLogger {
    run_id: String,
}

impl RunLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// Logger with a run id derived from the current time
    pub fn for_current_run() -> Self {
        Self::new(chrono::Utc::now().format("run-%Y%m%dT%H%M%SZ").to_string())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_started(&self, environments: &[String], concurrency: usize) {
        info!(
            event = "run_started",
            run = %self.run_id,
            environments = ?environments,
            concurrency = concurrency,
            "Fleet collection started"
        );
    }

    pub fn log_clusters_listed(&self, environment: &str, clusters: usize) {
        info!(
            event = "clusters_listed",
            run = %self.run_id,
            environment = %environment,
            clusters = clusters,
            "Listed clusters"
        );
    }

    pub fn log_listing_failed(&self, environment: &str, error: &str) {
        warn!(
            event = "cluster_listing_failed",
            run = %self.run_id,
            environment = %environment,
            error = %error,
            "Could not list clusters, skipping environment"
        );
    }

    pub fn log_cluster_collected(&self, report: &ClusterReport, elapsed_ms: u128) {
        match report.status {
            ClusterStatus::Unreachable => {
                warn!(
                    event = "cluster_unreachable",
                    run = %self.run_id,
                    environment = %report.environment,
                    cluster = %report.cluster_name,
                    elapsed_ms = elapsed_ms,
                    "Cluster unreachable"
                );
            }
            status => {
                info!(
                    event = "cluster_collected",
                    run = %self.run_id,
                    environment = %report.environment,
                    cluster = %report.cluster_name,
                    status = %status,
                    nodes = report.nodes.len(),
                    pods = report.pods.len(),
                    warnings = report.warnings.len(),
                    elapsed_ms = elapsed_ms,
                    "Cluster collected"
                );
            }
        }
    }

    pub fn log_run_interrupted(&self, reason: &str, completed: usize, abandoned: usize) {
        warn!(
            event = "run_interrupted",
            run = %self.run_id,
            reason = %reason,
            completed = completed,
            abandoned = abandoned,
            "Collection interrupted, reporting completed clusters only"
        );
    }

    pub fn log_run_finished(&self, report: &FleetReport, elapsed_ms: u128) {
        info!(
            event = "run_finished",
            run = %self.run_id,
            clusters = report.total_clusters,
            nodes = report.total_nodes,
            pods = report.total_pods,
            warnings = report.warning_count(),
            complete = report.complete,
            elapsed_ms = elapsed_ms,
            "Fleet collection finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::FleetAggregator;

    #[test]
    fn test_fleet_metrics_render() {
        let metrics = FleetMetrics::new();
        metrics.observe_cluster_latency(0.3);
        metrics.record_fleet(&FleetAggregator::new().aggregate(vec![]), 1.5);

        let text = metrics.render_text().unwrap();
        assert!(text.contains("fleet_inventory_cluster_collection_seconds"));
        assert!(text.contains("fleet_inventory_last_run_complete"));
    }

    #[test]
    fn test_run_logger_ids() {
        let logger = RunLogger::new("run-test");
        assert_eq!(logger.run_id(), "run-test");
        assert!(RunLogger::for_current_run().run_id().starts_with("run-"));
    }
}
