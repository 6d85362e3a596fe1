//! Fleet collection run
//!
//! Lists the clusters of every requested environment, then collects them on
//! a bounded pool of tokio tasks. Each task owns its data source handle and
//! cluster context, and hands back a finished [`ClusterReport`]. The fold
//! into a [`FleetReport`] happens once all results are in, or as soon as the
//! run is cancelled or its deadline passes, from whatever finished by then.

use super::ClusterDataSource;
use crate::aggregator::{ClusterAggregator, FleetAggregator};
use crate::config::{EnvironmentCatalog, FleetConfig};
use crate::error::{CollectionWarning, ConfigurationError};
use crate::models::{ClusterContext, ClusterReport, Credentials, Environment, FleetReport};
use crate::observability::{FleetMetrics, RunLogger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// An environment to collect, with the credentials to collect it with
#[derive(Debug, Clone)]
pub struct EnvironmentTarget {
    pub environment: Environment,
    pub credentials: Credentials,
}

/// One cluster waiting for a worker
struct ClusterJob {
    aggregator: Arc<ClusterAggregator>,
    context: ClusterContext,
}

/// Why a run stopped early
#[derive(Debug, Clone, Copy)]
enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

impl Interruption {
    fn as_str(&self) -> &'static str {
        match self {
            Interruption::Cancelled => "cancelled",
            Interruption::DeadlineExceeded => "deadline exceeded",
        }
    }
}

/// Collects every cluster of a set of environments into a fleet report
pub struct FleetCollector {
    /// Data source shared by handle with every worker
    source: Arc<dyn ClusterDataSource>,
    /// Environments in configured order
    targets: Vec<EnvironmentTarget>,
    config: FleetConfig,
    metrics: FleetMetrics,
    logger: RunLogger,
}

impl FleetCollector {
    pub fn builder() -> FleetCollectorBuilder {
        FleetCollectorBuilder::new()
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Run the collection to completion, cancellation or deadline
    ///
    /// Always yields a report. When interrupted, it covers only the clusters
    /// that finished and is marked incomplete.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> FleetReport {
        let started = Instant::now();
        let deadline = self.config.deadline.map(|d| started + d);
        let names: Vec<String> = self
            .targets
            .iter()
            .map(|t| t.environment.name.clone())
            .collect();
        self.logger.log_run_started(&names, self.config.concurrency);

        let mut run_warnings = Vec::new();
        let mut interruption = None;

        // List clusters per environment
        let mut jobs = Vec::new();
        for target in &self.targets {
            let listing = tokio::select! {
                biased;
                result = self.source.list_clusters(&target.environment, &target.credentials) => result,
                _ = shutdown_signal(&mut shutdown) => {
                    interruption = Some(Interruption::Cancelled);
                    break;
                }
                _ = deadline_reached(deadline) => {
                    interruption = Some(Interruption::DeadlineExceeded);
                    break;
                }
            };

            match listing {
                Ok(clusters) => {
                    self.logger
                        .log_clusters_listed(&target.environment.name, clusters.len());
                    let aggregator = Arc::new(
                        ClusterAggregator::new(target.environment.clone())
                            .with_top_n(self.config.top_n),
                    );
                    jobs.extend(clusters.into_iter().map(|cluster| ClusterJob {
                        aggregator: Arc::clone(&aggregator),
                        context: ClusterContext::new(
                            &target.environment,
                            cluster,
                            target.credentials.clone(),
                        ),
                    }));
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    self.logger
                        .log_listing_failed(&target.environment.name, &reason);
                    run_warnings.push(CollectionWarning::ClusterListingFailed {
                        environment: target.environment.name.clone(),
                        reason,
                    });
                }
            }
        }

        // Collect clusters on the worker pool
        let total_jobs = jobs.len();
        let mut reports = Vec::with_capacity(total_jobs);
        let mut tasks = JoinSet::new();
        // Lets a failed worker still be reported against its cluster
        let mut in_flight = HashMap::with_capacity(total_jobs);
        if interruption.is_none() {
            let permits = Arc::new(Semaphore::new(self.config.concurrency));
            for job in jobs {
                let owner = (Arc::clone(&job.aggregator), job.context.clone());
                let handle = tasks.spawn(collect_job(
                    job,
                    Arc::clone(&self.source),
                    Arc::clone(&permits),
                    self.metrics.clone(),
                ));
                in_flight.insert(handle.id(), owner);
            }
        }

        while interruption.is_none() && !tasks.is_empty() {
            tokio::select! {
                biased;
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((id, (report, elapsed)))) => {
                        in_flight.remove(&id);
                        self.logger.log_cluster_collected(&report, elapsed.as_millis());
                        reports.push(report);
                    }
                    Some(Err(e)) => reports.extend(failed_worker(&mut in_flight, e)),
                    None => break,
                },
                _ = shutdown_signal(&mut shutdown) => interruption = Some(Interruption::Cancelled),
                _ = deadline_reached(deadline) => interruption = Some(Interruption::DeadlineExceeded),
            }
        }

        if let Some(reason) = interruption {
            // Abort whatever is still running; finished tasks keep their output
            tasks.abort_all();
            while let Some(joined) = tasks.join_next_with_id().await {
                match joined {
                    Ok((id, (report, elapsed))) => {
                        in_flight.remove(&id);
                        self.logger.log_cluster_collected(&report, elapsed.as_millis());
                        reports.push(report);
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => reports.extend(failed_worker(&mut in_flight, e)),
                }
            }

            let abandoned = total_jobs.saturating_sub(reports.len());
            self.logger
                .log_run_interrupted(reason.as_str(), reports.len(), abandoned);
            run_warnings.push(CollectionWarning::RunInterrupted {
                completed: reports.len(),
                abandoned,
            });
        }

        let aggregator = FleetAggregator::new();
        let report = match self.suffix_view_environment() {
            Some(env) => aggregator.aggregate_for_environment(reports, env),
            None => aggregator.aggregate(reports),
        }
        .with_run_outcome(run_warnings, interruption.is_none());

        let elapsed = started.elapsed();
        self.metrics.record_fleet(&report, elapsed.as_secs_f64());
        self.logger.log_run_finished(&report, elapsed.as_millis());
        report
    }

    fn suffix_view_environment(&self) -> Option<&Environment> {
        let view = self.config.suffix_view.as_deref()?;
        self.targets
            .iter()
            .map(|t| &t.environment)
            .find(|e| e.name == view)
    }
}

/// Collect one cluster once a pool permit is available
async fn collect_job(
    job: ClusterJob,
    source: Arc<dyn ClusterDataSource>,
    permits: Arc<Semaphore>,
    metrics: FleetMetrics,
) -> (ClusterReport, Duration) {
    // The semaphore is never closed, so acquiring only waits
    let _permit = permits.acquire_owned().await.ok();

    let started = Instant::now();
    debug!(cluster = %job.context.cluster, "Collecting cluster");
    let report = job.aggregator.collect(source.as_ref(), &job.context).await;

    let elapsed = started.elapsed();
    metrics.observe_cluster_latency(elapsed.as_secs_f64());
    (report, elapsed)
}

/// Turn a worker that died without a report into an unreachable cluster
fn failed_worker(
    in_flight: &mut HashMap<task::Id, (Arc<ClusterAggregator>, ClusterContext)>,
    error: JoinError,
) -> Option<ClusterReport> {
    let Some((aggregator, context)) = in_flight.remove(&error.id()) else {
        warn!(error = %error, "Unknown cluster worker failed");
        return None;
    };

    warn!(
        environment = %context.environment,
        cluster = %context.cluster,
        error = %error,
        "Cluster worker failed"
    );
    Some(aggregator.unreachable(&context, format!("worker failed: {}", error)))
}

/// Resolves when shutdown is requested; never resolves once every sender is gone
async fn shutdown_signal(shutdown: &mut broadcast::Receiver<()>) {
    if let Err(broadcast::error::RecvError::Closed) = shutdown.recv().await {
        std::future::pending::<()>().await;
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Builder for a validated [`FleetCollector`]
pub struct FleetCollectorBuilder {
    source: Option<Arc<dyn ClusterDataSource>>,
    targets: Vec<EnvironmentTarget>,
    config: FleetConfig,
    logger: Option<RunLogger>,
}

impl FleetCollectorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            targets: Vec::new(),
            config: FleetConfig::default(),
            logger: None,
        }
    }

    /// Set the cluster data source
    pub fn source(mut self, source: Arc<dyn ClusterDataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Add an environment to collect
    pub fn environment(mut self, environment: Environment, credentials: Credentials) -> Self {
        self.targets.push(EnvironmentTarget {
            environment,
            credentials,
        });
        self
    }

    /// Replace all run tunables
    pub fn config(mut self, config: FleetConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of clusters collected concurrently
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the size of the top pod rankings
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.config.top_n = top_n;
        self
    }

    /// Stop collecting after `deadline` and report what finished
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = Some(deadline);
        self
    }

    /// Summarize suffix groups across the clusters of one environment
    pub fn suffix_view(mut self, environment: impl Into<String>) -> Self {
        self.config.suffix_view = Some(environment.into());
        self
    }

    /// Use a specific run logger
    pub fn logger(mut self, logger: RunLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the collector, failing on any static misconfiguration
    pub fn build(self) -> Result<FleetCollector, ConfigurationError> {
        let source = self
            .source
            .ok_or(ConfigurationError::Missing("cluster data source"))?;

        let environments: Vec<Environment> =
            self.targets.iter().map(|t| t.environment.clone()).collect();
        EnvironmentCatalog::new(environments.clone())?;
        self.config.validate(&environments)?;

        Ok(FleetCollector {
            source,
            targets: self.targets,
            config: self.config,
            metrics: FleetMetrics::new(),
            logger: self.logger.unwrap_or_else(RunLogger::for_current_run),
        })
    }
}

impl Default for FleetCollectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
