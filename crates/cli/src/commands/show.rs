//! Rendering of fleet and cluster reports

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use fleet_lib::{ClusterReport, FleetReport, NamespaceGroup, PodSample};
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_percent, color_status, format_cores, format_gib, format_usage, print_info, print_json,
    print_table, print_warning, OutputFormat,
};

/// Row for the cluster overview table
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Nodes")]
    nodes: usize,
    #[tabled(rename = "Pods")]
    pods: usize,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Warnings")]
    warnings: usize,
}

impl From<&ClusterReport> for ClusterRow {
    fn from(c: &ClusterReport) -> Self {
        Self {
            environment: c.environment.clone(),
            cluster: c.cluster_name.clone(),
            status: color_status(c.status),
            nodes: c.nodes.len(),
            pods: c.pods.len(),
            cpu: format_usage(c.total_cpu_util(), c.total_cpu_capacity(), format_cores),
            memory: format_usage(
                c.total_mem_util_gib(),
                c.total_mem_capacity_gib(),
                format_gib,
            ),
            warnings: c.warnings.len(),
        }
    }
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Pods")]
    pods: usize,
}

impl From<&NamespaceGroup> for GroupRow {
    fn from(g: &NamespaceGroup) -> Self {
        Self {
            group: g.label.clone(),
            pods: g.count,
        }
    }
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    name: String,
    #[tabled(rename = "Instance")]
    instance_type: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Mem %")]
    mem_percent: String,
}

#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

impl From<&PodSample> for PodRow {
    fn from(p: &PodSample) -> Self {
        Self {
            namespace: p.namespace.clone(),
            pod: p.pod_name.clone(),
            node: if p.node_name.is_empty() {
                "-".to_string()
            } else {
                p.node_name.clone()
            },
            cpu: format_cores(p.cpu_util_cores),
            memory: format_gib(p.mem_util_gib),
        }
    }
}

#[derive(Tabled)]
struct DeploymentRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Deployment")]
    name: String,
    #[tabled(rename = "Ready")]
    ready: String,
}

/// Load a saved fleet report
pub async fn load_report(path: &Path) -> Result<FleetReport> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse report {}", path.display()))
}

/// Which cluster of a report to show
#[derive(Debug, Clone)]
pub struct ClusterSelection {
    pub name: String,
    pub environment: Option<String>,
}

/// Show a saved report, or one cluster of it
pub async fn show_report(
    path: &Path,
    selection: Option<&ClusterSelection>,
    format: OutputFormat,
) -> Result<()> {
    let report = load_report(path).await?;

    match selection {
        Some(selection) => render_cluster(find_cluster(&report, selection)?, format),
        None => render_fleet(&report, format),
    }
}

/// Find one cluster; names may repeat across environments
pub fn find_cluster<'a>(
    report: &'a FleetReport,
    selection: &ClusterSelection,
) -> Result<&'a ClusterReport> {
    let matches: Vec<&ClusterReport> = report
        .clusters
        .iter()
        .filter(|c| c.cluster_name == selection.name)
        .filter(|c| {
            selection
                .environment
                .as_deref()
                .map_or(true, |env| c.environment == env)
        })
        .collect();

    match matches.as_slice() {
        [cluster] => Ok(cluster),
        [] => match &selection.environment {
            Some(env) => bail!(
                "Cluster {} of environment {} is not in the report",
                selection.name,
                env
            ),
            None => bail!("Cluster {} is not in the report", selection.name),
        },
        many => {
            let environments: Vec<&str> = many.iter().map(|c| c.environment.as_str()).collect();
            bail!(
                "Cluster {} exists in several environments ({}), pick one with --env",
                selection.name,
                environments.join(", ")
            )
        }
    }
}

/// Render the fleet overview
pub fn render_fleet(report: &FleetReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    println!("{}", "Fleet Inventory".bold());
    println!("{}", "=".repeat(50));
    println!("Clusters:               {}", report.total_clusters);
    println!("Nodes:                  {}", report.total_nodes);
    println!("Pods with metrics:      {}", report.total_pods);
    println!("Generated:              {}", format_timestamp(report.generated_at).dimmed());
    println!();

    let rows: Vec<ClusterRow> = report.clusters.iter().map(ClusterRow::from).collect();
    print_table("Clusters", &rows);

    if let Some(summary) = &report.suffix_summary {
        let rows: Vec<GroupRow> = summary.totals.iter().map(GroupRow::from).collect();
        print_table(&format!("Suffix groups ({})", summary.environment), &rows);
    }

    for (source, warning) in report.all_warnings() {
        print_warning(&format!("{}: {}", source, warning));
    }

    if !report.complete {
        print_warning("Run was interrupted, report covers completed clusters only");
    }

    Ok(())
}

/// Render one cluster in detail
pub fn render_cluster(cluster: &ClusterReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(cluster);
    }

    println!(
        "{} {} ({}, {})",
        "Cluster".bold(),
        cluster.cluster_name.cyan(),
        cluster.environment,
        cluster.region
    );
    println!("Status: {}", color_status(cluster.status));
    println!();

    let nodes: Vec<NodeRow> = cluster
        .nodes
        .iter()
        .map(|n| NodeRow {
            name: n.name.clone(),
            instance_type: n.instance_type.clone().unwrap_or_else(|| "-".to_string()),
            cpu: format_usage(n.cpu_util_cores, n.cpu_capacity_cores, format_cores),
            memory: format_usage(n.mem_util_gib, n.mem_capacity_gib, format_gib),
            mem_percent: if n.metrics_available {
                color_percent(n.mem_util_percent())
            } else {
                "n/a".dimmed().to_string()
            },
        })
        .collect();
    print_table("Nodes", &nodes);

    let groups: Vec<GroupRow> = cluster.group_counts.iter().map(GroupRow::from).collect();
    print_table("Namespace groups", &groups);

    let top_cpu: Vec<PodRow> = cluster.top_cpu_pods.iter().map(PodRow::from).collect();
    print_table("Top pods by CPU", &top_cpu);

    let top_mem: Vec<PodRow> = cluster.top_mem_pods.iter().map(PodRow::from).collect();
    print_table("Top pods by memory", &top_mem);

    if !cluster.deployments.is_empty() {
        let rows: Vec<DeploymentRow> = cluster
            .deployments
            .iter()
            .map(|d| {
                let ready = format!("{}/{}", d.ready_replicas, d.desired_replicas);
                DeploymentRow {
                    namespace: d.namespace.clone(),
                    name: d.name.clone(),
                    ready: if d.is_fully_ready() {
                        ready.green().to_string()
                    } else {
                        ready.yellow().to_string()
                    },
                }
            })
            .collect();
        print_table("Deployments", &rows);
    }

    let excluded = cluster.counted_pods().saturating_sub(cluster.pods.len());
    if excluded > 0 {
        print_info(&format!(
            "{} pod(s) counted in namespace totals have no utilization metrics",
            excluded
        ));
    }
    for warning in &cluster.warnings {
        print_warning(&warning.to_string());
    }

    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_lib::aggregator::FleetAggregator;
    use fleet_lib::{ClusterContext, Credentials, Environment};

    fn report_with(clusters: &[(&str, &str)]) -> FleetReport {
        let reports = clusters
            .iter()
            .map(|(env, name)| {
                let env = Environment::new(*env, "us-east-1", &[]);
                let ctx = ClusterContext::new(&env, *name, Credentials::anonymous("TEST"));
                ClusterReport::unreachable(&ctx, vec![env.name.clone()], "i/o timeout")
            })
            .collect();
        FleetAggregator::new().aggregate(reports)
    }

    fn select(name: &str, environment: Option<&str>) -> ClusterSelection {
        ClusterSelection {
            name: name.to_string(),
            environment: environment.map(str::to_string),
        }
    }

    #[test]
    fn test_find_cluster_uses_environment() {
        let report = report_with(&[("dev", "core"), ("idev", "core"), ("dev", "batch")]);

        let found = find_cluster(&report, &select("core", Some("idev"))).unwrap();
        assert_eq!(found.environment, "idev");

        let found = find_cluster(&report, &select("batch", None)).unwrap();
        assert_eq!(found.environment, "dev");
    }

    #[test]
    fn test_find_cluster_rejects_ambiguous_name() {
        let report = report_with(&[("dev", "core"), ("idev", "core")]);

        let err = find_cluster(&report, &select("core", None)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("dev, idev"), "{}", message);
        assert!(message.contains("--env"), "{}", message);
    }

    #[test]
    fn test_find_cluster_missing() {
        let report = report_with(&[("dev", "core")]);

        assert!(find_cluster(&report, &select("core", Some("prod"))).is_err());
        assert!(find_cluster(&report, &select("nope", None)).is_err());
    }
}
