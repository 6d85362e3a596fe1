//! Fleet collection command

use anyhow::{Context, Result};
use fleet_lib::collector::{FleetCollector, SnapshotSource};
use fleet_lib::{FleetMetrics, FleetReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

use crate::commands::show::render_fleet;
use crate::config::{resolve_credentials, FleetSettings};
use crate::output::{print_success, print_warning, OutputFormat};

/// Arguments of `fleet collect`
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    pub snapshot: PathBuf,
    /// Environments to collect, all configured ones when empty
    pub environments: Vec<String>,
    pub suffix_view: Option<String>,
    pub concurrency: Option<usize>,
    pub top_n: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub output: Option<PathBuf>,
    pub metrics_textfile: Option<PathBuf>,
}

/// Collect the fleet and render the report
pub async fn collect(
    settings: &FleetSettings,
    options: CollectOptions,
    format: OutputFormat,
) -> Result<FleetReport> {
    let catalog = settings.catalog()?;
    let environments = catalog.select(&options.environments)?;

    let mut config = settings.fleet_config();
    if let Some(concurrency) = options.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(top_n) = options.top_n {
        config.top_n = top_n;
    }
    if let Some(secs) = options.deadline_secs {
        config.deadline = Some(Duration::from_secs(secs));
    }
    config.suffix_view = options.suffix_view.clone();

    let source = SnapshotSource::load(&options.snapshot).await?;
    let mut builder = FleetCollector::builder()
        .source(Arc::new(source))
        .config(config);
    for environment in environments {
        let credentials = resolve_credentials(&environment);
        builder = builder.environment(environment, credentials);
    }
    let collector = builder.build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing with completed clusters");
            let _ = shutdown_tx.send(());
        }
    });

    let report = collector.run(shutdown_rx).await;

    if let Some(path) = &options.output {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        if format == OutputFormat::Table {
            print_success(&format!("Report written to {}", path.display()));
        }
    }

    if let Some(path) = &options.metrics_textfile {
        write_metrics_textfile(path).await?;
    }

    render_fleet(&report, format)?;

    if !report.complete && format == OutputFormat::Table {
        print_warning("Collection did not finish; rerun to cover the remaining clusters");
    }

    Ok(report)
}

/// Write metrics in the textfile collector format, replacing the file atomically
async fn write_metrics_textfile(path: &Path) -> Result<()> {
    let text = FleetMetrics::new().render_text()?;
    let staging = path.with_extension("prom.tmp");

    tokio::fs::write(&staging, text)
        .await
        .with_context(|| format!("Failed to write metrics {}", staging.display()))?;
    tokio::fs::rename(&staging, path)
        .await
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
    Ok(())
}
