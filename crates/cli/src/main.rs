//! EKS fleet inventory CLI
//!
//! Collects node and pod inventory across environments, renders saved
//! reports and checks configuration.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{collect, show, validate};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// EKS fleet inventory CLI
#[derive(Parser)]
#[command(name = "fleet")]
#[command(author, version, about = "Inventory of EKS clusters across environments", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ~/.config/fleet/fleet.toml)
    #[arg(long, short, env = "FLEET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect every cluster of the selected environments
    Collect {
        /// Snapshot of raw collector output to read from
        #[arg(long)]
        snapshot: PathBuf,

        /// Environment to collect (repeatable, all when omitted)
        #[arg(long = "env", value_name = "NAME")]
        environments: Vec<String>,

        /// Summarize suffix groups across the clusters of this environment
        #[arg(long, value_name = "NAME")]
        suffix_view: Option<String>,

        /// Clusters collected at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Size of the top pod rankings
        #[arg(long)]
        top_n: Option<usize>,

        /// Stop after this many seconds and report completed clusters
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Write the fleet report as JSON
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Write Prometheus metrics for the node-exporter textfile collector
        #[arg(long)]
        metrics_textfile: Option<PathBuf>,
    },

    /// Show a saved fleet report
    Show {
        /// Report written by `collect --output`
        #[arg(long)]
        report: PathBuf,

        /// Show one cluster in detail
        #[arg(long)]
        cluster: Option<String>,

        /// Environment of the cluster, needed when its name is not unique
        #[arg(long = "env", value_name = "NAME", requires = "cluster")]
        environment: Option<String>,
    },

    /// Check the settings file and credentials without collecting
    Validate,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for reports
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Collect {
            snapshot,
            environments,
            suffix_view,
            concurrency,
            top_n,
            deadline_secs,
            output,
            metrics_textfile,
        } => {
            let settings = config::FleetSettings::load(cli.config.as_deref())?;
            let options = collect::CollectOptions {
                snapshot,
                environments,
                suffix_view,
                concurrency,
                top_n,
                deadline_secs,
                output,
                metrics_textfile,
            };
            collect::collect(&settings, options, cli.format).await?;
        }
        Commands::Show {
            report,
            cluster,
            environment,
        } => {
            let selection = cluster.map(|name| show::ClusterSelection {
                name,
                environment,
            });
            show::show_report(&report, selection.as_ref(), cli.format).await?;
        }
        Commands::Validate => {
            let settings = config::FleetSettings::load(cli.config.as_deref())?;
            validate::validate(&settings, cli.format)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    run(cli).await
}
