//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use fleet_lib::ClusterStatus;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a titled table, or a placeholder when there are no rows
pub fn print_table<T: Tabled>(title: &str, rows: &[T]) {
    println!("{}", title.bold());
    if rows.is_empty() {
        println!("{}", "  none".dimmed());
        println!();
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
    println!();
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format GiB with two decimals
pub fn format_gib(gib: f64) -> String {
    if gib < 1.0 {
        format!("{:.0}Mi", gib * 1024.0)
    } else {
        format!("{:.2}Gi", gib)
    }
}

/// Format cores, switching to millicores below one core
pub fn format_cores(cores: f64) -> String {
    if cores < 1.0 {
        format!("{:.0}m", cores * 1000.0)
    } else {
        format!("{:.2}", cores)
    }
}

/// Format `used / capacity` with a unit formatter
pub fn format_usage(used: f64, capacity: f64, unit: fn(f64) -> String) -> String {
    format!("{} / {}", unit(used), unit(capacity))
}

/// Format a percentage, coloring high utilization
pub fn color_percent(percent: f64) -> String {
    let formatted = format!("{:.1}%", percent);
    if percent >= 90.0 {
        formatted.red().to_string()
    } else if percent >= 75.0 {
        formatted.yellow().to_string()
    } else {
        formatted
    }
}

/// Color status based on value
pub fn color_status(status: ClusterStatus) -> String {
    let label = status.to_string();
    match status {
        ClusterStatus::Complete => label.green().to_string(),
        ClusterStatus::Degraded => label.yellow().to_string(),
        ClusterStatus::Unreachable => label.red().to_string(),
    }
}
