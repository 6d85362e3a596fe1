//! Configuration check

use anyhow::Result;
use colored::Colorize;
use fleet_lib::{Environment, NamespaceClassifier};
use serde::Serialize;
use tabled::Tabled;

use crate::config::{resolve_credentials, FleetSettings};
use crate::output::{print_json, print_success, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct EnvironmentRow {
    #[tabled(rename = "Environment")]
    name: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Groups")]
    groups: String,
    #[tabled(rename = "Credentials")]
    credentials: String,
    #[tabled(skip)]
    credentials_resolved: bool,
}

impl From<&Environment> for EnvironmentRow {
    fn from(env: &Environment) -> Self {
        let credentials = resolve_credentials(env);
        Self {
            name: env.name.clone(),
            region: env.region.clone(),
            groups: NamespaceClassifier::for_environment(env)
                .group_labels()
                .join(", "),
            credentials: credentials.reference.clone(),
            credentials_resolved: credentials.is_complete(),
        }
    }
}

/// Validate the loaded settings without collecting anything
pub fn validate(settings: &FleetSettings, format: OutputFormat) -> Result<()> {
    let catalog = settings.catalog()?;
    settings.fleet_config().validate(catalog.environments())?;

    let rows: Vec<EnvironmentRow> = catalog
        .environments()
        .iter()
        .map(EnvironmentRow::from)
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            let display: Vec<EnvironmentRow> = rows
                .into_iter()
                .map(|mut row| {
                    row.credentials = if row.credentials_resolved {
                        format!("{} {}", row.credentials, "resolved".green())
                    } else {
                        format!("{} {}", row.credentials, "missing".yellow())
                    };
                    row
                })
                .collect();
            print_table("Environments", &display);
            print_success(&format!(
                "{} environment(s), concurrency {}, top {}",
                display.len(),
                settings.concurrency,
                settings.top_n
            ));
        }
    }

    Ok(())
}
