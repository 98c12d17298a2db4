use crate::ui;
use anyhow::Result;
use colored::Colorize;
use slo_core::{DatadogClient, DayWindow, ExporterConfig};
use slo_metrics::exporters::pushgateway::normalize_endpoint;
use slo_runner::JOB_NAME;

pub fn execute() -> Result<()> {
    ui::print_header("Validating Configuration");

    let config = match ExporterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            ui::print_error("Configuration is invalid!");
            println!("\nError: {}", e);
            return Err(e.into());
        }
    };

    let client = DatadogClient::new(&config)?;
    let endpoint = normalize_endpoint(&config.push_endpoint)?;

    ui::print_success("Configuration is valid!");
    println!("\nExporter Details:");
    println!("  SLO ID: {}", config.slo_id.green());
    println!("  API Key: {}", "<redacted>".dimmed());
    println!("  App Key: {}", "<redacted>".dimmed());
    println!("  Datadog API: {}", client.base_url());
    println!("  Push URL: {}/metrics/job/{}", endpoint, JOB_NAME);
    println!(
        "  Windows: {}",
        DayWindow::STANDARD
            .iter()
            .map(|window| window.label())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  HTTP Timeout: {}",
        humantime::format_duration(config.http_timeout)
    );
    println!("  Max Retries: {}", config.max_retries);
    println!("  Push Failure Policy: {}", config.push_failure);
    println!("  Threshold Selection: {}", config.threshold_selection);

    if config.max_retries == 0 {
        println!();
        ui::print_warning("Retries are disabled; a single throttled request fails its window");
    }

    Ok(())
}
