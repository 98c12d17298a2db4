use crate::ui;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use slo_core::{DatadogClient, DynSource, ExporterConfig, PushFailurePolicy, ThresholdSelection};
use slo_metrics::{DryRunPublisher, DynPublisher, PushgatewayPublisher};
use slo_runner::{ExporterError, PushOutcome, RunReport, SloExporter, WindowOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Print the metrics to stdout instead of pushing them
    #[arg(long)]
    pub dry_run: bool,

    /// What a failed push does to the exit status (fail, ignore)
    #[arg(long)]
    pub push_failure: Option<PushFailurePolicy>,

    /// How to pick the SLO threshold (match-window, last-entry)
    #[arg(long)]
    pub threshold_selection: Option<ThresholdSelection>,

    /// Write the run report as JSON
    #[arg(short, long)]
    pub output_json: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut ExporterConfig) {
        if let Some(policy) = self.push_failure {
            config.push_failure = policy;
        }
        if let Some(selection) = self.threshold_selection {
            config.threshold_selection = selection;
        }
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let exporter = SloExporter::bootstrap(
        |name| std::env::var(name).ok(),
        |config| {
            args.apply(config);
            build_collaborators(config, args.dry_run)
        },
    )?;

    let (report, failure) = match exporter.run().await {
        Ok(report) => (report, None),
        Err(ExporterError::Push { source, report }) => (*report, Some(source)),
        Err(e) => return Err(e.into()),
    };

    if let Some(json_path) = &args.output_json {
        info!("Saving JSON report to: {}", json_path.display());
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(json_path, json).await?;
    }

    // stdout carries the metrics in dry-run mode
    if !args.dry_run {
        print_summary(&report);
    }

    match failure {
        Some(source) => Err(anyhow!("Error pushing metrics: {}", source)),
        None => Ok(()),
    }
}

fn build_collaborators(
    config: &ExporterConfig,
    dry_run: bool,
) -> Result<(DynSource, DynPublisher), ExporterError> {
    let source: DynSource = Arc::new(DatadogClient::new(config)?);

    let publisher: DynPublisher = if dry_run {
        Arc::new(DryRunPublisher::new())
    } else {
        Arc::new(
            PushgatewayPublisher::new(&config.push_endpoint, config.http_timeout)
                .map_err(ExporterError::PublisherInit)?,
        )
    };

    Ok((source, publisher))
}

fn print_summary(report: &RunReport) {
    ui::print_header("SLO Export Results");
    println!("SLO: {}", report.slo_id.cyan());

    for window in &report.windows {
        match &window.outcome {
            WindowOutcome::Recorded { sample } => {
                println!(
                    "  {} - SLI: {}, Threshold: {:.2}, Timeframe: {}",
                    window.window.to_string().yellow(),
                    sample.sli_value,
                    sample.threshold,
                    sample.timeframe
                );
            }
            WindowOutcome::Failed {
                status_code,
                reason,
                ..
            } => {
                println!(
                    "  {} - {} (status {}): {}",
                    window.window.to_string().yellow(),
                    "failed".red(),
                    status_code,
                    reason
                );
            }
        }
    }

    match &report.push {
        PushOutcome::Pushed { destination } => {
            ui::print_success(&format!("Metrics pushed to {}", destination));
        }
        PushOutcome::Failed {
            destination,
            reason,
        } => {
            ui::print_error(&format!("Push to {} failed: {}", destination, reason));
        }
    }

    if report.failed_windows() > 0 {
        ui::print_warning(&format!(
            "{} of {} windows failed",
            report.failed_windows(),
            report.windows.len()
        ));
    }
}
