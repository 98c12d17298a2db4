use crate::{
    error::ExporterError,
    report::{PushOutcome, RunReport, WindowOutcome, WindowReport},
};
use chrono::Utc;
use slo_core::{DayWindow, DynSource, ExporterConfig, PushFailurePolicy};
use slo_metrics::{DynPublisher, PushError, SloMetrics};
use std::fmt;
use tracing::{error, info, warn};

/// Job name the metrics are grouped under on the push endpoint.
pub const JOB_NAME: &str = "datadog-slo-exporter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ConfigLoaded,
    ClientReady,
    Fetching(DayWindow),
    Published,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Init => write!(f, "init"),
            RunState::ConfigLoaded => write!(f, "config_loaded"),
            RunState::ClientReady => write!(f, "client_ready"),
            RunState::Fetching(window) => write!(f, "fetching_{}", window),
            RunState::Published => write!(f, "published"),
            RunState::Done => write!(f, "done"),
        }
    }
}

/// Fetches every standard window for one SLO and pushes the result once.
pub struct SloExporter {
    slo_id: String,
    source: DynSource,
    publisher: DynPublisher,
    metrics: SloMetrics,
    push_failure: PushFailurePolicy,
    windows: Vec<DayWindow>,
}

impl SloExporter {
    pub fn new(
        config: &ExporterConfig,
        source: DynSource,
        publisher: DynPublisher,
    ) -> Result<Self, ExporterError> {
        Ok(Self {
            slo_id: config.slo_id.clone(),
            source,
            publisher,
            metrics: SloMetrics::new()?,
            push_failure: config.push_failure,
            windows: DayWindow::STANDARD.to_vec(),
        })
    }

    /// Load configuration through `lookup`, then let `build` create the
    /// source and publisher. `build` is never called when configuration
    /// is incomplete, so no network client exists on that path.
    pub fn bootstrap<L, B>(lookup: L, build: B) -> Result<Self, ExporterError>
    where
        L: Fn(&str) -> Option<String>,
        B: FnOnce(&mut ExporterConfig) -> Result<(DynSource, DynPublisher), ExporterError>,
    {
        info!(state = %RunState::Init, "Starting Datadog SLO exporter");

        let mut config = ExporterConfig::from_lookup(lookup)?;
        info!(state = %RunState::ConfigLoaded, slo_id = %config.slo_id, "Configuration loaded");

        let (source, publisher) = build(&mut config)?;
        info!(
            state = %RunState::ClientReady,
            source = %source.describe(),
            destination = %publisher.describe(),
            "Datadog client initialized successfully"
        );

        Self::new(&config, source, publisher)
    }

    pub fn metrics(&self) -> &SloMetrics {
        &self.metrics
    }

    pub fn windows(&self) -> &[DayWindow] {
        &self.windows
    }

    pub async fn run(&self) -> Result<RunReport, ExporterError> {
        let started_at = Utc::now();
        let mut windows = Vec::with_capacity(self.windows.len());

        for &window in &self.windows {
            info!(
                state = %RunState::Fetching(window),
                "Fetching SLO history for {} days",
                window.days()
            );
            windows.push(WindowReport {
                window,
                outcome: self.collect_window(window).await,
            });
        }

        let (push, push_error) = self.publish().await?;
        info!(state = %RunState::Done, "Exporter run finished");

        let report = RunReport {
            slo_id: self.slo_id.clone(),
            job: JOB_NAME.to_string(),
            started_at,
            finished_at: Utc::now(),
            windows,
            push,
        };

        match push_error {
            Some(source) => Err(ExporterError::Push {
                source,
                report: Box::new(report),
            }),
            None => Ok(report),
        }
    }

    async fn collect_window(&self, window: DayWindow) -> WindowOutcome {
        match self.source.fetch_sample(&self.slo_id, window).await {
            Ok(sample) => {
                self.metrics.record_sample(window, &sample);
                info!(
                    "Recorded SLI {} for '{}' over {} (threshold {}, timeframe {})",
                    sample.sli_value, sample.slo_name, window, sample.threshold, sample.timeframe
                );
                WindowOutcome::Recorded { sample }
            }
            Err(e) => {
                let status_code = e.status_label();
                self.metrics.record_failure(e.call(), &status_code);
                warn!("Error getting SLO data for {} window: {}", window, e);
                WindowOutcome::Failed {
                    api_call: e.call().to_string(),
                    status_code,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Push once. A failure is returned alongside the outcome only when the
    /// policy says it should fail the run.
    async fn publish(&self) -> Result<(PushOutcome, Option<PushError>), ExporterError> {
        let payload = self.metrics.payload()?;
        let destination = self.publisher.describe();

        match self.publisher.push(JOB_NAME, &payload).await {
            Ok(()) => {
                info!(
                    state = %RunState::Published,
                    "Metrics pushed to {} successfully", destination
                );
                Ok((PushOutcome::Pushed { destination }, None))
            }
            Err(e) => {
                let outcome = PushOutcome::Failed {
                    destination: destination.clone(),
                    reason: e.to_string(),
                };
                match self.push_failure {
                    PushFailurePolicy::Fail => {
                        error!("Error pushing metrics to {}: {}", destination, e);
                        Ok((outcome, Some(e)))
                    }
                    PushFailurePolicy::Ignore => {
                        warn!("Error pushing metrics to {} (ignored): {}", destination, e);
                        Ok((outcome, None))
                    }
                }
            }
        }
    }
}
