use crate::report::RunReport;
use slo_core::{ClientInitError, ConfigError};
use slo_metrics::{MetricsError, PushError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to initialize Datadog client: {0}")]
    ClientInit(#[from] ClientInitError),

    #[error("Failed to initialize publisher: {0}")]
    PublisherInit(#[source] PushError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// The push failed under the `fail` policy. The report still holds
    /// every window outcome.
    #[error("Error pushing metrics: {source}")]
    Push {
        #[source]
        source: PushError,
        report: Box<RunReport>,
    },
}
