pub mod client;
pub mod config;
pub mod error;
pub mod sample;

pub use client::{
    DatadogClient, DynSource, RetryPolicy, SloHistorySource, ThresholdSelection, GET_SLO_HISTORY,
};
pub use config::{ExporterConfig, PushFailurePolicy};
pub use error::{ClientInitError, ConfigError, FetchError};
pub use sample::{DayWindow, SloSample};
