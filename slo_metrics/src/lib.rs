pub mod collector;
pub mod error;
pub mod exporters;

pub use collector::{format_threshold, SloMetrics, API_ERROR_TOTAL, SLO_UPTIME};
pub use error::{MetricsError, PushError};
pub use exporters::{
    DryRunPublisher, DynPublisher, MetricsPublisher, PushPayload, PushgatewayPublisher,
};
