pub mod pushgateway;
pub mod stdout;

use crate::error::PushError;
use async_trait::async_trait;
use std::sync::Arc;

pub use pushgateway::PushgatewayPublisher;
pub use stdout::DryRunPublisher;

/// Rendered metrics ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PushPayload {
    pub body: String,
    pub content_type: String,
}

/// Destination the registry snapshot is pushed to once per run.
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    async fn push(&self, job: &str, payload: &PushPayload) -> Result<(), PushError>;

    /// Human readable destination used in logs.
    fn describe(&self) -> String;
}

pub type DynPublisher = Arc<dyn MetricsPublisher>;
