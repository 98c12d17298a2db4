use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metric registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Invalid push endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Invalid job name '{0}'")]
    InvalidJob(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Push to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Push to {url} returned HTTP {code}: {body}")]
    Status { url: String, code: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
