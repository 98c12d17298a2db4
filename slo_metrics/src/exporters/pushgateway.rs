use super::{MetricsPublisher, PushPayload};
use crate::error::PushError;
use async_trait::async_trait;
use reqwest::{header, Url};
use std::time::Duration;
use tracing::debug;

/// Pushes the payload to a Pushgateway compatible endpoint, replacing
/// every series previously pushed under the same job.
pub struct PushgatewayPublisher {
    http: reqwest::Client,
    endpoint: String,
}

impl PushgatewayPublisher {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PushError> {
        let endpoint = normalize_endpoint(endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Client(e.to_string()))?;

        Ok(Self { http, endpoint })
    }

    pub fn job_url(&self, job: &str) -> Result<String, PushError> {
        if job.is_empty() || job.contains('/') {
            return Err(PushError::InvalidJob(job.to_string()));
        }
        Ok(format!("{}/metrics/job/{}", self.endpoint, job))
    }
}

#[async_trait]
impl MetricsPublisher for PushgatewayPublisher {
    async fn push(&self, job: &str, payload: &PushPayload) -> Result<(), PushError> {
        let url = self.job_url(job)?;
        debug!(%url, bytes = payload.body.len(), "Pushing metrics");

        let response = self
            .http
            .put(&url)
            .header(header::CONTENT_TYPE, &payload.content_type)
            .body(payload.body.clone())
            .send()
            .await
            .map_err(|e| PushError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PushError::Status {
            url,
            code: status.as_u16(),
            body: body.trim().to_string(),
        })
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

/// Trim trailing slashes and default to `http://` when no scheme is given.
pub fn normalize_endpoint(raw: &str) -> Result<String, PushError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(PushError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: "endpoint is empty".to_string(),
        });
    }

    let endpoint = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&endpoint).map_err(|e| PushError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PushError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(endpoint)
}
