use crate::{
    config::ExporterConfig,
    error::{ClientInitError, FetchError},
    sample::{DayWindow, SloSample},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Operation name used as the `api_call` label on request failures.
pub const GET_SLO_HISTORY: &str = "GetSLOHistory";

const API_KEY_HEADER: &str = "DD-API-KEY";
const APP_KEY_HEADER: &str = "DD-APPLICATION-KEY";
const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";
const MAX_ERROR_BODY: usize = 512;

/// Source of SLO history samples.
#[async_trait]
pub trait SloHistorySource: Send + Sync {
    /// Fetch the SLO state over the last `window` days.
    async fn fetch_sample(&self, slo_id: &str, window: DayWindow) -> Result<SloSample, FetchError>;

    /// Human readable name used in logs.
    fn describe(&self) -> String {
        "slo history source".to_string()
    }
}

pub type DynSource = Arc<dyn SloHistorySource>;

/// How the target threshold is picked when the API returns several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdSelection {
    /// Entry whose timeframe equals the requested window label, falling
    /// back to the SLO's primary threshold.
    #[default]
    MatchWindow,
    /// Entry with the longest timeframe. Matches exporters that kept
    /// whichever threshold they iterated last.
    LastEntry,
}

impl FromStr for ThresholdSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "match-window" | "match" => Ok(ThresholdSelection::MatchWindow),
            "last-entry" | "last" => Ok(ThresholdSelection::LastEntry),
            other => Err(format!(
                "unknown threshold selection '{}', expected 'match-window' or 'last-entry'",
                other
            )),
        }
    }
}

impl fmt::Display for ThresholdSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdSelection::MatchWindow => write!(f, "match-window"),
            ThresholdSelection::LastEntry => write!(f, "last-entry"),
        }
    }
}

/// Bounded retry schedule for rate limiting and server errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_secs(2),
            backoff_multiplier: 2,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based). A server supplied
    /// delay wins over the exponential schedule; both are capped.
    pub fn delay_for(&self, retry: u32, server_hint: Option<Duration>) -> Duration {
        let scheduled = self
            .initial_backoff
            .saturating_mul(self.backoff_multiplier.saturating_pow(retry));
        server_hint.unwrap_or(scheduled).min(self.max_backoff)
    }
}

/// Datadog SLO history API client.
pub struct DatadogClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    app_key: String,
    retry: RetryPolicy,
    selection: ThresholdSelection,
}

impl DatadogClient {
    pub fn new(config: &ExporterConfig) -> Result<Self, ClientInitError> {
        let raw = config.api_base_url();
        let base_url = Url::parse(&raw).map_err(|e| ClientInitError::InvalidBaseUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientInitError::InvalidBaseUrl {
                url: raw,
                reason: "expected an http(s) URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("datadog-slo-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            app_key: config.app_key.clone(),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                ..RetryPolicy::default()
            },
            selection: config.threshold_selection,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_threshold_selection(mut self, selection: ThresholdSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn history_url(&self, slo_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "slo", slo_id, "history"]);
        }
        url
    }

    /// Issue the history request, retrying throttled and failed attempts.
    /// Returns the status and body of the first successful response.
    async fn get_history(
        &self,
        slo_id: &str,
        window: DayWindow,
    ) -> Result<(u16, String), FetchError> {
        let url = self.history_url(slo_id);
        let (from_ts, to_ts) = window.range_ending_at(Utc::now());
        let mut retry = 0;

        loop {
            debug!(%url, from_ts, to_ts, retry, "Requesting SLO history");

            let result = self
                .http
                .get(url.clone())
                .header(API_KEY_HEADER, &self.api_key)
                .header(APP_KEY_HEADER, &self.app_key)
                .header(header::ACCEPT, "application/json")
                .query(&[("from_ts", from_ts), ("to_ts", to_ts)])
                .send()
                .await;

            let delay = match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body = response.text().await.map_err(|e| FetchError::Malformed {
                            call: GET_SLO_HISTORY,
                            status: status.as_u16(),
                            reason: format!("failed to read body: {}", e),
                        })?;
                        return Ok((status.as_u16(), body));
                    }

                    let hint = server_delay_hint(&response);
                    let body = response.text().await.unwrap_or_default();

                    if !is_retryable_status(status) || retry >= self.retry.max_retries {
                        return Err(FetchError::Status {
                            call: GET_SLO_HISTORY,
                            code: status.as_u16(),
                            body: truncate(&body),
                        });
                    }

                    let delay = self.retry.delay_for(retry, hint);
                    warn!(
                        "{} returned HTTP {}, retrying in {:?} ({}/{})",
                        GET_SLO_HISTORY,
                        status.as_u16(),
                        delay,
                        retry + 1,
                        self.retry.max_retries
                    );
                    delay
                }
                Err(e) => {
                    if !(e.is_timeout() || e.is_connect()) || retry >= self.retry.max_retries {
                        return Err(FetchError::Transport {
                            call: GET_SLO_HISTORY,
                            message: e.to_string(),
                        });
                    }

                    let delay = self.retry.delay_for(retry, None);
                    warn!(
                        "{} transport error: {}, retrying in {:?} ({}/{})",
                        GET_SLO_HISTORY,
                        e,
                        delay,
                        retry + 1,
                        self.retry.max_retries
                    );
                    delay
                }
            };

            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}

#[async_trait]
impl SloHistorySource for DatadogClient {
    async fn fetch_sample(&self, slo_id: &str, window: DayWindow) -> Result<SloSample, FetchError> {
        let (status, body) = self.get_history(slo_id, window).await?;

        let malformed = |reason: String| FetchError::Malformed {
            call: GET_SLO_HISTORY,
            status,
            reason,
        };

        let response: HistoryResponse =
            serde_json::from_str(&body).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

        if let Some(errors) = response.errors.as_ref().filter(|errors| !errors.is_empty()) {
            warn!(
                "{} for SLO {} ({}) reported errors: {}",
                GET_SLO_HISTORY,
                slo_id,
                window,
                serde_json::Value::Array(errors.clone())
            );
        }

        parse_sample(response, window, self.selection).map_err(malformed)
    }

    fn describe(&self) -> String {
        format!("Datadog API at {}", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    data: Option<HistoryData>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct HistoryData {
    overall: Option<OverallData>,
    #[serde(default)]
    slo: Option<SloDefinition>,
    #[serde(default)]
    thresholds: Option<BTreeMap<String, ThresholdEntry>>,
}

#[derive(Debug, Deserialize)]
struct OverallData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sli_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SloDefinition {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    thresholds: Option<Vec<ThresholdEntry>>,
    #[serde(default)]
    target_threshold: Option<f64>,
    #[serde(default)]
    timeframe: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ThresholdEntry {
    target: f64,
    timeframe: String,
}

fn parse_sample(
    response: HistoryResponse,
    window: DayWindow,
    selection: ThresholdSelection,
) -> Result<SloSample, String> {
    let data = response
        .data
        .ok_or_else(|| "response has no `data` object".to_string())?;
    let overall = data
        .overall
        .as_ref()
        .ok_or_else(|| "response has no `data.overall` object".to_string())?;
    let sli_value = overall
        .sli_value
        .ok_or_else(|| "response has no `data.overall.sli_value`".to_string())?;

    let slo_name = overall
        .name
        .clone()
        .or_else(|| data.slo.as_ref().and_then(|slo| slo.name.clone()))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "response has no SLO name".to_string())?;

    let threshold = select_threshold(&data, window, selection)
        .ok_or_else(|| format!("response has no usable threshold for window {}", window))?;

    Ok(SloSample {
        sli_value,
        slo_name,
        threshold: threshold.target,
        timeframe: threshold.timeframe,
    })
}

/// Pick the threshold entry for `window` according to `selection`.
///
/// Entries come from both `data.thresholds` and `data.slo.thresholds`,
/// de-duplicated by timeframe and ordered by timeframe length.
fn select_threshold(
    data: &HistoryData,
    window: DayWindow,
    selection: ThresholdSelection,
) -> Option<ThresholdEntry> {
    let mut entries: Vec<ThresholdEntry> = data
        .thresholds
        .iter()
        .flat_map(|map| map.values().cloned())
        .collect();

    let slo_entries = data.slo.as_ref().and_then(|slo| slo.thresholds.as_ref());
    for entry in slo_entries.into_iter().flatten() {
        if !entries.iter().any(|e| e.timeframe == entry.timeframe) {
            entries.push(entry.clone());
        }
    }

    entries.sort_by(|a, b| {
        timeframe_days(&a.timeframe)
            .cmp(&timeframe_days(&b.timeframe))
            .then_with(|| a.timeframe.cmp(&b.timeframe))
    });

    let primary = data.slo.as_ref().and_then(|slo| {
        Some(ThresholdEntry {
            target: slo.target_threshold?,
            timeframe: slo.timeframe.clone()?,
        })
    });

    match selection {
        ThresholdSelection::MatchWindow => {
            let label = window.label();
            let matching = entries.iter().position(|e| e.timeframe == label);
            match matching {
                Some(index) => Some(entries.swap_remove(index)),
                None => primary.or_else(|| entries.pop()),
            }
        }
        ThresholdSelection::LastEntry => entries.pop().or(primary),
    }
}

/// Day count of labels like `30d`; unknown labels sort last.
fn timeframe_days(timeframe: &str) -> u32 {
    timeframe
        .strip_suffix('d')
        .and_then(|days| days.parse().ok())
        .unwrap_or(u32::MAX)
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn server_delay_hint(response: &Response) -> Option<Duration> {
    [header::RETRY_AFTER.as_str(), RATE_LIMIT_RESET_HEADER]
        .iter()
        .find_map(|name| {
            response
                .headers()
                .get(*name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
        })
        .map(Duration::from_secs)
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_ERROR_BODY).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(
        json: serde_json::Value,
        window: DayWindow,
        selection: ThresholdSelection,
    ) -> Result<SloSample, String> {
        let response: HistoryResponse = serde_json::from_value(json).unwrap();
        parse_sample(response, window, selection)
    }

    fn history_body() -> serde_json::Value {
        serde_json::json!({
            "data": {
                "from_ts": 1711281600,
                "to_ts": 1711886400,
                "type": "metric",
                "overall": {
                    "name": "checkout-availability",
                    "sli_value": 99.95,
                    "span_precision": 2
                },
                "slo": {
                    "id": "abc123",
                    "name": "checkout-availability",
                    "target_threshold": 99.9,
                    "timeframe": "7d",
                    "thresholds": [
                        {"target": 99.9, "target_display": "99.9", "timeframe": "7d"},
                        {"target": 99.5, "target_display": "99.5", "timeframe": "30d"}
                    ]
                },
                "thresholds": {
                    "90d": {"target": 99.0, "target_display": "99.0", "timeframe": "90d"},
                    "7d": {"target": 99.9, "target_display": "99.9", "timeframe": "7d"}
                }
            },
            "errors": null
        })
    }

    #[test]
    fn test_match_window_selects_requested_timeframe() {
        let sample = parse(
            history_body(),
            DayWindow::MONTH,
            ThresholdSelection::MatchWindow,
        )
        .unwrap();

        assert_eq!(sample.slo_name, "checkout-availability");
        assert_eq!(sample.sli_value, 99.95);
        assert_eq!(sample.threshold, 99.5);
        assert_eq!(sample.timeframe, "30d");

        let sample = parse(
            history_body(),
            DayWindow::QUARTER,
            ThresholdSelection::MatchWindow,
        )
        .unwrap();
        assert_eq!(sample.threshold, 99.0);
        assert_eq!(sample.timeframe, "90d");
    }

    #[test]
    fn test_match_window_falls_back_to_primary_threshold() {
        let mut body = history_body();
        body["data"]["thresholds"] = serde_json::Value::Null;
        body["data"]["slo"]["thresholds"] = serde_json::json!([
            {"target": 99.9, "timeframe": "7d"}
        ]);

        let sample = parse(body, DayWindow::QUARTER, ThresholdSelection::MatchWindow).unwrap();
        assert_eq!(sample.threshold, 99.9);
        assert_eq!(sample.timeframe, "7d");
    }

    #[test]
    fn test_match_window_without_slo_block_keeps_sample() {
        let body = serde_json::json!({
            "data": {
                "overall": {"name": "checkout-availability", "sli_value": 99.95},
                "thresholds": {
                    "30d": {"target": 99.5, "timeframe": "30d"},
                    "90d": {"target": 99.0, "timeframe": "90d"}
                }
            }
        });

        let sample = parse(body, DayWindow::WEEK, ThresholdSelection::MatchWindow).unwrap();
        assert_eq!(sample.sli_value, 99.95);
        assert_eq!(sample.threshold, 99.0);
        assert_eq!(sample.timeframe, "90d");
    }

    #[test]
    fn test_last_entry_uses_longest_timeframe() {
        let sample = parse(history_body(), DayWindow::WEEK, ThresholdSelection::LastEntry).unwrap();

        assert_eq!(sample.threshold, 99.0);
        assert_eq!(sample.timeframe, "90d");
    }

    #[test]
    fn test_name_falls_back_to_slo_definition() {
        let mut body = history_body();
        body["data"]["overall"]["name"] = serde_json::Value::Null;

        let sample = parse(body, DayWindow::WEEK, ThresholdSelection::MatchWindow).unwrap();
        assert_eq!(sample.slo_name, "checkout-availability");
    }

    #[test]
    fn test_unexpected_shapes_are_errors() {
        let mut body = history_body();
        body["data"]["overall"]["sli_value"] = serde_json::Value::Null;
        assert!(parse(body, DayWindow::WEEK, ThresholdSelection::MatchWindow).is_err());

        let body = serde_json::json!({"errors": ["SLO not found"]});
        assert!(parse(body, DayWindow::WEEK, ThresholdSelection::MatchWindow).is_err());

        let body = serde_json::json!({
            "data": {"overall": {"name": "no-thresholds", "sli_value": 100.0}}
        });
        let err = parse(body, DayWindow::WEEK, ThresholdSelection::MatchWindow).unwrap_err();
        assert!(err.contains("threshold"));
    }

    #[test]
    fn test_retry_delay() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(0, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10, None), Duration::from_secs(30));
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn test_threshold_selection_parsing() {
        assert_eq!(
            "match-window".parse::<ThresholdSelection>(),
            Ok(ThresholdSelection::MatchWindow)
        );
        assert_eq!(
            "LAST-ENTRY".parse::<ThresholdSelection>(),
            Ok(ThresholdSelection::LastEntry)
        );
        assert!("first".parse::<ThresholdSelection>().is_err());
        assert_eq!(ThresholdSelection::LastEntry.to_string(), "last-entry");
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate("Forbidden"), "Forbidden");
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&long).len(), MAX_ERROR_BODY + 3);
    }
}
