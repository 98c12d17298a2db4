use crate::{client::ThresholdSelection, error::ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DD_API_KEY: &str = "DD_API_KEY";
pub const DD_APP_KEY: &str = "DD_APP_KEY";
pub const DD_SLO_ID: &str = "DD_SLO_ID";
pub const PROMETHEUS_ENDPOINT: &str = "PROMETHEUS_ENDPOINT";

pub const DD_SITE: &str = "DD_SITE";
pub const DD_API_BASE_URL: &str = "DD_API_BASE_URL";
pub const HTTP_TIMEOUT: &str = "SLO_EXPORTER_HTTP_TIMEOUT";
pub const MAX_RETRIES: &str = "SLO_EXPORTER_MAX_RETRIES";
pub const PUSH_FAILURE: &str = "SLO_EXPORTER_PUSH_FAILURE";
pub const THRESHOLD_SELECTION: &str = "SLO_EXPORTER_THRESHOLD_SELECTION";

pub const REQUIRED_VARIABLES: [&str; 4] = [DD_API_KEY, DD_APP_KEY, DD_SLO_ID, PROMETHEUS_ENDPOINT];

pub const DEFAULT_SITE: &str = "datadoghq.com";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What a failed push does to the outcome of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushFailurePolicy {
    /// The run fails and the process exits non-zero.
    #[default]
    Fail,
    /// The failure is logged and recorded in the report only.
    Ignore,
}

impl FromStr for PushFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(PushFailurePolicy::Fail),
            "ignore" => Ok(PushFailurePolicy::Ignore),
            other => Err(format!(
                "unknown push failure policy '{}', expected 'fail' or 'ignore'",
                other
            )),
        }
    }
}

impl fmt::Display for PushFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushFailurePolicy::Fail => write!(f, "fail"),
            PushFailurePolicy::Ignore => write!(f, "ignore"),
        }
    }
}

/// Settings for one exporter run, read once at startup.
#[derive(Clone)]
pub struct ExporterConfig {
    pub api_key: String,
    pub app_key: String,
    pub slo_id: String,
    pub push_endpoint: String,
    pub site: String,
    pub api_base_url: Option<String>,
    pub http_timeout: Duration,
    pub max_retries: u32,
    pub push_failure: PushFailurePolicy,
    pub threshold_selection: ThresholdSelection,
}

impl ExporterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Every missing or blank required variable is reported at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |name: &'static str| match optional(&lookup, name) {
            Some(value) => value,
            None => {
                missing.push(name);
                String::new()
            }
        };

        let api_key = required(DD_API_KEY);
        let app_key = required(DD_APP_KEY);
        let slo_id = required(DD_SLO_ID);
        let push_endpoint = required(PROMETHEUS_ENDPOINT);

        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables(missing));
        }

        let http_timeout = match optional(&lookup, HTTP_TIMEOUT) {
            Some(raw) => humantime::parse_duration(&raw).map_err(|e| ConfigError::InvalidValue {
                name: HTTP_TIMEOUT,
                reason: e.to_string(),
            })?,
            None => DEFAULT_HTTP_TIMEOUT,
        };

        if http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: HTTP_TIMEOUT,
                reason: "timeout must be > 0".to_string(),
            });
        }

        Ok(Self {
            api_key,
            app_key,
            slo_id,
            push_endpoint,
            site: optional(&lookup, DD_SITE).unwrap_or_else(|| DEFAULT_SITE.to_string()),
            api_base_url: optional(&lookup, DD_API_BASE_URL),
            http_timeout,
            max_retries: parse_optional(&lookup, MAX_RETRIES)?.unwrap_or(DEFAULT_MAX_RETRIES),
            push_failure: parse_optional(&lookup, PUSH_FAILURE)?.unwrap_or_default(),
            threshold_selection: parse_optional(&lookup, THRESHOLD_SELECTION)?.unwrap_or_default(),
        })
    }

    /// Base URL of the Datadog API, honouring an explicit override.
    pub fn api_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}", self.site),
        }
    }
}

impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("api_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .field("slo_id", &self.slo_id)
            .field("push_endpoint", &self.push_endpoint)
            .field("site", &self.site)
            .field("api_base_url", &self.api_base_url)
            .field("http_timeout", &self.http_timeout)
            .field("max_retries", &self.max_retries)
            .field("push_failure", &self.push_failure)
            .field("threshold_selection", &self.threshold_selection)
            .finish()
    }
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_optional<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    optional(lookup, name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}
