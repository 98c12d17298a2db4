use crate::{error::MetricsError, exporters::PushPayload};
use prometheus::{proto::MetricFamily, CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use slo_core::{DayWindow, SloSample};

pub const NAMESPACE: &str = "datadog";
/// Full name of the SLI gauge.
pub const SLO_UPTIME: &str = "datadog_slo_uptime";
/// Full name of the API failure counter.
pub const API_ERROR_TOTAL: &str = "datadog_api_error_total";

const SLO_UPTIME_LABELS: [&str; 4] = ["slo_name", "threshold", "window", "rolling_timeframe"];
const API_ERROR_LABELS: [&str; 2] = ["api_call", "status_code"];

/// Gauge and counter vectors for one exporter run, kept in a private
/// registry so nothing else ends up in the pushed payload.
pub struct SloMetrics {
    registry: Registry,
    slo_uptime: GaugeVec,
    api_errors: CounterVec,
}

impl SloMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let slo_uptime = GaugeVec::new(
            Opts::new("slo_uptime", "History details of a Datadog SLO").namespace(NAMESPACE),
            &SLO_UPTIME_LABELS,
        )?;
        registry.register(Box::new(slo_uptime.clone()))?;

        let api_errors = CounterVec::new(
            Opts::new("api_error_total", "Total Error count on requests to DataDog API")
                .namespace(NAMESPACE),
            &API_ERROR_LABELS,
        )?;
        registry.register(Box::new(api_errors.clone()))?;

        Ok(Self {
            registry,
            slo_uptime,
            api_errors,
        })
    }

    /// Set the SLI gauge for the sample's label set. Last write wins.
    pub fn record_sample(&self, window: DayWindow, sample: &SloSample) {
        let threshold = format_threshold(sample.threshold);
        let window = window.label();

        self.slo_uptime
            .with_label_values(&[
                sample.slo_name.as_str(),
                threshold.as_str(),
                window.as_str(),
                sample.timeframe.as_str(),
            ])
            .set(sample.sli_value);
    }

    pub fn record_failure(&self, call_name: &str, status_code: &str) {
        self.api_errors
            .with_label_values(&[call_name, status_code])
            .inc();
    }

    /// Current gauge value, `None` if the label set was never recorded.
    pub fn sli_value(
        &self,
        slo_name: &str,
        threshold: f64,
        window: DayWindow,
        timeframe: &str,
    ) -> Option<f64> {
        let threshold = format_threshold(threshold);
        let window = window.label();
        let labels = [
            ("slo_name", slo_name),
            ("threshold", threshold.as_str()),
            ("window", window.as_str()),
            ("rolling_timeframe", timeframe),
        ];

        self.find(SLO_UPTIME, &labels)
            .map(|metric| metric.get_gauge().get_value())
    }

    pub fn failure_count(&self, call_name: &str, status_code: &str) -> Option<f64> {
        let labels = [("api_call", call_name), ("status_code", status_code)];

        self.find(API_ERROR_TOTAL, &labels)
            .map(|metric| metric.get_counter().get_value())
    }

    /// Number of gauge label sets recorded so far.
    pub fn sample_series(&self) -> usize {
        self.gather_family(SLO_UPTIME)
            .map(|family| family.get_metric().len())
            .unwrap_or(0)
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let payload = self.payload()?;
        Ok(payload.body)
    }

    pub fn payload(&self) -> Result<PushPayload, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;

        let body = String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))?;

        Ok(PushPayload {
            body,
            content_type: encoder.format_type().to_string(),
        })
    }

    fn gather_family(&self, name: &str) -> Option<MetricFamily> {
        self.registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == name)
    }

    fn find(&self, name: &str, labels: &[(&str, &str)]) -> Option<prometheus::proto::Metric> {
        let family = self.gather_family(name)?;

        family.get_metric().iter().cloned().find(|metric| {
            labels.iter().all(|(key, value)| {
                metric
                    .get_label()
                    .iter()
                    .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
            })
        })
    }
}

/// Threshold label value with two decimals, e.g. `99.50`.
pub fn format_threshold(threshold: f64) -> String {
    format!("{:.2}", threshold)
}
