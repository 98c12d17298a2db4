//! Wiremock tests for pushing the registry to a Pushgateway.

use slo_core::{DayWindow, SloSample};
use slo_metrics::{MetricsPublisher, PushError, PushgatewayPublisher, SloMetrics};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB: &str = "datadog-slo-exporter";

fn recorded_metrics() -> SloMetrics {
    let metrics = SloMetrics::new().unwrap();
    metrics.record_sample(
        DayWindow::WEEK,
        &SloSample::new(0.999, "checkout-availability", 99.9, "7d"),
    );
    metrics.record_failure("GetSLOHistory", "500");
    metrics
}

#[tokio::test]
async fn push_puts_text_exposition_under_job() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/metrics/job/datadog-slo-exporter"))
        .and(header("content-type", "text/plain; version=0.0.4"))
        .and(body_string_contains("datadog_slo_uptime"))
        .and(body_string_contains(r#"threshold="99.90""#))
        .and(body_string_contains("datadog_api_error_total"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = PushgatewayPublisher::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let payload = recorded_metrics().payload().unwrap();

    publisher.push(JOB, &payload).await.expect("push should succeed");
}

#[tokio::test]
async fn push_accepts_any_success_status() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/metrics/job/datadog-slo-exporter"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let publisher = PushgatewayPublisher::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let payload = recorded_metrics().payload().unwrap();

    assert!(publisher.push(JOB, &payload).await.is_ok());
}

#[tokio::test]
async fn push_reports_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("storage unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = PushgatewayPublisher::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let payload = recorded_metrics().payload().unwrap();

    match publisher.push(JOB, &payload).await {
        Err(PushError::Status { code, body, .. }) => {
            assert_eq!(code, 500);
            assert_eq!(body, "storage unavailable");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn push_reports_transport_error() {
    let publisher = PushgatewayPublisher::new("127.0.0.1:9", Duration::from_secs(5)).unwrap();
    let payload = recorded_metrics().payload().unwrap();

    match publisher.push(JOB, &payload).await {
        Err(PushError::Transport { url, .. }) => {
            assert_eq!(url, "http://127.0.0.1:9/metrics/job/datadog-slo-exporter");
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}
