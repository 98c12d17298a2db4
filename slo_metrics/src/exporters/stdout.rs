use super::{MetricsPublisher, PushPayload};
use crate::error::PushError;
use async_trait::async_trait;
use std::io::Write;

/// Writes the payload to stdout instead of pushing it.
#[derive(Debug, Default)]
pub struct DryRunPublisher;

impl DryRunPublisher {
    pub fn new() -> Self {
        Self
    }

    fn write_to<W: Write>(
        &self,
        job: &str,
        payload: &PushPayload,
        mut out: W,
    ) -> Result<(), PushError> {
        writeln!(out, "# job: {}", job)?;
        out.write_all(payload.body.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl MetricsPublisher for DryRunPublisher {
    async fn push(&self, job: &str, payload: &PushPayload) -> Result<(), PushError> {
        self.write_to(job, payload, std::io::stdout().lock())
    }

    fn describe(&self) -> String {
        "stdout (dry run)".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_output() {
        let payload = PushPayload {
            body: "datadog_slo_uptime{window=\"7d\"} 0.999\n".to_string(),
            content_type: "text/plain; version=0.0.4".to_string(),
        };
        let mut out = Vec::new();

        DryRunPublisher::new()
            .write_to("datadog-slo-exporter", &payload, &mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# job: datadog-slo-exporter\n"));
        assert!(text.contains("0.999"));
    }
}
