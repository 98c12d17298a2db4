use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slo_core::{DayWindow, SloSample};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowOutcome {
    Recorded { sample: SloSample },
    Failed {
        api_call: String,
        status_code: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: DayWindow,
    pub outcome: WindowOutcome,
}

impl WindowReport {
    pub fn is_recorded(&self) -> bool {
        matches!(self.outcome, WindowOutcome::Recorded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed { destination: String },
    Failed { destination: String, reason: String },
}

/// Summary of a single exporter run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub slo_id: String,
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub windows: Vec<WindowReport>,
    pub push: PushOutcome,
}

impl RunReport {
    pub fn recorded_windows(&self) -> usize {
        self.windows.iter().filter(|w| w.is_recorded()).count()
    }

    pub fn failed_windows(&self) -> usize {
        self.windows.len() - self.recorded_windows()
    }

    pub fn pushed(&self) -> bool {
        matches!(self.push, PushOutcome::Pushed { .. })
    }

    pub fn sample_for(&self, window: DayWindow) -> Option<&SloSample> {
        self.windows
            .iter()
            .filter(|w| w.window == window)
            .find_map(|w| match &w.outcome {
                WindowOutcome::Recorded { sample } => Some(sample),
                WindowOutcome::Failed { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport {
            slo_id: "abc123".to_string(),
            job: "datadog-slo-exporter".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            windows: vec![
                WindowReport {
                    window: DayWindow::WEEK,
                    outcome: WindowOutcome::Recorded {
                        sample: SloSample::new(0.999, "checkout-availability", 99.9, "7d"),
                    },
                },
                WindowReport {
                    window: DayWindow::MONTH,
                    outcome: WindowOutcome::Failed {
                        api_call: "GetSLOHistory".to_string(),
                        status_code: "500".to_string(),
                        reason: "Internal Server Error".to_string(),
                    },
                },
            ],
            push: PushOutcome::Pushed {
                destination: "http://pushgateway:9091".to_string(),
            },
        }
    }

    #[test]
    fn test_report_counts() {
        let report = report();

        assert_eq!(report.recorded_windows(), 1);
        assert_eq!(report.failed_windows(), 1);
        assert!(report.pushed());
        assert!(report.sample_for(DayWindow::WEEK).is_some());
        assert!(report.sample_for(DayWindow::MONTH).is_none());
    }

    #[test]
    fn test_report_json() {
        let json = serde_json::to_value(report()).unwrap();

        assert_eq!(json["windows"][0]["window"], 7);
        assert_eq!(json["windows"][0]["outcome"]["status"], "recorded");
        assert_eq!(json["windows"][1]["outcome"]["status_code"], "500");
        assert_eq!(json["push"]["status"], "pushed");
    }
}
