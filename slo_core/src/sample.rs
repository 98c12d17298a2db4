use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of days of history requested, ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayWindow(u32);

impl DayWindow {
    pub const WEEK: DayWindow = DayWindow(7);
    pub const MONTH: DayWindow = DayWindow(30);
    pub const QUARTER: DayWindow = DayWindow(90);

    /// Windows queried on every run, in order.
    pub const STANDARD: [DayWindow; 3] = [Self::WEEK, Self::MONTH, Self::QUARTER];

    pub const fn new(days: u32) -> Self {
        Self(days)
    }

    pub const fn days(self) -> u32 {
        self.0
    }

    /// Label value for the `window` metric label, e.g. `30d`.
    pub fn label(self) -> String {
        format!("{}d", self.0)
    }

    /// `(from_ts, to_ts)` in Unix seconds for the window ending at `now`.
    pub fn range_ending_at(self, now: DateTime<Utc>) -> (i64, i64) {
        let from = now - chrono::Duration::days(i64::from(self.0));
        (from.timestamp(), now.timestamp())
    }
}

impl fmt::Display for DayWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.0)
    }
}

/// One SLO history reading for a single window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloSample {
    pub sli_value: f64,
    pub slo_name: String,
    pub threshold: f64,
    pub timeframe: String,
}

impl SloSample {
    pub fn new(
        sli_value: f64,
        slo_name: impl Into<String>,
        threshold: f64,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            sli_value,
            slo_name: slo_name.into(),
            threshold,
            timeframe: timeframe.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_label() {
        assert_eq!(DayWindow::new(7).label(), "7d");
        assert_eq!(DayWindow::MONTH.to_string(), "30d");
        assert_eq!(DayWindow::STANDARD.map(DayWindow::days), [7, 30, 90]);
    }

    #[test]
    fn test_range_ending_at() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let (from, to) = DayWindow::WEEK.range_ending_at(now);

        assert_eq!(to, now.timestamp());
        assert_eq!(to - from, 7 * 86_400);
    }
}
