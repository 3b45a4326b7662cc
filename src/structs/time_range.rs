use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Bar granularity of a `TimeSeries`.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week { anchor: Weekday },
    Month,
}
