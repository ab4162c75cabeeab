//! Query parameters understood by the analytics API.

use crate::InsightsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Window of history to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "7d")]
    LastWeek,
    #[serde(rename = "30d")]
    LastMonth,
    #[serde(rename = "90d")]
    LastQuarter,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        TimeRange::LastHour,
        TimeRange::LastDay,
        TimeRange::LastWeek,
        TimeRange::LastMonth,
        TimeRange::LastQuarter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::LastHour => "1h",
            TimeRange::LastDay => "24h",
            TimeRange::LastWeek => "7d",
            TimeRange::LastMonth => "30d",
            TimeRange::LastQuarter => "90d",
        }
    }
}

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Json, ExportFormat::Xlsx];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    /// File extension for saved exports.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

/// Bucket width for time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Minute,
    Hour,
    Day,
    Week,
}

impl Interval {
    pub const ALL: [Interval; 4] = [Interval::Minute, Interval::Hour, Interval::Day, Interval::Week];

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Minute => "minute",
            Interval::Hour => "hour",
            Interval::Day => "day",
            Interval::Week => "week",
        }
    }
}

macro_rules! impl_name_conversions {
    ($ty:ty, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = InsightsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                <$ty>::ALL
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let known: Vec<&str> = <$ty>::ALL.iter().map(|v| v.as_str()).collect();
                        InsightsError::InvalidArgument(format!(
                            "unknown {} '{}' (expected one of: {})",
                            $what,
                            s,
                            known.join(", ")
                        ))
                    })
            }
        }
    };
}

impl_name_conversions!(TimeRange, "time range");
impl_name_conversions!(ExportFormat, "export format");
impl_name_conversions!(Interval, "interval");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_time_ranges() {
        for range in TimeRange::ALL {
            assert_eq!(range.to_string().parse::<TimeRange>().unwrap(), range);
        }
        assert_eq!("24H".parse::<TimeRange>().unwrap(), TimeRange::LastDay);
    }

    #[test]
    fn unknown_names_are_rejected_with_choices() {
        let err = "2w".parse::<TimeRange>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("2w"));
        assert!(message.contains("1h, 24h, 7d, 30d, 90d"));

        assert!("pdf".parse::<ExportFormat>().is_err());
        assert!("month".parse::<Interval>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&TimeRange::LastWeek).unwrap(), "\"7d\"");
        assert_eq!(serde_json::to_string(&ExportFormat::Xlsx).unwrap(), "\"xlsx\"");
        assert_eq!(
            serde_json::from_str::<Interval>("\"hour\"").unwrap(),
            Interval::Hour
        );
    }
}
