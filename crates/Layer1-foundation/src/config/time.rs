//! 시간 간격 표현
//!
//! 옵션에서는 숫자(초) 또는 `{ value, unit }` 두 형태를 모두 허용하고,
//! 내부에서는 곧바로 `std::time::Duration` 으로 정규화한다.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 시간 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[serde(alias = "ms")]
    Milliseconds,
    #[serde(alias = "s")]
    Seconds,
    #[serde(alias = "m")]
    Minutes,
    #[serde(alias = "h")]
    Hours,
    #[serde(alias = "d")]
    Days,
    #[serde(alias = "w")]
    Weeks,
}

impl TimeUnit {
    fn millis(self) -> u64 {
        match self {
            TimeUnit::Milliseconds => 1,
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
            TimeUnit::Weeks => 604_800_000,
        }
    }
}

/// 숫자(초) 또는 `{ value, unit }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpan {
    Seconds(u64),
    Unit { value: u64, unit: TimeUnit },
}

impl TimeSpan {
    pub fn secs(value: u64) -> Self {
        TimeSpan::Seconds(value)
    }

    pub fn new(value: u64, unit: TimeUnit) -> Self {
        TimeSpan::Unit { value, unit }
    }

    pub fn to_duration(self) -> Duration {
        match self {
            TimeSpan::Seconds(secs) => Duration::from_secs(secs),
            TimeSpan::Unit { value, unit } => {
                Duration::from_millis(value.saturating_mul(unit.millis()))
            }
        }
    }
}

impl From<u64> for TimeSpan {
    fn from(secs: u64) -> Self {
        TimeSpan::Seconds(secs)
    }
}

impl From<TimeSpan> for Duration {
    fn from(span: TimeSpan) -> Self {
        span.to_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_is_seconds() {
        let span: TimeSpan = serde_json::from_str("5").unwrap();
        assert_eq!(span.to_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_unit_form() {
        let span: TimeSpan = serde_json::from_str(r#"{"value": 2, "unit": "minutes"}"#).unwrap();
        assert_eq!(span.to_duration(), Duration::from_secs(120));

        let short: TimeSpan = serde_json::from_str(r#"{"value": 250, "unit": "ms"}"#).unwrap();
        assert_eq!(short.to_duration(), Duration::from_millis(250));
    }
}
