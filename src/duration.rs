//! Serde adapter for duration fields expressed as human-readable strings.
//!
//! Configuration values like retry delays and per-attempt timeouts are
//! written as "500ms", "30s", or "5m"; a bare number is taken as
//! milliseconds. Parsing and formatting are private to this module — the
//! only consumers are the `#[serde(with = ...)]` fields of
//! [`crate::config::CallbackOptions`], [`crate::retry::RetryConfig`], and
//! [`crate::request::CallbackRequest`].

use crate::error::Error;
use std::time::Duration;

/// Splits a duration string into its digit prefix and unit suffix, then
/// maps the unit. Unknown units, empty digit runs, and minute values that
/// overflow the seconds range are `Validation` errors.
fn parse_duration(input: &str) -> Result<Duration, Error> {
    let trimmed = input.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(digits_end);

    let value: u64 = digits.parse().map_err(|_| Error::invalid_duration(input))?;

    match unit.trim_start() {
        "" | "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| Error::invalid_duration(input)),
        _ => Err(Error::invalid_duration(input)),
    }
}

/// Renders a duration in the coarsest suffix that loses no precision.
fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    match ms {
        0 => "0ms".to_string(),
        ms if ms % 60_000 == 0 => format!("{}m", ms / 60_000),
        ms if ms % 1_000 == 0 => format!("{}s", ms / 1_000),
        ms => format!("{ms}ms"),
    }
}

/// Serde adapter for duration fields expressed as strings ("2s", "500ms").
pub mod serde_duration {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// # Errors
    ///
    /// Never fails; durations always format.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    /// # Errors
    ///
    /// Returns a deserialization error when the string is not a supported
    /// duration format.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn parses_millisecond_suffix() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn parses_second_suffix() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parses_minute_suffix() {
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn bare_number_is_milliseconds() {
        assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(parse_duration(" 5 s ").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_empty_garbage_and_unknown_units() {
        for input in ["", "fast", "1h", "1.5s", "-2s"] {
            let err = parse_duration(input).unwrap_err();
            assert!(err.to_string().starts_with("Validation:"), "got: {err}");
        }
    }

    #[test]
    fn rejects_minute_overflow() {
        assert!(parse_duration(&format!("{}m", u64::MAX)).is_err());
    }

    #[test]
    fn format_round_trips() {
        for input in ["500ms", "30s", "2m"] {
            let parsed = parse_duration(input).unwrap();
            assert_eq!(format_duration(parsed), input);
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "crate::duration::serde_duration")]
        delay: Duration,
    }

    #[test]
    fn serde_adapter_round_trips_through_json() {
        let text = serde_json::to_string(&Wrapper {
            delay: Duration::from_millis(1500),
        })
        .unwrap();
        assert_eq!(text, r#"{"delay":"1500ms"}"#);

        let restored: Wrapper = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.delay, Duration::from_millis(1500));
    }

    #[test]
    fn serde_adapter_rejects_bad_strings() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"delay":"soon"}"#).is_err());
    }
}
