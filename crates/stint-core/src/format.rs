//! Duration formatting and parsing
//!
//! Elapsed time is persisted in a compact seconds form (`"1.5s"`). Config
//! files and the command line accept the wider human form (`"1m30s"`,
//! `"200ms"`), which [`parse_duration`] understands.

use std::time::Duration;
use thiserror::Error;

/// Errors from strict duration parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseDurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid number in duration: {0}")]
    InvalidNumber(String),

    #[error("missing unit after {0} (use ms, s, m or h)")]
    MissingUnit(String),

    #[error("unknown duration unit: {0}")]
    UnknownUnit(String),

    #[error("duration out of range: {0}")]
    OutOfRange(String),
}

/// Format elapsed time as seconds with one decimal: `"1.5s"`, `"10.0s"`.
///
/// A zero duration is `"0s"`.
pub fn format_elapsed(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    format!("{:.1}s", d.as_secs_f64())
}

/// Parse elapsed time written by [`format_elapsed`].
///
/// Never fails: anything unparsable decodes to zero so a damaged session
/// record still loads.
pub fn parse_elapsed(s: &str) -> Duration {
    match parse_duration(s) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!("treating elapsed {:?} as zero: {}", s, e);
            Duration::ZERO
        }
    }
}

/// Parse a human duration such as `25m`, `1m30s`, `2.5s` or `200ms`.
///
/// A bare `0` is accepted. Resolution is one millisecond.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ParseDurationError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_ms = 0.0_f64;
    let mut rest = s;

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(ParseDurationError::InvalidNumber(s.to_string()));
        }
        let (number, tail) = rest.split_at(num_len);
        let value: f64 = number
            .parse()
            .map_err(|_| ParseDurationError::InvalidNumber(number.to_string()))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let scale = match unit {
            "ms" => 1.0,
            "s" => 1_000.0,
            "m" => 60_000.0,
            "h" => 3_600_000.0,
            "" => return Err(ParseDurationError::MissingUnit(number.to_string())),
            other => return Err(ParseDurationError::UnknownUnit(other.to_string())),
        };

        total_ms += value * scale;
        rest = next;
    }

    if !total_ms.is_finite() || total_ms > u64::MAX as f64 {
        return Err(ParseDurationError::OutOfRange(s.to_string()));
    }

    Ok(Duration::from_millis(total_ms.round() as u64))
}

/// Format a duration in the compact form accepted by [`parse_duration`]
/// (`"100ms"`, `"1s500ms"`, `"5m"`).
pub fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms == 0 {
        return "0s".to_string();
    }

    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;

    let mut out = String::new();
    for (value, unit) in [(hours, "h"), (mins, "m"), (secs, "s"), (ms, "ms")] {
        if value > 0 {
            out.push_str(&format!("{}{}", value, unit));
        }
    }
    out
}

/// Clock-style text for display: `MM:SS.t`, or `H:MM:SS.t` past an hour.
pub fn clock(d: Duration) -> String {
    let tenths = d.as_millis() / 100;
    let hours = tenths / 36_000;
    let mins = (tenths % 36_000) / 600;
    let secs = (tenths % 600) / 10;
    let tenth = tenths % 10;

    if hours > 0 {
        format!("{}:{:02}:{:02}.{}", hours, mins, secs, tenth)
    } else {
        format!("{:02}:{:02}.{}", mins, secs, tenth)
    }
}

/// Append `unit` to a bare number (`"5"` -> `"5s"`, `"2.5"` -> `"2.5s"`).
///
/// Anything else, including the empty string, comes back unchanged.
pub fn suffix_bare_number(arg: &str, unit: &str) -> String {
    let bare = !arg.is_empty()
        && arg.chars().all(|c| c.is_ascii_digit() || c == '.')
        && arg.parse::<f64>().is_ok();

    if bare {
        format!("{}{}", arg, unit)
    } else {
        arg.to_string()
    }
}

/// Serde adapter storing a `Duration` in the elapsed string form.
///
/// Reading is lenient like [`parse_elapsed`]: a value of the wrong type
/// decodes to zero instead of failing the whole record.
pub mod elapsed_serde {
    use serde::{de::IgnoredAny, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Other(IgnoredAny),
    }

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_elapsed(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(match Lenient::deserialize(deserializer)? {
            Lenient::Text(s) => super::parse_elapsed(&s),
            Lenient::Other(_) => Duration::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_elapsed(Duration::from_secs(10)), "10.0s");
        assert_eq!(format_elapsed(Duration::from_secs(754)), "754.0s");
    }

    #[test]
    fn test_parse_elapsed() {
        assert_eq!(parse_elapsed("0s"), Duration::ZERO);
        assert_eq!(parse_elapsed("1.5s"), Duration::from_millis(1500));
        assert_eq!(parse_elapsed("10.0s"), Duration::from_secs(10));
        assert_eq!(parse_elapsed("bad"), Duration::ZERO);
        assert_eq!(parse_elapsed(""), Duration::ZERO);
        assert_eq!(parse_elapsed("-3s"), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_roundtrip_at_tenths() {
        for tenths in [1_u64, 9, 10, 15, 99, 600, 5_999, 36_001] {
            let d = Duration::from_millis(tenths * 100);
            assert_eq!(parse_elapsed(&format_elapsed(d)), d, "tenths = {}", tenths);
        }
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("200ms").unwrap(), Duration::from_millis(200));
        assert_eq!(parse_duration("25m").unwrap(), Duration::from_secs(1500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 2.5s ").unwrap(), Duration::from_millis(2500));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_eq!(parse_duration(""), Err(ParseDurationError::Empty));
        assert_eq!(
            parse_duration("5"),
            Err(ParseDurationError::MissingUnit("5".to_string()))
        );
        assert_eq!(
            parse_duration("5d"),
            Err(ParseDurationError::UnknownUnit("d".to_string()))
        );
        assert!(matches!(
            parse_duration("1.2.3s"),
            Err(ParseDurationError::InvalidNumber(_))
        ));
        assert!(matches!(
            parse_duration("s"),
            Err(ParseDurationError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_format_duration_compact() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_millis(100)), "100ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1s500ms");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h1m1s");

        let d = Duration::from_millis(3_723_004);
        assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
    }

    #[test]
    fn test_clock() {
        assert_eq!(clock(Duration::ZERO), "00:00.0");
        assert_eq!(clock(Duration::from_millis(61_250)), "01:01.2");
        assert_eq!(clock(Duration::from_secs(3_725)), "1:02:05.0");
    }

    #[test]
    fn test_suffix_bare_number() {
        assert_eq!(suffix_bare_number("5", "s"), "5s");
        assert_eq!(suffix_bare_number("2.5", "s"), "2.5s");
        assert_eq!(suffix_bare_number("5m", "s"), "5m");
        assert_eq!(suffix_bare_number("", "s"), "");
        assert_eq!(suffix_bare_number(".", "s"), ".");
    }
}
