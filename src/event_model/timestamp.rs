//! Timestamp coercion into epoch seconds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Values above this are taken to be epoch milliseconds.
pub const MILLIS_THRESHOLD: f64 = 1e12;

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Normalizes against the current wall clock.
pub fn normalize(value: Option<&Value>) -> i64 {
    normalize_at(value, now())
}

/// Normalizes any timestamp representation to epoch seconds, using `now` whenever the
/// value is absent or unusable. Blank strings count as zero. Never fails.
pub fn normalize_at(value: Option<&Value>, now: i64) -> i64 {
    let normalized = match value {
        Some(Value::Number(n)) => n.as_f64().and_then(from_epoch),
        Some(Value::String(s)) => from_text(s),
        _ => None,
    };
    normalized.unwrap_or(now)
}

fn from_epoch(n: f64) -> Option<i64> {
    if !n.is_finite() {
        return None;
    }
    let seconds = if n > MILLIS_THRESHOLD { n / 1000.0 } else { n };
    Some(seconds.floor() as i64)
}

fn from_text(text: &str) -> Option<i64> {
    let text = text.trim();
    // Blank text reads as the number zero, keeping the key of such events stable.
    if text.is_empty() {
        return Some(0);
    }
    if let Ok(n) = text.parse::<f64>() {
        if let Some(seconds) = from_epoch(n) {
            return Some(seconds);
        }
    }
    from_iso8601(text)
}

fn from_iso8601(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    // Offset-less forms are read as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 42;

    #[test]
    fn seconds_millis_and_numeric_text_agree() {
        assert_eq!(normalize_at(Some(&json!(1700000000)), NOW), 1700000000);
        assert_eq!(normalize_at(Some(&json!(1700000000000u64)), NOW), 1700000000);
        assert_eq!(normalize_at(Some(&json!("1700000000")), NOW), 1700000000);
        assert_eq!(normalize_at(Some(&json!("1700000000000")), NOW), 1700000000);
    }

    #[test]
    fn fractions_are_floored() {
        assert_eq!(normalize_at(Some(&json!(1700000000.9)), NOW), 1700000000);
        assert_eq!(normalize_at(Some(&json!(1700000000999u64)), NOW), 1700000000);
    }

    #[test]
    fn iso_strings_are_parsed() {
        assert_eq!(
            normalize_at(Some(&json!("2023-11-14T22:13:20Z")), NOW),
            1700000000
        );
        assert_eq!(
            normalize_at(Some(&json!("2023-11-14T23:13:20.123456789+01:00")), NOW),
            1700000000
        );
        assert_eq!(
            normalize_at(Some(&json!("2023-11-14T22:13:20")), NOW),
            1700000000
        );
        assert_eq!(normalize_at(Some(&json!("2023-11-14")), NOW), 1699920000);
    }

    #[test]
    fn unusable_values_fall_back_to_now() {
        assert_eq!(normalize_at(None, NOW), NOW);
        assert_eq!(normalize_at(Some(&Value::Null), NOW), NOW);
        assert_eq!(normalize_at(Some(&json!("yesterday")), NOW), NOW);
        assert_eq!(normalize_at(Some(&json!("NaN")), NOW), NOW);
        assert_eq!(normalize_at(Some(&json!(true)), NOW), NOW);
        assert_eq!(normalize_at(Some(&json!({"s": 1})), NOW), NOW);
    }

    #[test]
    fn blank_text_is_zero_regardless_of_the_clock() {
        assert_eq!(normalize_at(Some(&json!("")), NOW), 0);
        assert_eq!(normalize_at(Some(&json!("   ")), NOW + 1), 0);
        assert_eq!(normalize(Some(&json!(""))), 0);
    }

    #[test]
    fn wall_clock_variant_is_recent() {
        let before = now();
        let got = normalize(None);
        assert!(got >= before && got <= now());
    }
}
