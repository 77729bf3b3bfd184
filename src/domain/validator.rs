//! Command Validator
//!
//! Turns whatever the user typed into an in-range integer for the wire.

use crate::domain::models::RawValue;

pub const INTENSITY_MIN: i64 = 1;
pub const INTENSITY_MAX: i64 = 4;
pub const DURATION_MIN: i64 = 0;
/// One hour, in seconds.
pub const DURATION_MAX: i64 = 3600;

/// Parse `raw` as an integer and clamp it into `[min, max]`.
///
/// Parsing is lenient: leading whitespace and an optional sign are accepted and
/// anything after the leading digits is ignored (`"3.7"` and `"3 levels"` both
/// read as 3). Unparseable input becomes `min`. Never fails.
pub fn clamp(raw: &str, min: i64, max: i64) -> i64 {
    let value = parse_leading_int(raw).unwrap_or(min);
    value.max(min).min(max)
}

pub fn clamp_value(raw: &RawValue, min: i64, max: i64) -> i64 {
    match raw {
        RawValue::Number(n) => (*n).max(min).min(max),
        RawValue::Text(s) => clamp(s, min, max),
    }
}

pub fn intensity(raw: &RawValue) -> u8 {
    clamp_value(raw, INTENSITY_MIN, INTENSITY_MAX) as u8
}

pub fn duration_secs(raw: &RawValue) -> u32 {
    clamp_value(raw, DURATION_MIN, DURATION_MAX) as u32
}

fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // Only overflow can fail here; saturate instead.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_intensity_range() {
        for raw in ["-5", "0", "1", "2", "3", "4", "5", "99", "", "abc", "2.9", " 3"] {
            let v = clamp(raw, 1, 4);
            assert!((1..=4).contains(&v), "{raw:?} -> {v}");
        }
        assert_eq!(clamp("abc", 1, 4), 1);
        assert_eq!(clamp("99", 1, 4), 4);
    }

    #[test]
    fn test_clamp_lenient_parse() {
        assert_eq!(clamp("3.7", 1, 4), 3);
        assert_eq!(clamp("  2 levels", 1, 4), 2);
        assert_eq!(clamp("+3", 1, 4), 3);
        assert_eq!(clamp("-", 0, 3600), 0);
        assert_eq!(clamp("99999999999999999999999", 0, 3600), 3600);
        assert_eq!(clamp("-99999999999999999999999", 0, 3600), 0);
    }

    #[test]
    fn test_clamp_value_numbers() {
        assert_eq!(intensity(&RawValue::Number(99)), 4);
        assert_eq!(intensity(&RawValue::Number(-1)), 1);
        assert_eq!(duration_secs(&RawValue::from("90")), 90);
        assert_eq!(duration_secs(&RawValue::from("")), 0);
        assert_eq!(duration_secs(&RawValue::Number(7200)), 3600);
    }

    #[test]
    fn test_inverted_bounds_do_not_panic() {
        assert_eq!(clamp("10", 5, 1), 1);
    }
}
