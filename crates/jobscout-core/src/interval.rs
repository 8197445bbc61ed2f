//! Parsing for human-readable interval strings like `"10m"` or `"2h"`.
//!
//! Crawler cadences are configured as duration strings rather than raw
//! seconds. A value is one or more `<number><unit>` segments (`s`, `m`,
//! `h`, `d`) which are summed, so `"1h30m"` is ninety minutes.

use std::time::Duration;

use crate::ConfigError;

/// Parses an interval string into a [`Duration`].
///
/// Accepted units: `s` (seconds), `m` (minutes), `h` (hours), `d` (days).
/// Segments may be chained (`"1h30m"`). The result must be non-zero.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] for empty input, unknown units,
/// missing digits, or a zero total.
pub fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ConfigError::Validation(
            "interval must be non-empty".to_string(),
        ));
    }

    let mut total_secs: u64 = 0;
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(ConfigError::Validation(format!(
                "invalid interval \"{raw}\": unit '{c}' has no preceding number"
            )));
        }
        let value: u64 = digits.parse().map_err(|_| {
            ConfigError::Validation(format!("invalid interval \"{raw}\": number out of range"))
        })?;
        let unit_secs = match c {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            other => {
                return Err(ConfigError::Validation(format!(
                    "invalid interval \"{raw}\": unknown unit '{other}'"
                )))
            }
        };
        total_secs = total_secs.saturating_add(value.saturating_mul(unit_secs));
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(ConfigError::Validation(format!(
            "invalid interval \"{raw}\": trailing number without a unit"
        )));
    }

    if total_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "invalid interval \"{raw}\": must be greater than zero"
        )));
    }

    Ok(Duration::from_secs(total_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes() {
        assert_eq!(parse_interval("10m").unwrap(), Duration::from_secs(600));
    }

    #[test]
    fn parses_hours() {
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7_200));
    }

    #[test]
    fn parses_chained_segments() {
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5_400));
    }

    #[test]
    fn parses_seconds_and_days() {
        assert_eq!(parse_interval("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_empty() {
        assert!(parse_interval("  ").is_err());
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = parse_interval("10x").unwrap_err();
        assert!(err.to_string().contains("unknown unit"));
    }

    #[test]
    fn rejects_bare_number() {
        let err = parse_interval("300").unwrap_err();
        assert!(err.to_string().contains("without a unit"));
    }

    #[test]
    fn rejects_unit_without_number() {
        assert!(parse_interval("m").is_err());
    }

    #[test]
    fn rejects_zero() {
        assert!(parse_interval("0m").is_err());
    }
}
