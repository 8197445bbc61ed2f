//! Cadence resolution: which run interval applies to a crawler right now.
//!
//! A crawler has a default interval plus optional time-of-day windows
//! (`"7-18": "1h"`). Resolution is a pure function of the current hour and
//! the crawler's configuration — no hidden state — so the scheduler can
//! re-consult it on every cycle.
//!
//! Window keys are parsed *here*, not at config load, so a malformed window
//! surfaces as a validation failure naming the crawler being scheduled.

use std::time::Duration;

use crate::crawlers::CrawlerConfig;
use crate::interval::parse_interval;
use crate::ConfigError;

/// Label used when no configured window contains the current hour.
pub const DEFAULT_WINDOW: &str = "Default";

/// The interval chosen for a crawler and the window that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCadence {
    pub interval: Duration,
    /// The matched window key (e.g. `"7-18"`), or [`DEFAULT_WINDOW`].
    pub window: String,
}

/// Resolves the run interval applying to `crawler` at `hour` (0–23).
///
/// Windows are checked in declaration order; the first whose `[start, end)`
/// range contains `hour` wins (`start` inclusive, `end` exclusive). When no
/// window matches, the crawler's default interval is returned with the
/// [`DEFAULT_WINDOW`] label.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] for non-numeric bounds, bounds
/// outside 0–23, reversed or overnight ranges (`start >= end`), or an
/// unparseable window interval. Every error names the crawler and window.
pub fn resolve_timer(crawler: &CrawlerConfig, hour: u32) -> Result<ResolvedCadence, ConfigError> {
    debug_assert!(hour < 24, "hour-of-day out of range: {hour}");

    for (key, interval_str) in &crawler.windows {
        let (start, end) = parse_window_key(&crawler.name, key)?;
        if (start..end).contains(&hour) {
            let interval = parse_interval(interval_str).map_err(|e| {
                ConfigError::Validation(format!(
                    "crawler '{}' window '{key}' has an invalid interval: {e}",
                    crawler.name
                ))
            })?;
            return Ok(ResolvedCadence {
                interval,
                window: key.clone(),
            });
        }
    }

    Ok(ResolvedCadence {
        interval: parse_interval(&crawler.interval)?,
        window: DEFAULT_WINDOW.to_string(),
    })
}

/// Parses `"<startHour>-<endHour>"` into validated bounds.
fn parse_window_key(crawler: &str, key: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = |reason: &str| {
        ConfigError::Validation(format!(
            "crawler '{crawler}' has an invalid run window '{key}': {reason}"
        ))
    };

    let (start_raw, end_raw) = key
        .split_once('-')
        .ok_or_else(|| invalid("expected \"<startHour>-<endHour>\""))?;

    let start: u32 = start_raw
        .trim()
        .parse()
        .map_err(|_| invalid("start hour is not a number"))?;
    let end: u32 = end_raw
        .trim()
        .parse()
        .map_err(|_| invalid("end hour is not a number"))?;

    if start > 23 || end > 23 {
        return Err(invalid("hours must be between 0 and 23"));
    }
    if start >= end {
        return Err(invalid(
            "start must be before end; ranges crossing midnight are not supported",
        ));
    }

    Ok((start, end))
}
