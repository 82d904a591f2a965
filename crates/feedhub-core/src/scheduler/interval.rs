//! Interval strings as stored in configuration: `<integer><unit>` where the
//! unit is one of `s`, `m`, `h` or `d`.

use std::time::Duration;

use crate::{Error, Result};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Parse an interval string such as `"30s"`, `"5m"`, `"2h"` or `"1d"`.
///
/// The numeric part must be a plain non-negative decimal integer; signs,
/// whitespace and fractional values are rejected. `"0s"` parses to a zero
/// duration, callers that need a positive interval check for that themselves.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let invalid = || Error::InvalidInterval(raw.to_string());

    let unit = raw.chars().last().ok_or_else(invalid)?;
    let digits = &raw[..raw.len() - unit.len_utf8()];

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let value: u64 = digits.parse().map_err(|_| invalid())?;

    let unit_secs = match unit {
        's' => 1,
        'm' => SECS_PER_MINUTE,
        'h' => SECS_PER_HOUR,
        'd' => SECS_PER_DAY,
        _ => return Err(invalid()),
    };

    value
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Render a duration in the largest unit that divides it exactly.
///
/// Sub-second precision is truncated, so `format_interval(d)` always parses
/// back with [`parse_interval`].
pub fn format_interval(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs == 0 {
        return "0s".to_string();
    }

    if secs % SECS_PER_DAY == 0 {
        format!("{}d", secs / SECS_PER_DAY)
    } else if secs % SECS_PER_HOUR == 0 {
        format!("{}h", secs / SECS_PER_HOUR)
    } else if secs % SECS_PER_MINUTE == 0 {
        format!("{}m", secs / SECS_PER_MINUTE)
    } else {
        format!("{}s", secs)
    }
}
