//! Operator input parsers for time, duration and hourly rate.
//!
//! All three share the same contract: empty or whitespace-only input returns
//! `Ok(None)` (meaning "keep the current value"), anything else either
//! parses to a typed value or fails with a `ValidationError` naming the
//! reason. Range violations and parse failures carry distinct messages.

use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;

use crate::error::ValidationError;

/// Duration bounds in hours: exclusive of 0, inclusive of 24.
pub const MAX_DURATION_HOURS: f64 = 24.0;

/// Rate bounds in currency units per hour: exclusive of 0, inclusive of 10000.
pub const MAX_HOURLY_RATE: f64 = 10_000.0;

// Compile-once regex patterns via OnceLock.
fn re_time_12h() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(AM|PM)$").unwrap())
}

fn re_time_24h() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?$").unwrap())
}

/// Parse an operator-supplied clock time.
///
/// Accepts 12-hour (`"2:30 PM"`, `"2:30PM"`, `"2 PM"`, `"2PM"`) and 24-hour
/// (`"14:30"`, `"14"`) forms, case-insensitive meridiem, no seconds.
pub fn parse_time_input(input: &str) -> Result<Option<NaiveTime>, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let upper = trimmed.to_ascii_uppercase();
    let fail = || ValidationError::TimeFormat(trimmed.to_string());

    if let Some(caps) = re_time_12h().captures(&upper) {
        let hour: u32 = caps[1].parse().map_err(|_| fail())?;
        let minute: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse())
            .transpose()
            .map_err(|_| fail())?
            .unwrap_or(0);
        if !(1..=12).contains(&hour) || minute > 59 {
            return Err(fail());
        }
        let hour24 = match (&caps[3], hour) {
            ("AM", 12) => 0,
            ("AM", h) => h,
            ("PM", 12) => 12,
            (_, h) => h + 12,
        };
        return NaiveTime::from_hms_opt(hour24, minute, 0)
            .map(Some)
            .ok_or_else(fail);
    }

    if let Some(caps) = re_time_24h().captures(&upper) {
        let hour: u32 = caps[1].parse().map_err(|_| fail())?;
        let minute: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse())
            .transpose()
            .map_err(|_| fail())?
            .unwrap_or(0);
        return NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Some)
            .ok_or_else(fail);
    }

    Err(fail())
}

/// Parse an operator-supplied duration in hours.
///
/// Strips a trailing `hours`/`hour`/`hr`/`h` suffix (longest match first so
/// `"2 hours"` does not lose its `s` to the `hour` branch) and parses the
/// remainder as a decimal in `(0, 24]`.
pub fn parse_duration_input(input: &str) -> Result<Option<f64>, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let lower = trimmed.to_ascii_lowercase();
    let mut cleaned = lower.as_str();
    for suffix in ["hours", "hour", "hr", "h"] {
        if let Some(stripped) = cleaned.strip_suffix(suffix) {
            cleaned = stripped;
            break;
        }
    }
    let cleaned = cleaned.trim();

    let value: f64 = cleaned
        .parse()
        .map_err(|_| ValidationError::DurationFormat(cleaned.to_string()))?;
    if !value.is_finite() {
        return Err(ValidationError::DurationFormat(cleaned.to_string()));
    }
    if value <= 0.0 || value > MAX_DURATION_HOURS {
        return Err(ValidationError::DurationRange(value));
    }
    Ok(Some(value))
}

/// Parse an operator-supplied hourly rate.
///
/// Strips a leading currency symbol and thousands separators, then parses the
/// remainder as a decimal in `(0, 10000]`.
pub fn parse_rate_input(input: &str) -> Result<Option<f64>, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let cleaned = trimmed
        .strip_prefix('$')
        .unwrap_or(trimmed)
        .replace(',', "");
    let cleaned = cleaned.trim();

    let value: f64 = cleaned
        .parse()
        .map_err(|_| ValidationError::RateFormat(cleaned.to_string()))?;
    if !value.is_finite() {
        return Err(ValidationError::RateFormat(cleaned.to_string()));
    }
    if value <= 0.0 || value > MAX_HOURLY_RATE {
        return Err(ValidationError::RateRange(value));
    }
    Ok(Some(value))
}
