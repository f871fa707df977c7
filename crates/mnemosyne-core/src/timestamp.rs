//! Timestamp parsing, bounds checking and wire formatting.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

use crate::validation::ValidationError;

/// Maximum clock skew tolerated for timestamps in the future.
pub const MAX_FUTURE_SKEW_SECS: i64 = 60 * 60;

/// Oldest accepted timestamp, in days before now (100 years of 365 days).
pub const MAX_PAST_DAYS: i64 = 365 * 100;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (with `Z` or a numeric offset), a naive date-time with a
/// `T` or space separator (interpreted as UTC), and a bare `YYYY-MM-DD` date
/// (midnight UTC).
///
/// # Errors
///
/// Returns a format [`ValidationError`] for anything else.
///
/// # Examples
///
/// ```
/// use mnemosyne_core::timestamp::parse_timestamp;
///
/// let ts = parse_timestamp("2024-01-15T10:30:00+02:00").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2024-01-15T08:30:00+00:00");
/// ```
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = input.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    Err(ValidationError::format(
        "timestamp",
        format!("Invalid timestamp format: '{input}' is not an ISO-8601 date-time"),
    ))
}

/// Checks that `ts` is at most one hour ahead of and at most 100 years behind `now`.
///
/// # Errors
///
/// Returns a range [`ValidationError`] when the timestamp is out of bounds.
pub fn validate_timestamp_at(ts: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if ts > now + Duration::seconds(MAX_FUTURE_SKEW_SECS) {
        return Err(ValidationError::range(
            "timestamp",
            format!(
                "Timestamp is too far in the future: {}. Current time: {}",
                format_timestamp(&ts),
                format_timestamp(&now)
            ),
        ));
    }
    if ts < now - Duration::days(MAX_PAST_DAYS) {
        return Err(ValidationError::range(
            "timestamp",
            format!("Timestamp is too far in the past: {}", format_timestamp(&ts)),
        ));
    }
    Ok(())
}

/// Checks `ts` against the current time.
///
/// # Errors
///
/// See [`validate_timestamp_at`].
pub fn validate_timestamp(ts: DateTime<Utc>) -> Result<(), ValidationError> {
    validate_timestamp_at(ts, Utc::now())
}

/// Formats a timestamp the way it appears on the wire (`+00:00` offset).
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

pub(crate) fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}

/// Reads a wire timestamp, parsing and bounds-checking it. A `null`
/// stamps the current instant.
pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(Utc::now());
    };
    let ts = parse_timestamp(&raw).map_err(de::Error::custom)?;
    validate_timestamp(ts).map_err(de::Error::custom)?;
    Ok(ts)
}
