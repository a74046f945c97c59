//! Report timestamps and online/offline classification
//!
//! Devices stamp their reports with epoch seconds, epoch milliseconds or a
//! calendar date string depending on firmware. Anything unreadable is taken
//! to mean "now".

use crate::snapshot::{set_value, Field, RawSnapshot, Scalar};
use crate::DeviceStatus;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// A device is online while its last report is at most this old
pub const ONLINE_THRESHOLD_MS: i64 = 300_000;

/// Numeric timestamps above this magnitude are already milliseconds
pub const MILLIS_CUTOFF: f64 = 1e11;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// First set value among `timestamp`, `time` and `ts`
pub fn raw_timestamp(raw: &RawSnapshot) -> Option<&Scalar> {
    set_value(&raw.timestamp)
        .or_else(|| set_value(&raw.time))
        .or_else(|| set_value(&raw.ts))
}

/// Digits with at most one decimal point, nothing else
fn is_numeric_text(s: &str) -> bool {
    let mut digits = 0;
    let mut dots = 0;
    for c in s.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

/// Interpret an epoch number as seconds or milliseconds by magnitude
pub fn from_epoch_number(n: f64) -> Field<DateTime<Utc>> {
    if !n.is_finite() {
        return Field::Invalid(format!("non-finite timestamp {}", n));
    }
    let millis = if n.abs() > MILLIS_CUTOFF { n } else { n * 1000.0 };

    match Utc.timestamp_millis_opt(millis.round() as i64).single() {
        Some(dt) => Field::Value(dt),
        None => Field::Invalid(format!("timestamp out of range: {}", n)),
    }
}

/// Parse a calendar date/time. Values without an offset are taken as UTC.
pub fn parse_date_text(s: &str) -> Field<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Field::Value(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Field::Value(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Field::Value(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Field::Value(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Field::Value(naive.and_utc());
        }
    }

    Field::Invalid(format!("unrecognised date {:?}", s))
}

/// Parse any timestamp representation
pub fn parse_timestamp(value: &Scalar) -> Field<DateTime<Utc>> {
    match value {
        Scalar::Number(n) => match n.as_f64() {
            Some(v) => from_epoch_number(v),
            None => Field::Invalid(format!("unreadable number {}", n)),
        },
        Scalar::Text(s) if is_numeric_text(s.trim()) => match s.trim().parse::<f64>() {
            Ok(n) => from_epoch_number(n),
            Err(e) => Field::Invalid(e.to_string()),
        },
        Scalar::Text(s) => parse_date_text(s),
        Scalar::Bool(b) => Field::Invalid(format!("boolean timestamp {}", b)),
    }
}

/// Resolve the report time, falling back to `now`
pub fn resolve_timestamp(raw: &RawSnapshot, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(value) = raw_timestamp(raw) else {
        return now;
    };

    match parse_timestamp(value) {
        Field::Value(dt) => dt,
        Field::Invalid(reason) => {
            tracing::debug!(raw = %value, reason = %reason, "Invalid timestamp, using now");
            now
        }
        Field::Absent => now,
    }
}

/// Online when the report is no older than the threshold
pub fn status_at(reported: DateTime<Utc>, now: DateTime<Utc>) -> DeviceStatus {
    let age_ms = (now - reported).num_milliseconds();
    if age_ms <= ONLINE_THRESHOLD_MS {
        DeviceStatus::Online
    } else {
        DeviceStatus::Offline
    }
}

/// Report time and derived status
pub fn resolve(raw: &RawSnapshot, now: DateTime<Utc>) -> (DateTime<Utc>, DeviceStatus) {
    let reported = resolve_timestamp(raw, now);
    let status = status_at(reported, now);
    tracing::debug!(
        reported = %reported,
        age_s = (now - reported).num_seconds(),
        status = %status,
        "Timestamp resolved"
    );
    (reported, status)
}
