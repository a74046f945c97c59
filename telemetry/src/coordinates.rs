//! Coordinate resolution
//!
//! Each axis is read independently from its primary key, then its alternate
//! key, then the fallback coordinate.

use crate::snapshot::{set_value, Field, RawSnapshot, Scalar};
use serde::{Deserialize, Serialize};
use vigil_hal::Coordinate;

/// Where a resolved position came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PositionSource {
    /// Both axes were reported by the device
    Reported,
    /// One axis was reported, the other fell back
    Partial,
    /// Neither axis was usable
    Fallback,
}

/// Parse one coordinate value from a number or numeric text
pub fn parse_coordinate(value: Option<&Scalar>) -> Field<f64> {
    match value {
        None => Field::Absent,
        Some(Scalar::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => Field::Value(v),
            _ => Field::Invalid(format!("not a number: {}", n)),
        },
        Some(Scalar::Text(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Field::Value(n),
            _ => Field::Invalid(format!("not a number: {:?}", s)),
        },
        Some(other) => Field::Invalid(format!("not a number: {}", other)),
    }
}

fn resolve_axis(axis: &str, primary: &Option<Scalar>, alternate: &Option<Scalar>) -> Option<f64> {
    let note = |field: &Field<f64>, key: &str| {
        if let Field::Invalid(reason) = field {
            tracing::debug!(axis, key, reason = %reason, "Unusable coordinate");
        }
    };

    let first = parse_coordinate(set_value(primary));
    note(&first, "primary");
    first
        .or_else(|| {
            let second = parse_coordinate(set_value(alternate));
            note(&second, "alternate");
            second
        })
        .ok()
}

/// Resolve the device position from `lat`/`latitude` and `lng`/`longitude`
pub fn resolve_position(raw: &RawSnapshot, fallback: Coordinate) -> (Coordinate, PositionSource) {
    let lat = resolve_axis("lat", &raw.lat, &raw.latitude);
    let lng = resolve_axis("lng", &raw.lng, &raw.longitude);

    let source = match (lat.is_some(), lng.is_some()) {
        (true, true) => PositionSource::Reported,
        (false, false) => PositionSource::Fallback,
        _ => PositionSource::Partial,
    };

    let coordinate = Coordinate::new(lat.unwrap_or(fallback.lat), lng.unwrap_or(fallback.lng));
    (coordinate, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);

    #[test]
    fn axes_fall_back_independently() {
        let raw = RawSnapshot {
            lat: Some(Scalar::text("-17.5")),
            ..Default::default()
        };
        let (pos, source) = resolve_position(&raw, ORIGIN);

        assert_eq!(pos, Coordinate::new(-17.5, 0.0));
        assert_eq!(source, PositionSource::Partial);
    }

    #[test]
    fn alternate_keys_are_used_when_primary_is_bad() {
        let raw = RawSnapshot {
            lat: Some(Scalar::text("north")),
            latitude: Scalar::number(-17.35),
            longitude: Some(Scalar::text(" 30.2 ")),
            ..Default::default()
        };
        let (pos, source) = resolve_position(&raw, ORIGIN);

        assert_eq!(pos, Coordinate::new(-17.35, 30.2));
        assert_eq!(source, PositionSource::Reported);
    }

    #[test]
    fn primary_key_wins() {
        let raw = RawSnapshot {
            lng: Some(Scalar::Number(31.into())),
            longitude: Some(Scalar::Number(29.into())),
            ..Default::default()
        };
        assert_eq!(resolve_position(&raw, ORIGIN).0.lng, 31.0);
    }

    #[test]
    fn unusable_values_fall_back() {
        let fallback = Coordinate::new(-17.351880, 30.206747);
        let raw = RawSnapshot {
            lat: Some(Scalar::text("NaN")),
            lng: Some(Scalar::Bool(true)),
            latitude: Some(Scalar::text("None")),
            ..Default::default()
        };
        let (pos, source) = resolve_position(&raw, fallback);

        assert_eq!(pos, fallback);
        assert_eq!(source, PositionSource::Fallback);
    }

    #[test]
    fn parse_reports_invalid_text() {
        assert!(matches!(
            parse_coordinate(Some(&Scalar::text("12abc"))),
            Field::Invalid(_)
        ));
        assert_eq!(parse_coordinate(None), Field::Absent);
    }
}
