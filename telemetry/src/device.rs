//! Canonical device records and snapshot normalization

use crate::classifier;
use crate::coordinates::{self, PositionSource};
use crate::snapshot::{set_value, RawSnapshot, Scalar};
use crate::timestamp;
use crate::{AlertLevel, DeviceStatus, PersonRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_hal::Coordinate;

/// Confidence reported when the device sends none
pub const DEFAULT_CONFIDENCE: f64 = 85.0;

/// Displayed battery level; the devices do not report one
pub const DISPLAY_BATTERY_LEVEL: u8 = 100;

/// Stable device identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Bluetooth beacon observation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BleStatus {
    pub present: bool,
    pub rssi: Option<String>,
    pub last_seen: Option<String>,
}

/// Canonical state of one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub position: Coordinate,
    pub position_source: PositionSource,
    pub status: DeviceStatus,
    pub last_update: DateTime<Utc>,
    pub detected_animal: Option<String>,
    pub detected_person: Option<PersonRole>,
    pub human_count: u32,
    pub ble: BleStatus,
    /// Detection confidence, 0 - 100
    pub confidence: f64,
    pub battery_level: u8,
}

impl DeviceRecord {
    pub fn alert_level(&self) -> AlertLevel {
        match self.detected_person {
            Some(PersonRole::Poacher) => AlertLevel::Alert,
            Some(PersonRole::Ranger) => AlertLevel::Ranger,
            None if self.detected_animal.is_some() => AlertLevel::Animal,
            None => AlertLevel::Normal,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }
}

/// Builds device records out of raw snapshots
#[derive(Debug, Clone)]
pub struct Normalizer {
    device_id: DeviceId,
}

impl Normalizer {
    pub fn new(device_id: DeviceId) -> Self {
        Self { device_id }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Normalize `raw`; `fallback` supplies any coordinate axis the snapshot lacks
    pub fn normalize(
        &self,
        raw: &RawSnapshot,
        fallback: Coordinate,
        now: DateTime<Utc>,
    ) -> DeviceRecord {
        let (position, position_source) = coordinates::resolve_position(raw, fallback);
        let (last_update, status) = timestamp::resolve(raw, now);
        let detection = classifier::classify(raw);

        DeviceRecord {
            id: self.device_id.clone(),
            position,
            position_source,
            status,
            last_update,
            detected_animal: detection.animal,
            detected_person: detection.person,
            human_count: parse_count(raw.human_count.as_ref()),
            ble: BleStatus {
                present: parse_flag(raw.ble_present.as_ref()),
                rssi: set_value(&raw.ble_rssi).map(Scalar::to_string),
                last_seen: set_value(&raw.ble_last_seen).map(Scalar::to_string),
            },
            confidence: parse_confidence(raw.confidence.as_ref()),
            battery_level: DISPLAY_BATTERY_LEVEL,
        }
    }
}

fn parse_count(value: Option<&Scalar>) -> u32 {
    let number = match value {
        Some(Scalar::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(scalar) => scalar.as_f64(),
        None => None,
    };
    let count = number
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.trunc().min(u32::MAX as f64) as u32);

    if count.is_none() && value.is_some_and(|v| !v.is_unset()) {
        tracing::debug!(raw = ?value, "Invalid human_count, using 0");
    }
    count.unwrap_or(0)
}

fn parse_flag(value: Option<&Scalar>) -> bool {
    match value {
        Some(Scalar::Bool(b)) => *b,
        Some(scalar @ Scalar::Number(_)) => scalar.as_f64().is_some_and(|n| n != 0.0),
        Some(Scalar::Text(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        None => false,
    }
}

fn parse_confidence(value: Option<&Scalar>) -> f64 {
    match value.and_then(Scalar::as_f64) {
        Some(n) if n.is_finite() => n.clamp(0.0, 100.0),
        _ => DEFAULT_CONFIDENCE,
    }
}
