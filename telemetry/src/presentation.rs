//! Presentation contract
//!
//! The monitor pushes device records, activity and connection changes to a
//! [`Presenter`]. Rendering itself lives outside this crate; the helpers here
//! derive what a renderer needs (marker style, card lines, statistics).

use crate::activity::ActivityEvent;
use crate::device::DeviceRecord;
use crate::{AlertLevel, PersonRole};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Demo,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Demo => "demo",
        }
    }
}

/// Data source status with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub message: String,
}

impl ConnectionStatus {
    pub fn new(state: ConnectionState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::new(ConnectionState::Disconnected, message)
    }
}

/// Map marker appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    pub color: &'static str,
    pub icon: &'static str,
}

impl MarkerStyle {
    pub fn for_record(record: &DeviceRecord) -> Self {
        if !record.is_online() {
            return Self { color: "gray", icon: "⚫" };
        }
        match record.alert_level() {
            AlertLevel::Alert => Self { color: "red", icon: "🔴" },
            AlertLevel::Ranger => Self { color: "green", icon: "🟢" },
            AlertLevel::Animal => Self { color: "orange", icon: "🦁" },
            AlertLevel::Normal => Self { color: "blue", icon: "📍" },
        }
    }
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub active_devices: usize,
    pub animals_detected: usize,
    pub poachers_detected: usize,
    pub rangers_detected: usize,
}

impl Statistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DeviceRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut stats, record| {
            if record.is_online() {
                stats.active_devices += 1;
            }
            if record.detected_animal.is_some() {
                stats.animals_detected += 1;
            }
            match record.detected_person {
                Some(PersonRole::Poacher) => stats.poachers_detected += 1,
                Some(PersonRole::Ranger) => stats.rangers_detected += 1,
                None => {}
            }
            stats
        })
    }
}

/// Text lines of a device card. Detection details are only shown while the
/// device is online.
pub fn card_lines(record: &DeviceRecord) -> Vec<String> {
    let status = if record.is_online() { "Online" } else { "Offline" };
    let mut lines = vec![
        format!("{} [{}]", record.id, status),
        format!("GPS Location: {}", record.position),
    ];

    if record.is_online() {
        lines.push(match &record.detected_animal {
            Some(animal) => format!("Animal: {} ({:.0}%)", animal, record.confidence),
            None => "Animal: None detected".to_string(),
        });
        lines.push(
            match record.detected_person {
                Some(PersonRole::Poacher) => "Person: POACHER DETECTED!",
                Some(PersonRole::Ranger) => "Person: Ranger",
                None => "Person: None detected",
            }
            .to_string(),
        );
        if record.human_count > 0 {
            lines.push(format!("Human Count: {}", record.human_count));
        }
        if record.ble.present {
            let rssi = record
                .ble
                .rssi
                .as_ref()
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "N/A".to_string());
            lines.push(format!("BLE Device: Present ({})", rssi));
        }
    }

    lines.push(format!("Battery: {}%", record.battery_level));
    lines.push(format!(
        "Last Update: {}",
        record.last_update.format("%H:%M:%S")
    ));
    lines
}

/// Receiver of everything the monitor wants shown
pub trait Presenter: Send {
    /// A device record was stored or moved
    fn on_device_updated(&self, record: &DeviceRecord, stats: &Statistics);

    /// A new activity entry was logged
    fn on_activity(&self, event: &ActivityEvent);

    /// The data source status changed
    fn on_connection(&self, status: &ConnectionStatus);

    /// The audit log grew or was cleared
    fn on_log_count(&self, _count: usize) {}
}

/// Presenter that writes everything to the log
pub struct LoggingPresenter;

impl Presenter for LoggingPresenter {
    fn on_device_updated(&self, record: &DeviceRecord, stats: &Statistics) {
        let style = MarkerStyle::for_record(record);
        tracing::info!(
            device = %record.id,
            status = %record.status,
            level = record.alert_level().as_str(),
            marker = style.color,
            "{} {}",
            style.icon,
            card_lines(record).join(" | ")
        );
        tracing::debug!(
            active = stats.active_devices,
            animals = stats.animals_detected,
            poachers = stats.poachers_detected,
            rangers = stats.rangers_detected,
            "Statistics updated"
        );
    }

    fn on_activity(&self, event: &ActivityEvent) {
        match event.severity {
            AlertLevel::Alert => tracing::warn!(
                device = %event.device_id,
                "{} {}",
                event.icon(),
                event.message
            ),
            _ => tracing::info!(
                device = %event.device_id,
                "{} {}",
                event.icon(),
                event.message
            ),
        }
    }

    fn on_connection(&self, status: &ConnectionStatus) {
        match status.state {
            ConnectionState::Disconnected => {
                tracing::warn!("Data source {}: {}", status.state.as_str(), status.message)
            }
            _ => tracing::info!("Data source {}: {}", status.state.as_str(), status.message),
        }
    }

    fn on_log_count(&self, count: usize) {
        tracing::debug!("Audit log holds {} entries", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinates::PositionSource;
    use crate::device::{BleStatus, DeviceId};
    use crate::DeviceStatus;
    use chrono::{TimeZone, Utc};
    use vigil_hal::Coordinate;

    fn record() -> DeviceRecord {
        DeviceRecord {
            id: DeviceId::new("RPI5-001"),
            position: Coordinate::new(-17.351880, 30.206747),
            position_source: PositionSource::Reported,
            status: DeviceStatus::Online,
            last_update: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap(),
            detected_animal: Some("Lion".to_string()),
            detected_person: Some(PersonRole::Poacher),
            human_count: 2,
            ble: BleStatus {
                present: true,
                rssi: Some("-67".to_string()),
                last_seen: None,
            },
            confidence: 91.6,
            battery_level: 100,
        }
    }

    #[test]
    fn offline_marker_is_gray_regardless_of_detections() {
        let mut r = record();
        assert_eq!(MarkerStyle::for_record(&r).color, "red");

        r.status = DeviceStatus::Offline;
        assert_eq!(MarkerStyle::for_record(&r).color, "gray");

        r.status = DeviceStatus::Online;
        r.detected_person = None;
        assert_eq!(MarkerStyle::for_record(&r).color, "orange");

        r.detected_animal = None;
        assert_eq!(MarkerStyle::for_record(&r).color, "blue");
    }

    #[test]
    fn card_shows_detections_while_online() {
        let lines = card_lines(&record());
        assert_eq!(
            lines,
            vec![
                "RPI5-001 [Online]",
                "GPS Location: -17.3519, 30.2067",
                "Animal: Lion (92%)",
                "Person: POACHER DETECTED!",
                "Human Count: 2",
                "BLE Device: Present (-67 dBm)",
                "Battery: 100%",
                "Last Update: 12:30:05",
            ]
        );
    }

    #[test]
    fn card_hides_detections_while_offline() {
        let r = DeviceRecord {
            status: DeviceStatus::Offline,
            ..record()
        };
        let lines = card_lines(&r);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "RPI5-001 [Offline]");
    }

    #[test]
    fn missing_rssi_reads_not_available() {
        let mut r = record();
        r.ble.rssi = None;
        assert!(card_lines(&r).contains(&"BLE Device: Present (N/A)".to_string()));
    }

    #[test]
    fn statistics_count_each_category() {
        let a = record();
        let b = DeviceRecord {
            id: DeviceId::new("RPI5-002"),
            status: DeviceStatus::Offline,
            detected_animal: None,
            detected_person: Some(PersonRole::Ranger),
            ..record()
        };

        let stats = Statistics::from_records([&a, &b]);
        assert_eq!(
            stats,
            Statistics {
                active_devices: 1,
                animals_detected: 1,
                poachers_detected: 1,
                rangers_detected: 1,
            }
        );
    }
}
