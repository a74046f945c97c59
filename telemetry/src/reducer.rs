//! Device state reduction
//!
//! `reduce` is a pure function of (previous record, next record) producing
//! the record to store and the ordered events the change implies. Side
//! effects are left to whoever consumes the events.

use crate::activity::{ActivityCategory, ActivityEvent};
use crate::coordinates::PositionSource;
use crate::device::{DeviceId, DeviceRecord};
use crate::PersonRole;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use vigil_hal::Coordinate;

pub const MSG_CAME_ONLINE: &str = "Device came online";
pub const MSG_POACHER: &str = "POACHER DETECTED! Immediate response required.";
pub const MSG_RANGER: &str = "Ranger detected on patrol.";

/// Something the monitor has to act on after a state change
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Append to the activity feed
    Activity(ActivityEvent),
    /// A poacher has newly appeared; sound the alarm
    PoacherAlert { device_id: DeviceId },
}

/// Result of one reduction step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub record: DeviceRecord,
    pub events: Vec<DeviceEvent>,
}

/// Compare `next` against the last known record for the same device.
///
/// The first matching rule wins: first sighting, new poacher, new ranger,
/// new animal, status change. Only the first sighting can raise two events.
pub fn reduce(previous: Option<&DeviceRecord>, next: DeviceRecord, now: DateTime<Utc>) -> Transition {
    let activity = |category: ActivityCategory, message: String| {
        DeviceEvent::Activity(ActivityEvent {
            device_id: next.id.clone(),
            category,
            message,
            occurred_at: now,
            severity: next.alert_level(),
        })
    };
    let poacher = next.detected_person == Some(PersonRole::Poacher);
    let ranger = next.detected_person == Some(PersonRole::Ranger);

    let mut events = Vec::new();
    match previous {
        None => {
            events.push(activity(ActivityCategory::Info, MSG_CAME_ONLINE.to_string()));
            if poacher {
                events.push(DeviceEvent::PoacherAlert {
                    device_id: next.id.clone(),
                });
            }
        }
        Some(prev) if poacher && prev.detected_person != Some(PersonRole::Poacher) => {
            events.push(activity(ActivityCategory::Alert, MSG_POACHER.to_string()));
            events.push(DeviceEvent::PoacherAlert {
                device_id: next.id.clone(),
            });
        }
        Some(prev) if ranger && prev.detected_person != Some(PersonRole::Ranger) => {
            events.push(activity(ActivityCategory::Ranger, MSG_RANGER.to_string()));
        }
        Some(prev)
            if next.detected_animal.is_some() && next.detected_animal != prev.detected_animal =>
        {
            let animal = next.detected_animal.as_deref().unwrap_or_default();
            events.push(activity(
                ActivityCategory::Animal,
                format!("{} detected nearby.", animal),
            ));
        }
        Some(prev) if next.status != prev.status => {
            events.push(activity(
                ActivityCategory::Info,
                format!("Device status changed to {}.", next.status),
            ));
        }
        Some(_) => {}
    }

    Transition { record: next, events }
}

/// Latest record per device
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(id)
    }

    /// Records sorted by id
    pub fn records(&self) -> Vec<&DeviceRecord> {
        let mut records: Vec<_> = self.devices.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Coordinate to use for axes a new snapshot from `id` does not report:
    /// the device's last position, unless that was itself only a fallback.
    pub fn fallback_for(&self, id: &DeviceId, site: Coordinate) -> Coordinate {
        match self.devices.get(id) {
            Some(record) if record.position_source != PositionSource::Fallback => record.position,
            _ => site,
        }
    }

    /// Reduce `next` against the stored record and replace it wholesale
    pub fn apply(&mut self, next: DeviceRecord, now: DateTime<Utc>) -> Vec<DeviceEvent> {
        let transition = reduce(self.devices.get(&next.id), next, now);
        let record = transition.record;
        self.devices.insert(record.id.clone(), record);
        transition.events
    }

    /// Move devices that were placed purely by fallback to `coordinate`
    pub fn relocate_fallback(&mut self, coordinate: Coordinate) -> Vec<DeviceId> {
        self.devices
            .values_mut()
            .filter(|r| r.position_source == PositionSource::Fallback)
            .map(|r| {
                r.position = coordinate;
                r.id.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BleStatus, DEFAULT_CONFIDENCE};
    use crate::{AlertLevel, DeviceStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn record() -> DeviceRecord {
        DeviceRecord {
            id: DeviceId::new("RPI5-001"),
            position: Coordinate::new(-17.35, 30.2),
            position_source: PositionSource::Reported,
            status: DeviceStatus::Online,
            last_update: now(),
            detected_animal: None,
            detected_person: None,
            human_count: 0,
            ble: BleStatus::default(),
            confidence: DEFAULT_CONFIDENCE,
            battery_level: 100,
        }
    }

    fn with_person(person: PersonRole) -> DeviceRecord {
        DeviceRecord {
            detected_person: Some(person),
            ..record()
        }
    }

    fn with_animal(animal: &str) -> DeviceRecord {
        DeviceRecord {
            detected_animal: Some(animal.to_string()),
            ..record()
        }
    }

    fn activities(events: &[DeviceEvent]) -> Vec<(ActivityCategory, String)> {
        events
            .iter()
            .filter_map(|e| match e {
                DeviceEvent::Activity(a) => Some((a.category, a.message.clone())),
                _ => None,
            })
            .collect()
    }

    fn alerts(events: &[DeviceEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::PoacherAlert { .. }))
            .count()
    }

    #[test]
    fn first_sighting_comes_online() {
        let t = reduce(None, record(), now());
        assert_eq!(
            activities(&t.events),
            vec![(ActivityCategory::Info, MSG_CAME_ONLINE.to_string())]
        );
        assert_eq!(alerts(&t.events), 0);
    }

    #[test]
    fn first_sighting_with_poacher_also_alerts() {
        let t = reduce(None, with_person(PersonRole::Poacher), now());

        assert_eq!(activities(&t.events).len(), 1);
        assert_eq!(activities(&t.events)[0].1, MSG_CAME_ONLINE);
        assert_eq!(alerts(&t.events), 1);

        let DeviceEvent::Activity(event) = &t.events[0] else {
            panic!("activity must come first");
        };
        assert_eq!(event.severity, AlertLevel::Alert);
    }

    #[test]
    fn new_poacher_alerts() {
        let prev = record();
        let t = reduce(Some(&prev), with_person(PersonRole::Poacher), now());

        assert_eq!(
            activities(&t.events),
            vec![(ActivityCategory::Alert, MSG_POACHER.to_string())]
        );
        assert_eq!(alerts(&t.events), 1);
    }

    #[test]
    fn continuing_poacher_is_quiet() {
        let prev = with_person(PersonRole::Poacher);
        let t = reduce(Some(&prev), with_person(PersonRole::Poacher), now());
        assert!(t.events.is_empty());
    }

    #[test]
    fn ranger_replacing_poacher_is_logged() {
        let prev = with_person(PersonRole::Poacher);
        let t = reduce(Some(&prev), with_person(PersonRole::Ranger), now());

        assert_eq!(
            activities(&t.events),
            vec![(ActivityCategory::Ranger, MSG_RANGER.to_string())]
        );
        assert_eq!(alerts(&t.events), 0);
    }

    #[test]
    fn animal_change_is_logged_once() {
        let prev = with_animal("Lion");
        let t = reduce(Some(&prev), with_animal("Zebra"), now());
        assert_eq!(
            activities(&t.events),
            vec![(ActivityCategory::Animal, "Zebra detected nearby.".to_string())]
        );

        let t = reduce(Some(&with_animal("Zebra")), with_animal("Zebra"), now());
        assert!(t.events.is_empty());
    }

    #[test]
    fn animal_leaving_is_not_an_event() {
        let t = reduce(Some(&with_animal("Lion")), record(), now());
        assert!(t.events.is_empty());
    }

    #[test]
    fn status_change_is_logged() {
        let prev = record();
        let next = DeviceRecord {
            status: DeviceStatus::Offline,
            ..record()
        };
        let t = reduce(Some(&prev), next, now());
        assert_eq!(
            activities(&t.events),
            vec![(
                ActivityCategory::Info,
                "Device status changed to offline.".to_string()
            )]
        );
    }

    #[test]
    fn animal_outranks_status_change() {
        let prev = record();
        let next = DeviceRecord {
            status: DeviceStatus::Offline,
            ..with_animal("Rhino")
        };
        let t = reduce(Some(&prev), next, now());

        assert_eq!(t.events.len(), 1);
        assert_eq!(activities(&t.events)[0].0, ActivityCategory::Animal);
    }

    #[test]
    fn registry_replaces_records_wholesale() {
        let mut registry = DeviceRegistry::new();
        registry.apply(with_animal("Lion"), now());
        registry.apply(record(), now());

        let stored = registry.get(&DeviceId::new("RPI5-001")).unwrap();
        assert_eq!(stored.detected_animal, None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn fallback_prefers_reported_position() {
        let mut registry = DeviceRegistry::new();
        let site = Coordinate::new(1.0, 1.0);
        let id = DeviceId::new("RPI5-001");

        assert_eq!(registry.fallback_for(&id, site), site);

        registry.apply(record(), now());
        assert_eq!(registry.fallback_for(&id, site), Coordinate::new(-17.35, 30.2));

        registry.apply(
            DeviceRecord {
                position: site,
                position_source: PositionSource::Fallback,
                ..record()
            },
            now(),
        );
        assert_eq!(registry.fallback_for(&id, Coordinate::new(2.0, 2.0)), Coordinate::new(2.0, 2.0));
    }

    #[test]
    fn relocates_only_fallback_devices() {
        let mut registry = DeviceRegistry::new();
        registry.apply(
            DeviceRecord {
                position_source: PositionSource::Fallback,
                ..record()
            },
            now(),
        );
        registry.apply(
            DeviceRecord {
                id: DeviceId::new("RPI5-002"),
                ..record()
            },
            now(),
        );

        let moved = registry.relocate_fallback(Coordinate::new(5.0, 6.0));
        assert_eq!(moved, vec![DeviceId::new("RPI5-001")]);
        assert_eq!(
            registry.get(&DeviceId::new("RPI5-002")).unwrap().position,
            Coordinate::new(-17.35, 30.2)
        );
    }
}
