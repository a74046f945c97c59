//! Audit logging and export
//!
//! Every raw snapshot is captured as received, whether or not it changed
//! any device. The log is kept in memory and appended to a list store.
//! The store may be shared with other processes, so each write starts from
//! what it currently holds.

use crate::snapshot::{set_value, RawSnapshot, Scalar};
use crate::{Result, TelemetryError};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use vigil_hal::ListStore;

pub const MEMORY_CAPACITY: usize = 1000;
pub const PERSISTED_CAPACITY: usize = 500;

/// Entries shown when viewing the log
pub const VIEW_LEN: usize = 50;

/// Store key of the persisted log
pub const STORAGE_KEY: &str = "vigil1_data_logs";

pub const CSV_HEADER: &str = "Timestamp,Received At,Animal,Human,Role,Human Count,BLE Present,BLE RSSI,BLE Last Seen,Data Timestamp,Latitude,Longitude";

/// Raw field values of one snapshot, with display defaults for absent fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditData {
    pub animal: Scalar,
    pub human: Scalar,
    pub role: Scalar,
    pub human_count: Scalar,
    pub ble_present: Scalar,
    pub ble_rssi: Scalar,
    pub ble_last_seen: Scalar,
    pub timestamp: Scalar,
    pub lat: Option<Scalar>,
    pub lng: Option<Scalar>,
}

impl AuditData {
    pub fn capture(raw: &RawSnapshot) -> Self {
        let or_none = |field: &Option<Scalar>| {
            set_value(field)
                .cloned()
                .unwrap_or_else(|| Scalar::text("None"))
        };

        Self {
            animal: or_none(&raw.animal),
            human: or_none(&raw.human),
            role: or_none(&raw.role),
            human_count: raw.human_count.clone().unwrap_or(Scalar::Number(0.into())),
            ble_present: raw.ble_present.clone().unwrap_or(Scalar::Bool(false)),
            ble_rssi: or_none(&raw.ble_rssi),
            ble_last_seen: or_none(&raw.ble_last_seen),
            timestamp: or_none(&raw.timestamp),
            lat: set_value(&raw.lat).or(set_value(&raw.latitude)).cloned(),
            lng: set_value(&raw.lng).or(set_value(&raw.longitude)).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    /// Receipt time, epoch milliseconds
    pub received_at: i64,
    pub data: AuditData,
}

impl AuditLogEntry {
    pub fn new(raw: &RawSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            received_at: now.timestamp_millis(),
            data: AuditData::capture(raw),
        }
    }

    fn csv_row(&self) -> String {
        let received = Utc
            .timestamp_millis_opt(self.received_at)
            .single()
            .map(iso)
            .unwrap_or_default();
        let optional = |v: &Option<Scalar>| v.as_ref().map(Scalar::to_string).unwrap_or_default();

        let fields = [
            iso(self.timestamp),
            received,
            self.data.animal.to_string(),
            self.data.human.to_string(),
            self.data.role.to_string(),
            self.data.human_count.to_string(),
            self.data.ble_present.to_string(),
            self.data.ble_rssi.to_string(),
            self.data.ble_last_seen.to_string(),
            self.data.timestamp.to_string(),
            optional(&self.data.lat),
            optional(&self.data.lng),
        ];

        fields
            .iter()
            .map(|f| csv_quote(f))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// JSON export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditExport {
    pub exported_at: DateTime<Utc>,
    pub total_entries: usize,
    pub logs: Vec<AuditLogEntry>,
}

impl AuditExport {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Bounded audit log with a persisted copy
pub struct AuditLogger {
    entries: VecDeque<AuditLogEntry>,
    store: Box<dyn ListStore>,
    key: String,
}

impl AuditLogger {
    /// Open the log, loading whatever the store already holds
    pub fn open(store: Box<dyn ListStore>, key: &str) -> Self {
        let entries: VecDeque<AuditLogEntry> = match store.get_list(key) {
            Ok(items) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value(item) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::debug!("Skipping unreadable stored log entry: {}", e);
                        None
                    }
                })
                .take(PERSISTED_CAPACITY)
                .collect(),
            Err(e) => {
                tracing::error!("Failed to load stored logs: {}", e);
                VecDeque::new()
            }
        };
        tracing::info!("Loaded {} stored log entries", entries.len());

        Self {
            entries,
            store,
            key: key.to_string(),
        }
    }

    /// Capture `raw`; persistence failures are logged and otherwise ignored
    pub fn record(&mut self, raw: &RawSnapshot, now: DateTime<Utc>) -> &AuditLogEntry {
        let entry = AuditLogEntry::new(raw, now);

        if let Err(e) = self.persist(&entry) {
            tracing::error!("Failed to save log to store: {}", e);
        }

        self.entries.push_front(entry);
        self.entries.truncate(MEMORY_CAPACITY);
        &self.entries[0]
    }

    /// Prepend `entry` to the stored list and cut it to `PERSISTED_CAPACITY`
    fn persist(&mut self, entry: &AuditLogEntry) -> Result<()> {
        let mut items = match self.store.get_list(&self.key) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Failed to read stored logs, rewriting from memory: {}", e);
                self.entries
                    .iter()
                    .take(PERSISTED_CAPACITY - 1)
                    .map(serde_json::to_value)
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        items.insert(0, serde_json::to_value(entry)?);
        items.truncate(PERSISTED_CAPACITY);
        self.store.set_list(&self.key, &items)?;
        Ok(())
    }

    /// Newest first
    pub fn entries(&self) -> impl Iterator<Item = &AuditLogEntry> {
        self.entries.iter()
    }

    /// The `n` newest entries
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &AuditLogEntry> {
        self.entries.iter().take(n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop both the in-memory and the persisted log
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.store.remove(&self.key)?;
        tracing::info!("All logs cleared");
        Ok(())
    }

    pub fn export(&self, now: DateTime<Utc>) -> AuditExport {
        AuditExport {
            exported_at: now,
            total_entries: self.entries.len(),
            logs: self.entries.iter().cloned().collect(),
        }
    }

    pub fn export_json(&self, now: DateTime<Utc>) -> Result<String> {
        if self.entries.is_empty() {
            return Err(TelemetryError::Export("no logs to export".to_string()));
        }
        Ok(serde_json::to_string_pretty(&self.export(now))?)
    }

    pub fn export_csv(&self) -> Result<String> {
        if self.entries.is_empty() {
            return Err(TelemetryError::Export("no logs to export".to_string()));
        }

        let mut csv = String::from(CSV_HEADER);
        csv.push('\n');
        for entry in &self.entries {
            csv.push_str(&entry.csv_row());
            csv.push('\n');
        }
        Ok(csv)
    }
}

/// Suggested download name, e.g. `vigil_logs_2024-05-01T12-00-00.000Z.csv`
pub fn export_file_name(now: DateTime<Utc>, extension: &str) -> String {
    format!("vigil_logs_{}.{}", iso(now).replace(':', "-"), extension)
}

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn csv_quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_hal::{HalError, MemoryStore};

    struct FailingStore;

    impl ListStore for FailingStore {
        fn get_list(&self, _key: &str) -> vigil_hal::Result<Vec<serde_json::Value>> {
            Err(HalError::Timeout)
        }

        fn set_list(&mut self, _key: &str, _items: &[serde_json::Value]) -> vigil_hal::Result<()> {
            Err(HalError::IoError(std::io::Error::other("disk full")))
        }

        fn remove(&mut self, _key: &str) -> vigil_hal::Result<()> {
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(i: usize) -> RawSnapshot {
        RawSnapshot {
            animal: Some(Scalar::Text(format!("animal-{}", i))),
            ..Default::default()
        }
    }

    #[test]
    fn absent_fields_get_defaults() {
        let entry = AuditLogEntry::new(&RawSnapshot::default(), now());

        assert_eq!(entry.received_at, now().timestamp_millis());
        assert_eq!(entry.data.animal, Scalar::text("None"));
        assert_eq!(entry.data.human_count, Scalar::Number(0.into()));
        assert_eq!(entry.data.ble_present, Scalar::Bool(false));
        assert_eq!(entry.data.timestamp, Scalar::text("None"));
        assert_eq!(entry.data.lat, None);
    }

    #[test]
    fn latitude_alias_is_captured() {
        let raw = RawSnapshot::from_value(&json!({"latitude": -17.3, "lng": "30.2"})).unwrap();
        let entry = AuditLogEntry::new(&raw, now());

        assert_eq!(entry.data.lat, Scalar::number(-17.3));
        assert_eq!(entry.data.lng, Some(Scalar::text("30.2")));
    }

    #[test]
    fn memory_log_keeps_newest_thousand() {
        let mut logger = AuditLogger::open(Box::new(MemoryStore::new()), STORAGE_KEY);

        for i in 0..=MEMORY_CAPACITY {
            logger.record(&snapshot(i), now());
        }

        assert_eq!(logger.len(), MEMORY_CAPACITY);
        let newest = logger.entries().next().unwrap();
        assert_eq!(newest.data.animal, Scalar::text("animal-1000"));
        let oldest = logger.entries().last().unwrap();
        assert_eq!(oldest.data.animal, Scalar::text("animal-1"));
    }

    #[test]
    fn persisted_log_is_capped_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = vigil_hal::JsonFileStore::new(dir.path()).unwrap();
        let mut logger = AuditLogger::open(Box::new(store), STORAGE_KEY);

        for i in 0..600 {
            logger.record(&snapshot(i), now());
        }
        assert_eq!(logger.len(), 600);

        let store = vigil_hal::JsonFileStore::new(dir.path()).unwrap();
        let reopened = AuditLogger::open(Box::new(store), STORAGE_KEY);
        assert_eq!(reopened.len(), PERSISTED_CAPACITY);
        assert_eq!(
            reopened.entries().next().unwrap().data.animal,
            Scalar::text("animal-599")
        );
    }

    #[test]
    fn clear_from_another_logger_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            let store = vigil_hal::JsonFileStore::new(dir.path()).unwrap();
            AuditLogger::open(Box::new(store), STORAGE_KEY)
        };

        let mut daemon = open();
        for i in 0..3 {
            daemon.record(&snapshot(i), now());
        }

        let mut cli = open();
        assert_eq!(cli.len(), 3);
        cli.clear().unwrap();

        daemon.record(&snapshot(3), now());
        let reopened = open();
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.entries().next().unwrap().data.animal,
            Scalar::text("animal-3")
        );
    }

    #[test]
    fn entries_from_another_logger_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            let store = vigil_hal::JsonFileStore::new(dir.path()).unwrap();
            AuditLogger::open(Box::new(store), STORAGE_KEY)
        };

        let mut first = open();
        let mut second = open();
        first.record(&snapshot(1), now());
        second.record(&snapshot(2), now());

        let animals: Vec<_> = open().entries().map(|e| e.data.animal.to_string()).collect();
        assert_eq!(animals, vec!["animal-2", "animal-1"]);
    }

    #[test]
    fn store_failure_keeps_memory_log() {
        let mut logger = AuditLogger::open(Box::new(FailingStore), STORAGE_KEY);
        logger.record(&snapshot(1), now());
        logger.record(&snapshot(2), now());
        assert_eq!(logger.len(), 2);
    }

    #[test]
    fn json_export_round_trips() {
        let mut logger = AuditLogger::open(Box::new(MemoryStore::new()), STORAGE_KEY);
        let raw = RawSnapshot::from_value(&json!({
            "animal": "Lion",
            "role": "ranger \"alpha\"",
            "human_count": 2,
            "ble_present": true,
            "ble_rssi": -70,
            "timestamp": 1714564800,
            "lat": "-17.35",
        }))
        .unwrap();
        logger.record(&raw, now());
        logger.record(&RawSnapshot::default(), now() + chrono::Duration::seconds(5));

        let json = logger.export_json(now()).unwrap();
        let parsed = AuditExport::parse(&json).unwrap();

        assert_eq!(parsed.total_entries, 2);
        assert_eq!(parsed.logs, logger.entries().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn json_export_keeps_integers() {
        let mut logger = AuditLogger::open(Box::new(MemoryStore::new()), STORAGE_KEY);
        let raw = RawSnapshot::from_value(&json!({
            "human_count": 2,
            "ble_rssi": -67,
            "timestamp": 1714564800,
            "ble_last_seen": 9007199254740993u64,
            "lat": -17.35,
        }))
        .unwrap();
        logger.record(&raw, now());

        let json = logger.export_json(now()).unwrap();
        assert!(json.contains("\"human_count\": 2,"));
        assert!(json.contains("\"timestamp\": 1714564800,"));
        assert!(!json.contains("1714564800.0"));

        let exported: serde_json::Value = serde_json::from_str(&json).unwrap();
        let data = &exported["logs"][0]["data"];
        assert_eq!(data["human_count"], json!(2));
        assert_eq!(data["ble_rssi"], json!(-67));
        assert_eq!(data["timestamp"], json!(1714564800));
        assert_eq!(data["ble_last_seen"], json!(9007199254740993u64));
        assert_eq!(data["lat"], json!(-17.35));

        let csv = logger.export_csv().unwrap();
        assert!(csv.contains(",\"2\",\"false\",\"-67\",\"9007199254740993\",\"1714564800\","));
    }

    #[test]
    fn csv_export_quotes_fields() {
        let mut logger = AuditLogger::open(Box::new(MemoryStore::new()), STORAGE_KEY);
        let raw = RawSnapshot::from_value(&json!({
            "animal": "Lion",
            "human": "said \"hi\"",
            "human_count": 1,
            "lat": -17.5,
        }))
        .unwrap();
        logger.record(&raw, now());

        let csv = logger.export_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some(
                "\"2024-05-01T12:00:00.000Z\",\"2024-05-01T12:00:00.000Z\",\"Lion\",\"said \"\"hi\"\"\",\"None\",\"1\",\"false\",\"None\",\"None\",\"None\",\"-17.5\",\"\""
            )
        );
    }

    #[test]
    fn empty_log_cannot_be_exported() {
        let logger = AuditLogger::open(Box::new(MemoryStore::new()), STORAGE_KEY);
        assert!(matches!(logger.export_csv(), Err(TelemetryError::Export(_))));
        assert!(matches!(logger.export_json(now()), Err(TelemetryError::Export(_))));
    }

    #[test]
    fn clear_empties_both_logs() {
        let mut logger = AuditLogger::open(Box::new(MemoryStore::new()), STORAGE_KEY);
        logger.record(&snapshot(1), now());
        logger.clear().unwrap();
        assert!(logger.is_empty());
    }

    #[test]
    fn file_name_has_no_colons() {
        assert_eq!(
            export_file_name(now(), "json"),
            "vigil_logs_2024-05-01T12-00-00.000Z.json"
        );
    }
}
