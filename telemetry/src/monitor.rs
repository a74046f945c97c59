//! Monitoring controller
//!
//! [`Monitor`] owns every piece of mutable state: the device registry, the
//! activity and audit logs, the alert throttle and the connection status.
//! Snapshots are processed one at a time, start to finish, so nothing here
//! needs locking.

use crate::activity::{ActivityEvent, ActivityLog, ACTIVITY_FEED_LEN};
use crate::alert::{AlertDispatcher, DEFAULT_MIN_INTERVAL};
use crate::audit::{AuditLogger, STORAGE_KEY};
use crate::device::{DeviceId, Normalizer};
use crate::presentation::{ConnectionState, ConnectionStatus, Presenter, Statistics};
use crate::reducer::{DeviceEvent, DeviceRegistry};
use crate::snapshot::RawSnapshot;
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use vigil_hal::{Coordinate, ListStore, SnapshotSource, SourceEvent, ToneSink};

pub const MSG_STARTUP: &str = "Dashboard initialized, connecting to data source...";
pub const MSG_REALTIME: &str = "Connected (real-time)";
pub const MSG_CONNECTED: &str = "Connected";
pub const MSG_POLLING: &str = "Real-time unavailable, polling";
pub const MSG_DEMO: &str = "Demo mode";

/// Nyamuswa Ranch, Chinhoyi
pub const DEFAULT_BASE: Coordinate = Coordinate::new(-17.351880, 30.206747);

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub device_id: DeviceId,
    /// Last-resort position for devices that report none
    pub base: Coordinate,
    pub alert_interval: Duration,
    pub storage_key: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceId::new("RPI5-001"),
            base: DEFAULT_BASE,
            alert_interval: DEFAULT_MIN_INTERVAL,
            storage_key: STORAGE_KEY.to_string(),
        }
    }
}

pub struct Monitor {
    config: MonitorConfig,
    normalizer: Normalizer,
    registry: DeviceRegistry,
    activity: ActivityLog,
    audit: AuditLogger,
    alerts: AlertDispatcher,
    host_location: Option<Coordinate>,
    connection: ConnectionStatus,
    presenter: Box<dyn Presenter>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        store: Box<dyn ListStore>,
        sink: Box<dyn ToneSink>,
        presenter: Box<dyn Presenter>,
    ) -> Self {
        let audit = AuditLogger::open(store, &config.storage_key);
        let alerts = AlertDispatcher::new(sink).with_min_interval(config.alert_interval);

        Self {
            normalizer: Normalizer::new(config.device_id.clone()),
            registry: DeviceRegistry::new(),
            activity: ActivityLog::default(),
            audit,
            alerts,
            host_location: None,
            connection: ConnectionStatus::disconnected("Not connected"),
            presenter,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn alerts(&self) -> &AlertDispatcher {
        &self.alerts
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::from_records(self.registry.records())
    }

    /// Fallback position for devices: the host location once known, else the base
    pub fn site(&self) -> Coordinate {
        self.host_location.unwrap_or(self.config.base)
    }

    /// Process a document read from the source
    pub fn process_value(&mut self, value: &Value, now: DateTime<Utc>) -> Result<Vec<DeviceEvent>> {
        let raw = RawSnapshot::from_value(value)?;
        Ok(self.process_snapshot(&raw, now))
    }

    /// Audit, normalize, reduce, dispatch and present one snapshot
    pub fn process_snapshot(&mut self, raw: &RawSnapshot, now: DateTime<Utc>) -> Vec<DeviceEvent> {
        self.audit.record(raw, now);
        self.presenter.on_log_count(self.audit.len());

        let id = self.normalizer.device_id().clone();
        let fallback = self.registry.fallback_for(&id, self.site());
        let record = self.normalizer.normalize(raw, fallback, now);
        tracing::debug!(
            device = %id,
            status = %record.status,
            position = %record.position,
            source = ?record.position_source,
            "Snapshot normalized"
        );

        let events = self.registry.apply(record, now);
        self.dispatch(&events, now);
        self.present(&id);
        events
    }

    fn dispatch(&mut self, events: &[DeviceEvent], now: DateTime<Utc>) {
        for event in events {
            match event {
                DeviceEvent::Activity(activity) => self.push_activity(activity.clone()),
                DeviceEvent::PoacherAlert { device_id } => {
                    let outcome = self.alerts.trigger(now);
                    tracing::debug!(device = %device_id, ?outcome, "Poacher alert dispatched");
                }
            }
        }
    }

    fn push_activity(&mut self, event: ActivityEvent) {
        self.presenter.on_activity(&event);
        self.activity.push(event);
    }

    fn present(&self, id: &DeviceId) {
        if let Some(record) = self.registry.get(id) {
            self.presenter.on_device_updated(record, &self.statistics());
        }
    }

    /// Log an entry on behalf of the monitor itself
    pub fn log_system(&mut self, message: &str, now: DateTime<Utc>) {
        self.push_activity(ActivityEvent::system(message, now));
    }

    pub fn recent_activity(&self) -> impl Iterator<Item = &ActivityEvent> {
        self.activity.recent(ACTIVITY_FEED_LEN)
    }

    pub fn clear_activity(&mut self) {
        self.activity.clear();
    }

    pub fn clear_audit(&mut self) -> Result<()> {
        self.audit.clear()?;
        self.presenter.on_log_count(0);
        Ok(())
    }

    /// Update the connection status, notifying the presenter on change only
    pub fn set_connection(&mut self, status: ConnectionStatus) {
        if status != self.connection {
            self.connection = status;
            self.presenter.on_connection(&self.connection);
        }
    }

    pub fn set_demo(&mut self) {
        self.set_connection(ConnectionStatus::new(ConnectionState::Demo, MSG_DEMO));
    }

    /// The source has no data at its path
    pub fn on_absent(&mut self, path: &str) {
        self.set_connection(ConnectionStatus::disconnected(format!("No data at {}", path)));
    }

    /// Record the host position and move devices placed purely by fallback
    pub fn set_host_location(&mut self, coordinate: Coordinate) {
        tracing::info!("Host location: {}", coordinate);
        self.host_location = Some(coordinate);

        for id in self.registry.relocate_fallback(coordinate) {
            tracing::debug!(device = %id, "Moved to host location");
            self.present(&id);
        }
    }

    /// Feed recorded documents through the pipeline with status `demo`
    pub fn replay<I>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = Value>,
    {
        self.set_demo();
        let mut processed = 0;
        for value in values {
            match self.process_value(&value, Utc::now()) {
                Ok(_) => processed += 1,
                Err(e) => tracing::warn!("Skipping recorded snapshot: {}", e),
            }
        }
        processed
    }

    /// One poll of the source
    pub async fn poll_once(&mut self, source: &dyn SnapshotSource) {
        match source.fetch().await {
            Ok(Some(value)) => {
                self.set_connection(ConnectionStatus::new(ConnectionState::Connected, MSG_CONNECTED));
                if let Err(e) = self.process_value(&value, Utc::now()) {
                    tracing::warn!("Ignoring snapshot: {}", e);
                }
            }
            Ok(None) => self.on_absent(&source.describe()),
            Err(e) => {
                tracing::warn!("Fetch failed: {}", e);
                self.set_connection(ConnectionStatus::disconnected(format!("Fetch failed: {}", e)));
            }
        }
    }

    /// Follow `source` until `shutdown` resolves.
    ///
    /// Real-time delivery is preferred; if the subscription cannot be set up,
    /// or ends, the source is polled every `poll_interval` instead.
    pub async fn run<F>(&mut self, source: &dyn SnapshotSource, poll_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.log_system(MSG_STARTUP, Utc::now());
        let path = source.describe();

        match source.subscribe().await {
            Ok(mut rx) => {
                self.set_connection(ConnectionStatus::new(ConnectionState::Connected, MSG_REALTIME));
                loop {
                    tokio::select! {
                        _ = &mut shutdown => return,
                        event = rx.recv() => match event {
                            Some(SourceEvent::Snapshot(Some(value))) => {
                                tracing::debug!("Real-time update received");
                                self.set_connection(ConnectionStatus::new(
                                    ConnectionState::Connected,
                                    MSG_REALTIME,
                                ));
                                if let Err(e) = self.process_value(&value, Utc::now()) {
                                    tracing::warn!("Ignoring snapshot: {}", e);
                                }
                            }
                            Some(SourceEvent::Snapshot(None)) => self.on_absent(&path),
                            Some(SourceEvent::Error(message)) => {
                                self.set_connection(ConnectionStatus::disconnected(format!(
                                    "Listener error: {}",
                                    message
                                )));
                            }
                            None => {
                                tracing::warn!("Real-time channel closed");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => tracing::warn!("Real-time subscription failed: {}", e),
        }

        self.set_connection(ConnectionStatus::disconnected(MSG_POLLING));
        tracing::info!("Polling {} every {:?}", path, poll_interval);

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut shutdown => return,
                _ = ticker.tick() => self.poll_once(source).await,
            }
        }
    }
}
