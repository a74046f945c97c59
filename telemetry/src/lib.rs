//! Vigil Telemetry Library
//!
//! Turns loosely-typed snapshots from the realtime database into canonical
//! device records, derives the activity that changed, and drives the side
//! effects (audible alerts, audit logging, presentation updates).

pub mod activity;
pub mod alert;
pub mod audit;
pub mod classifier;
pub mod coordinates;
pub mod device;
pub mod monitor;
pub mod presentation;
pub mod reducer;
pub mod snapshot;
pub mod timestamp;

use serde::{Deserialize, Serialize};
use vigil_hal::HalError;

pub use activity::{ActivityCategory, ActivityEvent, ActivityLog};
pub use alert::{AlertDispatcher, AlertOutcome, AlertPattern};
pub use audit::{AuditExport, AuditLogEntry, AuditLogger};
pub use device::{DeviceId, DeviceRecord, Normalizer};
pub use monitor::{Monitor, MonitorConfig};
pub use presentation::{ConnectionState, ConnectionStatus, LoggingPresenter, Presenter, Statistics};
pub use reducer::{DeviceEvent, DeviceRegistry, Transition};
pub use snapshot::{Field, RawSnapshot, Scalar};

/// Device connectivity as derived from the age of its last report
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Person category seen by a device. Absence is modelled as `Option::None`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Poacher,
    Ranger,
}

/// Severity used for event severity and marker colouring
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    Animal,
    Ranger,
    Alert,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Animal => "animal",
            AlertLevel::Ranger => "ranger",
            AlertLevel::Alert => "alert",
        }
    }
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    #[error("Snapshot is not an object: {0}")]
    InvalidSnapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
