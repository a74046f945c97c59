//! Activity feed
//!
//! User-visible state transitions, newest first, bounded.

use crate::device::DeviceId;
use crate::AlertLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const ACTIVITY_LOG_CAPACITY: usize = 50;

/// Entries shown in the rendered feed
pub const ACTIVITY_FEED_LEN: usize = 20;

/// Identifier used for events raised by the monitor itself
pub const SYSTEM_SOURCE: &str = "SYSTEM";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Info,
    Alert,
    Ranger,
    Animal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub device_id: DeviceId,
    pub category: ActivityCategory,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
    /// Alert level of the device when the event was raised
    pub severity: AlertLevel,
}

impl ActivityEvent {
    pub fn system(message: &str, at: DateTime<Utc>) -> Self {
        Self {
            device_id: DeviceId::new(SYSTEM_SOURCE),
            category: ActivityCategory::Info,
            message: message.to_string(),
            occurred_at: at,
            severity: AlertLevel::Normal,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.severity {
            AlertLevel::Alert => "⚠️",
            AlertLevel::Ranger => "✓",
            AlertLevel::Animal => "🦁",
            AlertLevel::Normal => "📡",
        }
    }
}

/// Bounded activity log
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEvent>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: ActivityEvent) {
        self.entries.push_front(event);
        self.entries.truncate(self.capacity);
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &ActivityEvent> {
        self.entries.iter()
    }

    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ActivityEvent> {
        self.entries.iter().take(n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(ACTIVITY_LOG_CAPACITY)
    }
}
