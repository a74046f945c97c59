//! Audible poacher alerts
//!
//! The dispatcher throttles alert requests and plays the alert pattern on a
//! tone sink. Audio failures are logged and swallowed so the pipeline keeps
//! running on hosts without sound.

use chrono::{DateTime, Utc};
use std::time::Duration;
use vigil_hal::{Tone, ToneSink};

/// Minimum spacing between two audible alerts
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(5000);

/// Sequence of tones making up one alert
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPattern {
    pub tones: Vec<Tone>,
}

impl AlertPattern {
    /// Two A5 beeps followed by a longer, louder C6
    pub fn poacher() -> Self {
        Self {
            tones: vec![
                Tone::new(880.0, 500, 0).with_gain(0.3),
                Tone::new(880.0, 500, 200).with_gain(0.3),
                Tone::new(1047.0, 700, 400).with_gain(0.4),
            ],
        }
    }
}

impl Default for AlertPattern {
    fn default() -> Self {
        Self::poacher()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Played,
    /// Within the minimum interval of the previous alert
    Suppressed,
    /// The sink failed; the alert still counts towards the throttle
    Failed,
}

pub struct AlertDispatcher {
    sink: Box<dyn ToneSink>,
    pattern: AlertPattern,
    min_interval: Duration,
    last_alert: Option<DateTime<Utc>>,
}

impl AlertDispatcher {
    pub fn new(sink: Box<dyn ToneSink>) -> Self {
        Self {
            sink,
            pattern: AlertPattern::default(),
            min_interval: DEFAULT_MIN_INTERVAL,
            last_alert: None,
        }
    }

    /// Set minimum interval between alerts
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_pattern(mut self, pattern: AlertPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.last_alert
    }

    fn throttled(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_alert else {
            return false;
        };
        let elapsed_ms = (now - last).num_milliseconds();
        elapsed_ms < self.min_interval.as_millis() as i64
    }

    /// Request an alert at `now`
    pub fn trigger(&mut self, now: DateTime<Utc>) -> AlertOutcome {
        if self.throttled(now) {
            tracing::debug!("Alert suppressed, last one at {:?}", self.last_alert);
            return AlertOutcome::Suppressed;
        }
        self.last_alert = Some(now);

        for tone in &self.pattern.tones {
            if let Err(e) = self.sink.play_tone(tone) {
                tracing::error!("Failed to play alert sound: {}", e);
                return AlertOutcome::Failed;
            }
        }

        tracing::warn!("Poacher alert sounded");
        AlertOutcome::Played
    }
}
