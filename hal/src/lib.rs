//! Vigil Host Abstraction Layer
//!
//! Provides unified access to everything outside the telemetry core
//! for the Vigil wildlife monitor.
//!
//! # Modules
//!
//! - [`audio`] - Tone synthesis and ALSA playback for audible alerts
//! - [`storage`] - Persistent key/list storage for the audit log
//! - [`geolocation`] - Best-effort host coordinate lookup
//! - [`rtdb`] - Realtime database REST client (one-shot reads and event streams)
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_hal::{RtdbClient, RtdbConfig, SnapshotSource, SourceEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = RtdbClient::new(RtdbConfig::default()).unwrap();
//!     let mut events = client.subscribe().await.unwrap();
//!
//!     while let Some(event) = events.recv().await {
//!         if let SourceEvent::Snapshot(Some(value)) = event {
//!             println!("{}", value);
//!         }
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};

pub mod audio;
pub mod geolocation;
pub mod rtdb;
pub mod storage;

// Re-exports for convenience
pub use audio::{AudioFormat, AudioPlayback, NullSink, Tone, ToneSink};
pub use geolocation::{FixedLocator, Geolocator};
pub use rtdb::{RtdbClient, RtdbConfig, SnapshotSource, SourceEvent};
pub use storage::{JsonFileStore, ListStore, MemoryStore};

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// HAL Error types
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Stream cancelled by server: {0}")]
    StreamCancelled(String),

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, HalError>;
