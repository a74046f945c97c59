// Application Configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_hal::{Coordinate, FixedLocator, RtdbConfig};
use vigil_telemetry::{DeviceId, MonitorConfig};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Realtime database base URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Document path holding the device snapshot
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Identifier of the monitored device
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Poll interval when real-time delivery is unavailable
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Minimum spacing between audible alerts
    #[serde(default = "default_alert_interval")]
    pub alert_interval_ms: u64,

    /// Position used for devices that report none
    #[serde(default = "default_base_latitude")]
    pub base_latitude: f64,

    #[serde(default = "default_base_longitude")]
    pub base_longitude: f64,

    /// Position of this host, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_longitude: Option<f64>,

    /// Directory for the persisted audit log
    #[serde(default = "default_data_dir")]
    pub data_directory: String,

    /// Play audible alerts
    #[serde(default = "default_true")]
    pub audio_enabled: bool,

    /// ALSA device for alerts
    #[serde(default = "default_audio_device")]
    pub audio_device: String,

    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Path to config file (for reference)
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_database_url() -> String { "https://vigil1-default-rtdb.firebaseio.com".to_string() }
fn default_data_path() -> String { "wildeye".to_string() }
fn default_device_id() -> String { "RPI5-001".to_string() }
fn default_poll_interval() -> u64 { 5000 }
fn default_alert_interval() -> u64 { 5000 }
fn default_base_latitude() -> f64 { -17.351880 }
fn default_base_longitude() -> f64 { 30.206747 }
fn default_data_dir() -> String { "/var/lib/vigil/data".to_string() }
fn default_true() -> bool { true }
fn default_audio_device() -> String { "default".to_string() }
fn default_log_format() -> String { "text".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            data_path: default_data_path(),
            device_id: default_device_id(),
            poll_interval_ms: default_poll_interval(),
            alert_interval_ms: default_alert_interval(),
            base_latitude: default_base_latitude(),
            base_longitude: default_base_longitude(),
            host_latitude: None,
            host_longitude: None,
            data_directory: default_data_dir(),
            audio_enabled: true,
            audio_device: default_audio_device(),
            log_format: default_log_format(),
            config_path: PathBuf::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `explicit` or the standard paths, then apply
    /// environment overrides. Runs before logging is set up, so callers
    /// report [`AppConfig::loaded_from_file`] themselves.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => Self::search()?,
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn search() -> Result<Self> {
        let config_paths = [
            PathBuf::from("/etc/vigil/config.toml"),
            dirs::config_dir()
                .map(|p| p.join("vigil/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("./config.toml"),
        ];

        for path in &config_paths {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// False when no configuration file was found and defaults are in use
    pub fn loaded_from_file(&self) -> bool {
        !self.config_path.as_os_str().is_empty()
    }

    /// Load configuration from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Environment variables win over file settings
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("VIGIL_DATABASE_URL").filter(|v| !v.is_empty()) {
            self.database_url = url;
        }
        if let Some(path) = lookup("VIGIL_DATA_PATH").filter(|v| !v.is_empty()) {
            self.data_path = path;
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            device_id: DeviceId::new(&self.device_id),
            base: Coordinate::new(self.base_latitude, self.base_longitude),
            alert_interval: Duration::from_millis(self.alert_interval_ms),
            ..Default::default()
        }
    }

    pub fn rtdb_config(&self) -> RtdbConfig {
        RtdbConfig {
            database_url: self.database_url.clone(),
            path: self.data_path.clone(),
            ..Default::default()
        }
    }

    pub fn locator(&self) -> FixedLocator {
        FixedLocator::from_parts(self.host_latitude, self.host_longitude)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Generate example configuration
    pub fn example() -> String {
        let config = Self {
            host_latitude: Some(-17.3600),
            host_longitude: Some(30.2000),
            ..Default::default()
        };

        let body = toml::to_string_pretty(&config).unwrap_or_default();
        format!(
            "# Vigil Configuration File\n#\n# Copy this file to /etc/vigil/config.toml or ~/.config/vigil/config.toml\n\n{}",
            body
        )
    }
}

/// Helper for getting config directories
mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vigil_hal::Geolocator;

    #[test]
    fn missing_keys_take_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device_id = \"RPI5-007\"\npoll_interval_ms = 2000").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.device_id, "RPI5-007");
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.data_path, "wildeye");
        assert_eq!(config.alert_interval_ms, 5000);
        assert_eq!(config.host_latitude, None);
        assert_eq!(config.config_path, file.path());
        assert!(config.loaded_from_file());
        assert!(!AppConfig::default().loaded_from_file());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = \"soon\"").unwrap();
        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            "VIGIL_DATABASE_URL" => Some("http://localhost:9000".to_string()),
            "VIGIL_DATA_PATH" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.database_url, "http://localhost:9000");
        assert_eq!(config.data_path, "wildeye");
    }

    #[test]
    fn example_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, AppConfig::example()).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.host_latitude, Some(-17.36));

        let monitor = config.monitor_config();
        assert_eq!(monitor.device_id.as_str(), "RPI5-001");
        assert_eq!(monitor.base, Coordinate::new(-17.351880, 30.206747));
        assert!(config.locator().current_coordinate().is_some());
    }
}
