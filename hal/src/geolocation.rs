//! Host geolocation
//!
//! Best-effort source for the monitor's own position, used only to seed the
//! fallback coordinate for devices that report no usable location.

use crate::Coordinate;

pub trait Geolocator: Send + Sync {
    /// Current host coordinate, or `None` when unavailable
    fn current_coordinate(&self) -> Option<Coordinate>;
}

/// Coordinate taken from configuration
#[derive(Debug, Clone, Default)]
pub struct FixedLocator {
    coordinate: Option<Coordinate>,
}

impl FixedLocator {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self { coordinate }
    }

    /// Build from optional latitude/longitude settings; both are required
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Self {
        let coordinate = match (lat, lng) {
            (Some(lat), Some(lng)) if valid_lat(lat) && valid_lng(lng) => {
                Some(Coordinate::new(lat, lng))
            }
            (None, None) => None,
            (lat, lng) => {
                tracing::warn!(?lat, ?lng, "Ignoring incomplete or out-of-range host location");
                None
            }
        };
        Self { coordinate }
    }
}

impl Geolocator for FixedLocator {
    fn current_coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }
}

fn valid_lat(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

fn valid_lng(lng: f64) -> bool {
    lng.is_finite() && (-180.0..=180.0).contains(&lng)
}
