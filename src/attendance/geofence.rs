use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::geofence::GeofenceConfig;

/// Earth radius in meters, same constant the stored history was computed with.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
///
/// Haversine, kept in this exact order of operations so distances reported
/// here stay consistent with previously stored values.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin() * (d_phi / 2.0).sin()
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin() * (d_lambda / 2.0).sin();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Location {
    #[schema(example = 12.2253)]
    pub lat: f64,
    #[schema(example = 79.0747)]
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GeofenceDecision {
    pub allowed: bool,
    /// Always reported so the UI can show how far the worker is.
    pub distance_m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GeofenceDecision {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }
}

/// Decide whether attendance actions are permitted from `location`.
pub fn validate(location: Location, config: &GeofenceConfig) -> GeofenceDecision {
    if !config.is_configured() {
        return GeofenceDecision {
            allowed: false,
            distance_m: 0.0,
            reason: Some("Location settings not configured by admin".to_string()),
        };
    }

    // is_configured() guarantees all three are present
    let (site_lat, site_lon, radius) = (
        config.latitude.unwrap_or_default(),
        config.longitude.unwrap_or_default(),
        config.radius_m.unwrap_or_default(),
    );

    let distance_m = haversine_m(site_lat, site_lon, location.lat, location.lon);

    if distance_m <= radius {
        GeofenceDecision {
            allowed: true,
            distance_m,
            reason: None,
        }
    } else {
        GeofenceDecision {
            allowed: false,
            distance_m,
            reason: Some(format!(
                "You are outside the allowed attendance location. Distance: {:.2} km from site.",
                distance_m / 1000.0
            )),
        }
    }
}

/// Client-side geolocation failure, forwarded by the browser when it could
/// not obtain coordinates at all. Distinct from a geofence rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationFailure {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    Unknown,
}

impl LocationFailure {
    pub fn message(self) -> &'static str {
        match self {
            LocationFailure::PermissionDenied => {
                "Location permission denied. Please enable location access to use attendance features."
            }
            LocationFailure::PositionUnavailable => {
                "Location information is unavailable. Please check your device location settings and try again."
            }
            LocationFailure::Timeout => "Location request timed out. Please try again.",
            LocationFailure::Unknown => {
                "Unable to retrieve your location. Please check your device location settings and try again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(lat: f64, lon: f64, radius_m: f64) -> GeofenceConfig {
        GeofenceConfig {
            enabled: true,
            latitude: Some(lat),
            longitude: Some(lon),
            radius_m: Some(radius_m),
            updated_at: None,
        }
    }

    #[test]
    fn identical_points_have_zero_distance() {
        assert_eq!(haversine_m(12.2253, 79.0747, 12.2253, 79.0747), 0.0);
        assert_eq!(haversine_m(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(haversine_m(-45.5, 170.2, -45.5, 170.2), 0.0);
    }

    #[test]
    fn known_distance_is_close() {
        // Chennai -> Tiruvannamalai is roughly 161 km as the crow flies.
        let d = haversine_m(13.0827, 80.2707, 12.2253, 79.0747);
        assert!((150_000.0..170_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn at_site_is_allowed() {
        let cfg = config(12.2253, 79.0747, 100.0);
        let decision = validate(
            Location {
                lat: 12.2253,
                lon: 79.0747,
            },
            &cfg,
        );
        assert!(decision.allowed);
        assert!(decision.distance_m < 1e-6);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn outside_radius_is_rejected_with_distance() {
        let cfg = config(12.2253, 79.0747, 50.0);
        // ~0.01 degrees latitude is ~1.1 km
        let decision = validate(
            Location {
                lat: 12.2353,
                lon: 79.0747,
            },
            &cfg,
        );
        assert!(!decision.allowed);
        assert!(decision.distance_m > 1000.0);
        assert!(decision.reason.unwrap().contains("km from site"));
    }

    #[test]
    fn disabled_geofence_rejects_everything() {
        let mut cfg = config(12.2253, 79.0747, 100.0);
        cfg.enabled = false;
        let decision = validate(
            Location {
                lat: 12.2253,
                lon: 79.0747,
            },
            &cfg,
        );
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Location settings not configured by admin")
        );
    }

    #[test]
    fn partially_configured_geofence_rejects() {
        let mut cfg = config(12.2253, 79.0747, 100.0);
        cfg.radius_m = None;
        let decision = validate(
            Location {
                lat: 12.2253,
                lon: 79.0747,
            },
            &cfg,
        );
        assert!(!decision.allowed);
    }
}
