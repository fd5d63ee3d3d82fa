use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Admin-configured attendance geofence. Single row in the store; read on
/// every punch, mutated only through the admin endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "enabled": true,
        "latitude": 12.2253,
        "longitude": 79.0747,
        "radius_m": 100.0
    })
)]
pub struct GeofenceConfig {
    #[schema(example = true)]
    pub enabled: bool,

    #[schema(example = 12.2253, nullable = true)]
    pub latitude: Option<f64>,

    #[schema(example = 79.0747, nullable = true)]
    pub longitude: Option<f64>,

    /// Allowed radius around the site, in meters.
    #[schema(example = 100.0, nullable = true)]
    pub radius_m: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub updated_at: Option<NaiveDateTime>,
}

impl GeofenceConfig {
    /// A disabled or partially configured geofence rejects everything.
    pub fn is_configured(&self) -> bool {
        self.enabled
            && self.latitude.is_some()
            && self.longitude.is_some()
            && self.radius_m.is_some()
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            latitude: None,
            longitude: None,
            radius_m: None,
            updated_at: None,
        }
    }
}
