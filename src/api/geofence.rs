use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::model::geofence::GeofenceConfig;
use crate::utils::geofence_cache;

/// Current geofence configuration
#[utoipa::path(
    get,
    path = "/api/v1/geofence",
    responses(
        (status = 200, description = "Geofence configuration", body = GeofenceConfig),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Geofence"
)]
pub async fn get_geofence(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let config = geofence_cache::get(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to load geofence config");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(config))
}

#[derive(Deserialize, ToSchema)]
pub struct GeofenceUpdateReq {
    pub enabled: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_m: Option<f64>,
}

/// Replace the geofence configuration (admin only)
#[utoipa::path(
    put,
    path = "/api/v1/geofence",
    request_body = GeofenceUpdateReq,
    responses(
        (status = 200, description = "Configuration saved", body = Object, example = json!({
            "message": "Geofence updated"
        })),
        (status = 400, description = "Enabled but incomplete"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Geofence"
)]
pub async fn update_geofence(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<GeofenceUpdateReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    // an enabled geofence must be fully specified
    if body.enabled
        && (body.latitude.is_none() || body.longitude.is_none() || body.radius_m.is_none())
    {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "latitude, longitude and radius_m are required when enabled"
        })));
    }

    if let Some(radius) = body.radius_m {
        if radius <= 0.0 {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "radius_m must be positive"
            })));
        }
    }

    let config = GeofenceConfig {
        enabled: body.enabled,
        latitude: body.latitude,
        longitude: body.longitude,
        radius_m: body.radius_m,
        updated_at: None,
    };

    geofence_cache::set(pool.get_ref(), &config)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to save geofence config");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    info!(
        admin = %auth.username,
        enabled = body.enabled,
        "Geofence configuration updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Geofence updated"
    })))
}
