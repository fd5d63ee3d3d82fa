use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::attendance::biometric::{self, DetectionBox, FrameSize, MatchDecision};
use crate::attendance::geofence::{self, Location, LocationFailure};
use crate::attendance::history;
use crate::attendance::recorder::{self, PunchAction, PunchError, WorkerLookup};
use crate::attendance::store::{AttendanceStore, MySqlAttendanceStore};
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::PunchMethod;
use crate::utils::{geofence_cache, rfid_filter};

#[derive(Deserialize, ToSchema)]
pub struct ValidateLocationReq {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Set instead of coordinates when the browser could not produce them.
    pub error_code: Option<LocationFailure>,
}

/// Check whether the caller's current position permits attendance actions
#[utoipa::path(
    post,
    path = "/api/v1/attendance/validate-location",
    request_body = ValidateLocationReq,
    responses(
        (status = 200, description = "Validation outcome", body = Object, example = json!({
            "allowed": true,
            "distance_km": 0.05
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn validate_location(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<ValidateLocationReq>,
) -> actix_web::Result<impl Responder> {
    // geolocation failed on the device; nothing to compute server-side
    if let Some(code) = body.error_code {
        return Ok(HttpResponse::Ok().json(json!({
            "allowed": false,
            "reason": code.message(),
        })));
    }

    let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Either coordinates or an error_code are required"
        })));
    };

    let config = geofence_cache::get(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to load geofence config");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let decision = geofence::validate(Location { lat, lon }, &config);

    Ok(HttpResponse::Ok().json(json!({
        "allowed": decision.allowed,
        "distance_km": decision.distance_km(),
        "reason": decision.reason,
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct FacePayload {
    /// Candidate descriptor from the capture frame
    pub descriptor: Vec<f32>,
    #[serde(rename = "box")]
    pub detection_box: DetectionBox,
    pub frame: FrameSize,
}

#[derive(Deserialize, ToSchema)]
pub struct PunchReq {
    pub method: PunchMethod,
    /// Required for face punches
    pub worker_id: Option<u64>,
    /// Required for RFID punches
    pub rfid_tag: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub face: Option<FacePayload>,
}

/// Record a punch (check-in or check-out) via face or RFID
#[utoipa::path(
    post,
    path = "/api/v1/attendance/punch",
    request_body = PunchReq,
    responses(
        (status = 200, description = "Punch recorded", body = Object, example = json!({
            "message": "Checked in successfully",
            "worker_name": "Ravi Kumar"
        })),
        (status = 403, description = "Outside the geofence", body = Object, example = json!({
            "code": "LOCATION_INVALID",
            "distance_km": 1.24
        })),
        (status = 404, description = "Worker not found"),
        (status = 422, description = "Face rejected", body = Object, example = json!({
            "code": "FACE_NOT_RECOGNIZED"
        })),
        (status = 429, description = "Cooldown active", body = Object, example = json!({
            "code": "COOLDOWN_ACTIVE",
            "remaining_seconds": 42
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn punch(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<PunchReq>,
) -> actix_web::Result<impl Responder> {
    let store = MySqlAttendanceStore::new(pool.get_ref());

    let canonical_tag;
    let lookup = match body.method {
        PunchMethod::Face => {
            let Some(worker_id) = body.worker_id else {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": "worker_id is required for face punches"
                })));
            };

            let Some(face) = &body.face else {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": "face payload is required for face punches"
                })));
            };

            let descriptors = store.descriptors_for_worker(worker_id).await.map_err(|e| {
                error!(error = %e, worker_id, "Failed to load descriptors");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;
            let enrolled: Vec<(u64, Vec<f32>)> =
                descriptors.into_iter().map(|d| (worker_id, d)).collect();

            match biometric::evaluate(&face.descriptor, &face.detection_box, &face.frame, &enrolled)
            {
                MatchDecision::Accepted => {}
                MatchDecision::NotEnrolled => {
                    return Ok(HttpResponse::UnprocessableEntity().json(json!({
                        "code": "NO_FACE_DETECTED",
                        "message": "No enrolled face data for this worker"
                    })));
                }
                MatchDecision::OutOfFrame => {
                    return Ok(HttpResponse::UnprocessableEntity().json(json!({
                        "code": "FACE_OUT_OF_FRAME",
                        "message": "Please position your face within the circular frame."
                    })));
                }
                MatchDecision::NotRecognized => {
                    return Ok(HttpResponse::UnprocessableEntity().json(json!({
                        "code": "FACE_NOT_RECOGNIZED",
                        "message": "Face not recognized. Please try again."
                    })));
                }
            }

            WorkerLookup::Id(worker_id)
        }

        PunchMethod::Rfid => {
            let Some(raw_tag) = body.rfid_tag.as_deref() else {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": "rfid_tag is required for RFID punches"
                })));
            };

            // canonical form matches what enrollment stored
            canonical_tag = rfid_filter::canonical(raw_tag);

            // fast negative: a never-enrolled tag skips the DB lookup
            if !rfid_filter::might_exist(&canonical_tag) {
                warn!(tag = %canonical_tag, "Scan of unenrolled RFID tag");
                return Ok(HttpResponse::NotFound().json(json!({
                    "code": "WORKER_NOT_FOUND",
                    "message": "Worker not found"
                })));
            }

            WorkerLookup::RfidTag(&canonical_tag)
        }
    };

    let geofence_config = geofence_cache::get(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to load geofence config");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let outcome = recorder::record_punch(
        &store,
        lookup,
        Location {
            lat: body.lat,
            lon: body.lon,
        },
        &geofence_config,
        Utc::now().naive_utc(),
        body.method,
        config.punch_cooldown_seconds,
    )
    .await;

    match outcome {
        Ok(outcome) => {
            let message = match outcome.action {
                PunchAction::CheckedIn => "Checked in successfully",
                PunchAction::CheckedOut => "Checked out successfully",
            };
            Ok(HttpResponse::Ok().json(json!({
                "message": message,
                "worker_name": outcome.worker.name,
                "record": outcome.record,
            })))
        }

        Err(PunchError::WorkerNotFound) => Ok(HttpResponse::NotFound().json(json!({
            "code": "WORKER_NOT_FOUND",
            "message": "Worker not found"
        }))),

        Err(PunchError::LocationInvalid {
            distance_km,
            reason,
        }) => Ok(HttpResponse::Forbidden().json(json!({
            "code": "LOCATION_INVALID",
            "message": reason,
            "distance_km": distance_km,
        }))),

        Err(PunchError::CooldownActive { remaining_seconds }) => {
            Ok(HttpResponse::TooManyRequests().json(json!({
                "code": "COOLDOWN_ACTIVE",
                "message": format!("Please wait {remaining_seconds}s before punching again"),
                "remaining_seconds": remaining_seconds,
            })))
        }

        Err(PunchError::Storage(e)) => {
            error!(error = %e, "Punch failed");
            Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ))
        }
    }
}

/// Attendance history for a worker, grouped by day
#[utoipa::path(
    get,
    path = "/api/v1/workers/{worker_id}/attendance",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Per-day history, newest first", body = Object),
        (status = 404, description = "Worker not found"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_history(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let worker_id = path.into_inner();
    let store = MySqlAttendanceStore::new(pool.get_ref());

    if store
        .worker_by_id(worker_id)
        .await
        .map_err(|e| {
            error!(error = %e, worker_id, "Failed to fetch worker");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .is_none()
    {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Worker not found"
        })));
    }

    let records = store.records_for_worker(worker_id).await.map_err(|e| {
        error!(error = %e, worker_id, "Failed to fetch attendance records");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(history::summarize(records)))
}
