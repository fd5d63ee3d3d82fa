use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};

use crate::api::job::fetch_job;
use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::notify::cascade::{self, DeliveryMethod, JobIntake, MySqlNotificationLog};
use crate::notify::whatsapp::WhatsAppClient;

/// Send (or resend) the WhatsApp intake notification for a job.
///
/// The request body is the job bill PDF, raw bytes; an empty body skips the
/// document-header stage and starts at the simple template.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{job_id}/notify",
    params(
        ("job_id", Path, description = "Job ID")
    ),
    request_body(content = Vec<u8>, content_type = "application/pdf", description = "Job bill PDF (optional)"),
    responses(
        (status = 200, description = "Cascade outcome", body = Object, example = json!({
            "success": true,
            "method": "template_with_document",
            "message_id": "wamid.XXX"
        })),
        (status = 404, description = "Job not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn notify_job(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let job_id = path.into_inner();

    let job = fetch_job(pool.get_ref(), job_id).await.map_err(|e| {
        error!(error = %e, job_id, "Failed to fetch job");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(job) = job else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Job not found"
        })));
    };

    // absent credentials disable sending, they never fail the request
    let Some(client) = WhatsAppClient::from_config(&config) else {
        info!(job_id, "WhatsApp not configured, skipping notification");
        return Ok(HttpResponse::Ok().json(json!({
            "success": false,
            "method": DeliveryMethod::None,
            "error": "WhatsApp API not configured"
        })));
    };

    let intake = JobIntake::from_job(&job);
    let pdf = (!body.is_empty()).then(|| body.as_ref());
    let log = MySqlNotificationLog::new(pool.get_ref());

    let result = cascade::notify_job_intake(
        &client,
        &log,
        &client.template_name,
        job_id,
        &intake,
        pdf,
        Utc::now().naive_utc(),
    )
    .await
    .map_err(|e| {
        error!(error = %e, job_id, "Failed to persist notification outcome");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "success": result.method != DeliveryMethod::None,
        "method": result.method,
        "message_id": result.message_id,
        "error": result.error,
    })))
}
