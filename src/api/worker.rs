use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::model::worker::Worker;
use crate::utils::rfid_filter;

const DESCRIPTOR_LEN: usize = 128;

async fn fetch_worker(pool: &MySqlPool, id: u64) -> anyhow::Result<Option<Worker>> {
    let worker = sqlx::query_as::<_, Worker>(
        r#"
        SELECT id, name, department, rfid_tag, last_punch_at, status
        FROM workers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(worker)
}

#[derive(Deserialize, ToSchema)]
pub struct CreateWorkerReq {
    pub name: String,
    pub department: Option<String>,
    pub rfid_tag: Option<String>,
}

/// Register a worker (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/workers",
    request_body = CreateWorkerReq,
    responses(
        (status = 201, description = "Worker created", body = Worker),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "RFID tag already assigned"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn create_worker(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateWorkerReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let name = body.name.trim();
    if name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Worker name must not be empty"
        })));
    }

    // store the canonical form so scans match the row byte-for-byte
    let rfid_tag = body.rfid_tag.as_deref().map(rfid_filter::canonical);

    let result = sqlx::query(
        r#"
        INSERT INTO workers (name, department, rfid_tag, status)
        VALUES (?, ?, ?, 'active')
        "#,
    )
    .bind(name)
    .bind(&body.department)
    .bind(&rfid_tag)
    .execute(pool.get_ref())
    .await;

    let worker_id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(json!({
                        "message": "RFID tag already assigned to another worker"
                    })));
                }
            }
            error!(error = %e, "Failed to create worker");
            return Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ));
        }
    };

    if let Some(tag) = &rfid_tag {
        rfid_filter::insert(tag);
    }

    info!(worker_id, name, "Worker registered");

    match fetch_worker(pool.get_ref(), worker_id).await {
        Ok(Some(worker)) => Ok(HttpResponse::Created().json(worker)),
        Ok(None) | Err(_) => Ok(HttpResponse::Created().json(json!({ "id": worker_id }))),
    }
}

/// Fetch one worker
#[utoipa::path(
    get,
    path = "/api/v1/workers/{worker_id}",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    responses(
        (status = 200, description = "Worker", body = Worker),
        (status = 404, description = "Worker not found"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn get_worker(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let worker_id = path.into_inner();

    let worker = fetch_worker(pool.get_ref(), worker_id).await.map_err(|e| {
        error!(error = %e, worker_id, "Failed to fetch worker");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match worker {
        Some(worker) => Ok(HttpResponse::Ok().json(worker)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Worker not found"
        }))),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct EnrollDescriptorReq {
    /// Fixed-length face descriptor captured during enrollment
    pub descriptor: Vec<f32>,
}

/// Enroll a face descriptor for a worker (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/workers/{worker_id}/descriptors",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    request_body = EnrollDescriptorReq,
    responses(
        (status = 201, description = "Descriptor enrolled"),
        (status = 400, description = "Wrong descriptor length"),
        (status = 404, description = "Worker not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn enroll_descriptor(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<EnrollDescriptorReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let worker_id = path.into_inner();

    if body.descriptor.len() != DESCRIPTOR_LEN {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": format!("Descriptor must have {DESCRIPTOR_LEN} elements")
        })));
    }

    let exists = fetch_worker(pool.get_ref(), worker_id)
        .await
        .map_err(|e| {
            error!(error = %e, worker_id, "Failed to fetch worker");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .is_some();

    if !exists {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Worker not found"
        })));
    }

    let encoded = serde_json::to_string(&body.descriptor).map_err(|e| {
        error!(error = %e, "Failed to encode descriptor");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    sqlx::query("INSERT INTO worker_descriptors (worker_id, descriptor) VALUES (?, ?)")
        .bind(worker_id)
        .bind(encoded)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, worker_id, "Failed to store descriptor");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    info!(worker_id, "Face descriptor enrolled");

    Ok(HttpResponse::Created().json(json!({
        "message": "Descriptor enrolled"
    })))
}

#[derive(Deserialize, ToSchema)]
pub struct AssignRfidReq {
    /// New tag, or null to unassign the current one
    pub rfid_tag: Option<String>,
}

/// Assign or clear a worker's RFID tag (admin only)
#[utoipa::path(
    put,
    path = "/api/v1/workers/{worker_id}/rfid",
    params(
        ("worker_id", Path, description = "Worker ID")
    ),
    request_body = AssignRfidReq,
    responses(
        (status = 200, description = "Tag updated"),
        (status = 404, description = "Worker not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "RFID tag already assigned"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Workers"
)]
pub async fn assign_rfid(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<AssignRfidReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let worker_id = path.into_inner();

    let worker = fetch_worker(pool.get_ref(), worker_id).await.map_err(|e| {
        error!(error = %e, worker_id, "Failed to fetch worker");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(worker) = worker else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Worker not found"
        })));
    };

    let rfid_tag = body.rfid_tag.as_deref().map(rfid_filter::canonical);

    let result = sqlx::query("UPDATE workers SET rfid_tag = ? WHERE id = ?")
        .bind(&rfid_tag)
        .bind(worker_id)
        .execute(pool.get_ref())
        .await;

    if let Err(e) = result {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23000") {
                return Ok(HttpResponse::Conflict().json(json!({
                    "message": "RFID tag already assigned to another worker"
                })));
            }
        }
        error!(error = %e, worker_id, "Failed to update RFID tag");
        return Err(actix_web::error::ErrorInternalServerError(
            "Internal Server Error",
        ));
    }

    // keep the fast-negative filter in step with the column
    if let Some(old) = &worker.rfid_tag {
        rfid_filter::remove(old);
    }
    if let Some(new) = &rfid_tag {
        rfid_filter::insert(new);
    }

    info!(worker_id, "RFID tag updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "RFID tag updated"
    })))
}
