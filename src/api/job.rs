use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::model::job::Job;

pub(crate) async fn fetch_job(pool: &MySqlPool, id: u64) -> anyhow::Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        SELECT id, job_card_number, customer_name, customer_phone,
               device_brand, device_model, reported_issue, estimated_delivery_date,
               total_amount, wa_notified_at, wa_method, wa_error, created_at
        FROM jobs
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

#[derive(Deserialize, ToSchema)]
pub struct CreateJobReq {
    pub job_card_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub device_brand: Option<String>,
    pub device_model: String,
    pub reported_issue: Option<String>,
    #[schema(example = "2025-03-20", value_type = String, format = "date")]
    pub estimated_delivery_date: Option<chrono::NaiveDate>,
    pub total_amount: f64,
}

/// Register a repair job intake (manager or admin)
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = CreateJobReq,
    responses(
        (status = 201, description = "Job created", body = Job),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only"),
        (status = 409, description = "Job card number already exists"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn create_job(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateJobReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    if body.job_card_number.trim().is_empty()
        || body.customer_name.trim().is_empty()
        || body.customer_phone.trim().is_empty()
        || body.device_model.trim().is_empty()
    {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "job_card_number, customer_name, customer_phone and device_model are required"
        })));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO jobs (job_card_number, customer_name, customer_phone,
                          device_brand, device_model, reported_issue,
                          estimated_delivery_date, total_amount, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, NOW())
        "#,
    )
    .bind(body.job_card_number.trim())
    .bind(body.customer_name.trim())
    .bind(body.customer_phone.trim())
    .bind(&body.device_brand)
    .bind(body.device_model.trim())
    .bind(&body.reported_issue)
    .bind(body.estimated_delivery_date)
    .bind(body.total_amount)
    .execute(pool.get_ref())
    .await;

    let job_id = match result {
        Ok(r) => r.last_insert_id(),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(json!({
                        "message": "Job card number already exists"
                    })));
                }
            }
            error!(error = %e, "Failed to create job");
            return Err(actix_web::error::ErrorInternalServerError(
                "Internal Server Error",
            ));
        }
    };

    info!(job_id, job_card = %body.job_card_number, "Job registered");

    match fetch_job(pool.get_ref(), job_id).await {
        Ok(Some(job)) => Ok(HttpResponse::Created().json(job)),
        Ok(None) | Err(_) => Ok(HttpResponse::Created().json(json!({ "id": job_id }))),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateJobReq {
    pub reported_issue: Option<String>,
    #[schema(example = "2025-03-22", value_type = String, format = "date")]
    pub estimated_delivery_date: Option<chrono::NaiveDate>,
    pub total_amount: Option<f64>,
}

/// Update a job's issue, delivery estimate or amount (manager or admin)
#[utoipa::path(
    put,
    path = "/api/v1/jobs/{job_id}",
    params(
        ("job_id", Path, description = "Job ID")
    ),
    request_body = UpdateJobReq,
    responses(
        (status = 200, description = "Job updated", body = Job),
        (status = 404, description = "Job not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager/Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn update_job(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateJobReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let job_id = path.into_inner();

    let exists = fetch_job(pool.get_ref(), job_id)
        .await
        .map_err(|e| {
            error!(error = %e, job_id, "Failed to fetch job");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .is_some();

    if !exists {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Job not found"
        })));
    }

    sqlx::query(
        r#"
        UPDATE jobs
        SET reported_issue = COALESCE(?, reported_issue),
            estimated_delivery_date = COALESCE(?, estimated_delivery_date),
            total_amount = COALESCE(?, total_amount)
        WHERE id = ?
        "#,
    )
    .bind(&body.reported_issue)
    .bind(body.estimated_delivery_date)
    .bind(body.total_amount)
    .bind(job_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, job_id, "Failed to update job");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    info!(job_id, "Job updated");

    match fetch_job(pool.get_ref(), job_id).await {
        Ok(Some(job)) => Ok(HttpResponse::Ok().json(job)),
        Ok(None) | Err(_) => Ok(HttpResponse::Ok().json(json!({ "id": job_id }))),
    }
}

/// Fetch one job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}",
    params(
        ("job_id", Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job", body = Job),
        (status = 404, description = "Job not found"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Jobs"
)]
pub async fn get_job(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let job_id = path.into_inner();

    let job = fetch_job(pool.get_ref(), job_id).await.map_err(|e| {
        error!(error = %e, job_id, "Failed to fetch job");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match job {
        Some(job) => Ok(HttpResponse::Ok().json(job)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Job not found"
        }))),
    }
}
