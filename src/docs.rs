use crate::api::attendance::{FacePayload, PunchReq, ValidateLocationReq};
use crate::api::geofence::GeofenceUpdateReq;
use crate::api::job::{CreateJobReq, UpdateJobReq};
use crate::api::worker::{AssignRfidReq, CreateWorkerReq, EnrollDescriptorReq};
use crate::attendance::biometric::{DetectionBox, FrameSize};
use crate::attendance::geofence::LocationFailure;
use crate::model::attendance::{AttendanceRecord, PunchMethod};
use crate::model::geofence::GeofenceConfig;
use crate::model::job::Job;
use crate::model::worker::Worker;
use crate::notify::cascade::{DeliveryMethod, NotificationAttemptResult};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Repair Shop Management API",
        version = "1.0.0",
        description = r#"
## Repair Shop Management System

This API powers the back office of a device repair shop.

### 🔹 Key Features
- **Worker Attendance**
  - Face and RFID punches with geofence validation and a per-worker cooldown
- **Geofence Administration**
  - Admin-configured site location and radius, enforced server-side
- **Job Intake**
  - Job card registration with customer and device details
- **WhatsApp Notifications**
  - Intake confirmation with a degrading delivery cascade (document template, simple template, plain text)

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Administrative operations require the **Admin** or **Manager** role.

### 📦 Response Format
- JSON-based RESTful responses

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::validate_location,
        crate::api::attendance::punch,
        crate::api::attendance::attendance_history,

        crate::api::geofence::get_geofence,
        crate::api::geofence::update_geofence,

        crate::api::worker::create_worker,
        crate::api::worker::get_worker,
        crate::api::worker::enroll_descriptor,
        crate::api::worker::assign_rfid,

        crate::api::job::create_job,
        crate::api::job::get_job,
        crate::api::job::update_job,
        crate::api::notify::notify_job
    ),
    components(
        schemas(
            ValidateLocationReq,
            PunchReq,
            FacePayload,
            DetectionBox,
            FrameSize,
            PunchMethod,
            AttendanceRecord,
            LocationFailure,
            GeofenceConfig,
            GeofenceUpdateReq,
            Worker,
            CreateWorkerReq,
            EnrollDescriptorReq,
            AssignRfidReq,
            Job,
            CreateJobReq,
            UpdateJobReq,
            DeliveryMethod,
            NotificationAttemptResult
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Worker attendance APIs"),
        (name = "Geofence", description = "Geofence administration APIs"),
        (name = "Workers", description = "Worker management APIs"),
        (name = "Jobs", description = "Job intake and notification APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
