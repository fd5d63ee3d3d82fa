use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Ravi Kumar",
        "department": "Repairs",
        "rfid_tag": "04A22F19",
        "status": "active"
    })
)]
pub struct Worker {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Ravi Kumar")]
    pub name: String,

    #[schema(example = "Repairs")]
    pub department: Option<String>,

    /// Set once the worker's card is enrolled; unique across workers.
    #[schema(example = "04A22F19", nullable = true)]
    pub rfid_tag: Option<String>,

    /// Timestamp of the last accepted punch. Written only through the
    /// conditional update that enforces the cooldown.
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub last_punch_at: Option<NaiveDateTime>,

    #[schema(example = "active")]
    pub status: String,
}
