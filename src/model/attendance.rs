use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// How a punch was submitted. A record's check-in and check-out may carry
/// different methods (face in, RFID out is fine).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PunchMethod {
    Face,
    Rfid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 42,
        "worker_id": 1,
        "date": "2025-03-14",
        "check_in": "2025-03-14T09:01:12",
        "check_out": "2025-03-14T18:30:44",
        "check_in_method": "face",
        "check_out_method": "rfid"
    })
)]
pub struct AttendanceRecord {
    #[schema(example = 42)]
    pub id: u64,

    #[schema(example = 1)]
    pub worker_id: u64,

    #[schema(example = "2025-03-14", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub check_in: Option<NaiveDateTime>,

    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub check_out: Option<NaiveDateTime>,

    pub check_in_method: Option<String>,
    pub check_out_method: Option<String>,
}

impl AttendanceRecord {
    /// True while check-in is set and check-out is not.
    pub fn is_open(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_none()
    }

    /// Worked seconds for a closed record; zero until closed.
    pub fn duration_seconds(&self) -> i64 {
        match (self.check_in, self.check_out) {
            (Some(i), Some(o)) => (o - i).num_seconds().max(0),
            _ => 0,
        }
    }
}
