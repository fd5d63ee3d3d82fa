use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A repair job as taken in at the counter. WhatsApp bookkeeping columns
/// record which delivery path (if any) succeeded for the intake message.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "job_card_number": "JC-0007",
        "customer_name": "Priya S",
        "customer_phone": "9443019097",
        "device_brand": "Samsung",
        "device_model": "Galaxy A52",
        "reported_issue": "Broken display",
        "estimated_delivery_date": "2025-03-20",
        "total_amount": 4500.0,
        "wa_method": "template_with_document"
    })
)]
pub struct Job {
    #[schema(example = 7)]
    pub id: u64,

    #[schema(example = "JC-0007")]
    pub job_card_number: String,

    #[schema(example = "Priya S")]
    pub customer_name: String,

    #[schema(example = "9443019097")]
    pub customer_phone: String,

    #[schema(example = "Samsung", nullable = true)]
    pub device_brand: Option<String>,

    #[schema(example = "Galaxy A52")]
    pub device_model: String,

    #[schema(example = "Broken display", nullable = true)]
    pub reported_issue: Option<String>,

    #[schema(example = "2025-03-20", value_type = String, format = "date", nullable = true)]
    pub estimated_delivery_date: Option<NaiveDate>,

    #[schema(example = 4500.0)]
    pub total_amount: f64,

    /// When the intake notification last completed (success or exhaustion).
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub wa_notified_at: Option<NaiveDateTime>,

    /// Terminal delivery method of the last cascade run.
    #[schema(example = "template_with_document", nullable = true)]
    pub wa_method: Option<String>,

    /// Concatenated stage errors when delivery degraded or failed.
    #[schema(nullable = true)]
    pub wa_error: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
