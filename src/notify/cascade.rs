use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use strum::Display;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::model::job::Job;
use crate::notify::phone;
use crate::notify::provider::MessagingProvider;

/// Maximum accepted lengths for template body fields; anything longer is
/// truncated before sending rather than rejected.
const MAX_CUSTOMER_NAME: usize = 30;
const MAX_JOB_NUMBER: usize = 20;
const MAX_DEVICE: usize = 30;
const MAX_ISSUE: usize = 30;
const MAX_DATE: usize = 20;

/// Terminal state of one cascade run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, ToSchema)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    TemplateWithDocument,
    TemplateSimpleFallback,
    TextFallback,
    None,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationAttemptResult {
    pub method: DeliveryMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Errors from failed stages, joined in attempt order. Present even on
    /// a degraded success so the audit trail shows why it degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The job fields the intake message carries, already flattened.
#[derive(Debug, Clone)]
pub struct JobIntake {
    pub job_card_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub device_model: String,
    pub issue: String,
    pub estimated_date: String,
    pub total_amount: f64,
}

impl JobIntake {
    pub fn from_job(job: &Job) -> Self {
        let device_model = match &job.device_brand {
            Some(brand) => format!("{} {}", brand, job.device_model).trim().to_string(),
            None => job.device_model.clone(),
        };

        Self {
            job_card_number: job.job_card_number.clone(),
            customer_name: job.customer_name.clone(),
            customer_phone: job.customer_phone.clone(),
            device_model,
            issue: job
                .reported_issue
                .clone()
                .unwrap_or_else(|| "Not specified".to_string()),
            estimated_date: job
                .estimated_delivery_date
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_else(|| "Will inform soon".to_string()),
            total_amount: job.total_amount,
        }
    }

    fn body_component(&self) -> Value {
        json!({
            "type": "body",
            "parameters": [
                { "type": "text", "text": truncate(&self.customer_name, MAX_CUSTOMER_NAME) },
                { "type": "text", "text": truncate(&self.job_card_number, MAX_JOB_NUMBER) },
                { "type": "text", "text": truncate(&self.device_model, MAX_DEVICE) },
                { "type": "text", "text": truncate(&self.issue, MAX_ISSUE) },
                { "type": "text", "text": truncate(&self.estimated_date, MAX_DATE) },
                { "type": "text", "text": format!("{:.2}", self.total_amount) },
            ]
        })
    }

    fn text_message(&self) -> String {
        format!(
            "Hello {},\n\nYour repair job #{} has been registered!\n\nDevice: {}\nIssue: {}\nEst. Delivery: {}\nTotal: \u{20b9}{:.2}\n\nThank you!",
            self.customer_name,
            self.job_card_number,
            self.device_model,
            self.issue,
            self.estimated_date,
            self.total_amount,
        )
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Ordered fallback stages. Strictly one-directional, one attempt each —
/// the cascade degrades, it does not retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    RichTemplate,
    SimpleTemplate,
    PlainText,
    Failed,
}

/// Run the delivery cascade for one job intake.
///
/// RichTemplate (pdf upload + document-header template) is attempted only
/// when PDF bytes are supplied; the stages after it are identical either
/// way. The caller persists the returned result exactly once.
pub async fn dispatch<P: MessagingProvider>(
    provider: &P,
    template_name: &str,
    intake: &JobIntake,
    pdf: Option<&[u8]>,
) -> NotificationAttemptResult {
    let Some(to) = phone::normalize(&intake.customer_phone) else {
        return NotificationAttemptResult {
            method: DeliveryMethod::None,
            message_id: None,
            error: Some("Invalid customer phone number".to_string()),
        };
    };

    let mut errors: Vec<String> = Vec::new();
    let mut stage = if pdf.is_some() {
        Stage::RichTemplate
    } else {
        Stage::SimpleTemplate
    };

    loop {
        match stage {
            Stage::RichTemplate => {
                let pdf = pdf.unwrap_or_default();
                let filename = format!("Job_Bill_{}.pdf", intake.job_card_number);

                let attempt = async {
                    let media_id = provider
                        .upload_media(pdf, "application/pdf", &filename)
                        .await?;
                    let components = json!([
                        {
                            "type": "header",
                            "parameters": [
                                { "type": "document", "document": { "id": media_id, "filename": filename } }
                            ]
                        },
                        intake.body_component(),
                    ]);
                    provider.send_template(&to, template_name, components).await
                };

                match attempt.await {
                    Ok(message_id) => {
                        info!(job = %intake.job_card_number, "Template with document sent");
                        return NotificationAttemptResult {
                            method: DeliveryMethod::TemplateWithDocument,
                            message_id: Some(message_id),
                            error: combined(&errors),
                        };
                    }
                    Err(e) => {
                        warn!(job = %intake.job_card_number, error = %e, "Rich template failed, degrading");
                        errors.push(e.to_string());
                        stage = Stage::SimpleTemplate;
                    }
                }
            }

            Stage::SimpleTemplate => {
                let components = json!([intake.body_component()]);
                match provider.send_template(&to, template_name, components).await {
                    Ok(message_id) => {
                        info!(job = %intake.job_card_number, "Simple template fallback sent");
                        return NotificationAttemptResult {
                            method: DeliveryMethod::TemplateSimpleFallback,
                            message_id: Some(message_id),
                            error: combined(&errors),
                        };
                    }
                    Err(e) => {
                        warn!(job = %intake.job_card_number, error = %e, "Simple template failed, degrading");
                        errors.push(format!("Fallback: {e}"));
                        stage = Stage::PlainText;
                    }
                }
            }

            Stage::PlainText => {
                match provider.send_text(&to, &intake.text_message()).await {
                    Ok(message_id) => {
                        info!(job = %intake.job_card_number, "Text fallback sent");
                        return NotificationAttemptResult {
                            method: DeliveryMethod::TextFallback,
                            message_id: Some(message_id),
                            error: combined(&errors),
                        };
                    }
                    Err(e) => {
                        errors.push(format!("Text: {e}"));
                        stage = Stage::Failed;
                    }
                }
            }

            Stage::Failed => {
                warn!(job = %intake.job_card_number, "All delivery attempts failed");
                return NotificationAttemptResult {
                    method: DeliveryMethod::None,
                    message_id: None,
                    error: combined(&errors),
                };
            }
        }
    }
}

fn combined(errors: &[String]) -> Option<String> {
    if errors.is_empty() {
        None
    } else {
        Some(errors.join(" | "))
    }
}

/// Where terminal cascade states are persisted. One call per invocation,
/// success or not; a notification failure never invalidates the job.
pub trait NotificationLog {
    async fn record(
        &self,
        job_id: u64,
        result: &NotificationAttemptResult,
        at: NaiveDateTime,
    ) -> Result<()>;
}

pub struct MySqlNotificationLog<'a> {
    pool: &'a MySqlPool,
}

impl<'a> MySqlNotificationLog<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }
}

impl NotificationLog for MySqlNotificationLog<'_> {
    async fn record(
        &self,
        job_id: u64,
        result: &NotificationAttemptResult,
        at: NaiveDateTime,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET wa_notified_at = ?, wa_method = ?, wa_error = ?
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(result.method.to_string())
        .bind(&result.error)
        .bind(job_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

/// Dispatch and persist the outcome in one step.
pub async fn notify_job_intake<P: MessagingProvider, L: NotificationLog>(
    provider: &P,
    log: &L,
    template_name: &str,
    job_id: u64,
    intake: &JobIntake,
    pdf: Option<&[u8]>,
    now: NaiveDateTime,
) -> Result<NotificationAttemptResult> {
    let result = dispatch(provider, template_name, intake, pdf).await;
    log.record(job_id, &result, now).await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::provider::ProviderError;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubProvider {
        fail_upload: bool,
        fail_template: bool,
        fail_text: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MessagingProvider for StubProvider {
        async fn upload_media(
            &self,
            _bytes: &[u8],
            _mime_type: &str,
            _filename: &str,
        ) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push("upload");
            if self.fail_upload {
                Err(ProviderError::Upload("media rejected".to_string()))
            } else {
                Ok("media-1".to_string())
            }
        }

        async fn send_template(
            &self,
            _to: &str,
            _template_name: &str,
            _components: Value,
        ) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push("template");
            if self.fail_template {
                Err(ProviderError::Template("template rejected".to_string()))
            } else {
                Ok("wamid.1".to_string())
            }
        }

        async fn send_text(&self, _to: &str, _body: &str) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push("text");
            if self.fail_text {
                Err(ProviderError::Text("text rejected".to_string()))
            } else {
                Ok("wamid.2".to_string())
            }
        }
    }

    #[derive(Default)]
    struct CountingLog {
        records: Mutex<Vec<(u64, DeliveryMethod)>>,
    }

    impl NotificationLog for CountingLog {
        async fn record(
            &self,
            job_id: u64,
            result: &NotificationAttemptResult,
            _at: NaiveDateTime,
        ) -> Result<()> {
            self.records.lock().unwrap().push((job_id, result.method));
            Ok(())
        }
    }

    fn intake() -> JobIntake {
        JobIntake {
            job_card_number: "JC-0007".to_string(),
            customer_name: "Priya S".to_string(),
            customer_phone: "9443019097".to_string(),
            device_model: "Samsung Galaxy A52".to_string(),
            issue: "Broken display".to_string(),
            estimated_date: "20/03/2025".to_string(),
            total_amount: 4500.0,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[actix_web::test]
    async fn full_path_delivers_rich_template() {
        let provider = StubProvider::default();
        let result = dispatch(&provider, "job_intake", &intake(), Some(b"%PDF")).await;

        assert_eq!(result.method, DeliveryMethod::TemplateWithDocument);
        assert!(result.error.is_none());
        assert_eq!(*provider.calls.lock().unwrap(), vec!["upload", "template"]);
    }

    #[actix_web::test]
    async fn upload_failure_degrades_to_simple_template() {
        let provider = StubProvider {
            fail_upload: true,
            ..Default::default()
        };
        let result = dispatch(&provider, "job_intake", &intake(), Some(b"%PDF")).await;

        assert_eq!(result.method, DeliveryMethod::TemplateSimpleFallback);
        assert!(result.error.unwrap().contains("media rejected"));
        // one upload attempt, then exactly one template send
        assert_eq!(*provider.calls.lock().unwrap(), vec!["upload", "template"]);
    }

    #[actix_web::test]
    async fn template_failures_degrade_to_text() {
        let provider = StubProvider {
            fail_upload: true,
            fail_template: true,
            ..Default::default()
        };
        let result = dispatch(&provider, "job_intake", &intake(), Some(b"%PDF")).await;

        assert_eq!(result.method, DeliveryMethod::TextFallback);
        let error = result.error.unwrap();
        assert!(error.contains("media rejected"));
        assert!(error.contains("Fallback:"));
    }

    #[actix_web::test]
    async fn total_failure_is_none_with_combined_errors() {
        let provider = StubProvider {
            fail_upload: true,
            fail_template: true,
            fail_text: true,
            calls: Mutex::new(Vec::new()),
        };
        let result = dispatch(&provider, "job_intake", &intake(), Some(b"%PDF")).await;

        assert_eq!(result.method, DeliveryMethod::None);
        let error = result.error.unwrap();
        assert!(!error.is_empty());
        assert!(error.contains("Upload failed"));
        assert!(error.contains("Template send failed"));
        assert!(error.contains("Text send failed"));
        // no stage attempted twice
        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec!["upload", "template", "text"]
        );
    }

    #[actix_web::test]
    async fn missing_pdf_starts_at_simple_template() {
        let provider = StubProvider::default();
        let result = dispatch(&provider, "job_intake", &intake(), None).await;

        assert_eq!(result.method, DeliveryMethod::TemplateSimpleFallback);
        assert!(result.error.is_none());
        assert_eq!(*provider.calls.lock().unwrap(), vec!["template"]);
    }

    #[actix_web::test]
    async fn result_is_persisted_exactly_once() {
        let provider = StubProvider {
            fail_upload: true,
            fail_template: true,
            fail_text: true,
            calls: Mutex::new(Vec::new()),
        };
        let log = CountingLog::default();

        notify_job_intake(&provider, &log, "job_intake", 7, &intake(), Some(b"%PDF"), now())
            .await
            .unwrap();

        let records = log.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], (7, DeliveryMethod::None));
    }

    #[actix_web::test]
    async fn invalid_phone_short_circuits() {
        let provider = StubProvider::default();
        let mut bad = intake();
        bad.customer_phone = "n/a".to_string();

        let result = dispatch(&provider, "job_intake", &bad, None).await;
        assert_eq!(result.method, DeliveryMethod::None);
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn body_fields_are_truncated() {
        let mut long = intake();
        long.customer_name = "x".repeat(100);
        long.device_model = "y".repeat(100);

        let component = long.body_component();
        let params = component["parameters"].as_array().unwrap();
        assert_eq!(params[0]["text"].as_str().unwrap().len(), MAX_CUSTOMER_NAME);
        assert_eq!(params[2]["text"].as_str().unwrap().len(), MAX_DEVICE);
    }

    #[test]
    fn delivery_method_serializes_snake_case() {
        assert_eq!(
            DeliveryMethod::TemplateWithDocument.to_string(),
            "template_with_document"
        );
        assert_eq!(
            DeliveryMethod::TemplateSimpleFallback.to_string(),
            "template_simple_fallback"
        );
        assert_eq!(DeliveryMethod::TextFallback.to_string(), "text_fallback");
        assert_eq!(DeliveryMethod::None.to_string(), "none");
    }
}
