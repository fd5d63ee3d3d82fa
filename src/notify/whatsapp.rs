use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::notify::provider::{MessagingProvider, ProviderError};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPLATE_TIMEOUT: Duration = Duration::from_secs(15);
const TEXT_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider hard limit on a document upload.
const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Provider cap on a text message body.
const MAX_TEXT_LEN: usize = 4096;

/// WhatsApp Cloud API client. Every call carries an explicit timeout; a
/// timeout is a failure of that step, never a silent success.
pub struct WhatsAppClient {
    http: reqwest::Client,
    access_token: String,
    messages_url: String,
    media_url: String,
    pub template_name: String,
}

impl WhatsAppClient {
    /// None when credentials are absent; callers then skip sending and
    /// report "not configured" instead of failing job creation.
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.wa_access_token.is_empty() || config.wa_phone_number_id.is_empty() {
            return None;
        }

        let base = format!(
            "https://graph.facebook.com/{}/{}",
            config.wa_api_version, config.wa_phone_number_id
        );

        Some(Self {
            http: reqwest::Client::new(),
            access_token: config.wa_access_token.clone(),
            messages_url: format!("{base}/messages"),
            media_url: format!("{base}/media"),
            template_name: config.wa_template_name.clone(),
        })
    }

    /// Pull the human-readable error out of a Graph error body, falling
    /// back to the raw body.
    fn extract_error(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<Value>(body) {
            Ok(v) => {
                let message = v["error"]["message"].as_str().unwrap_or(body);
                match v["error"]["code"].as_i64() {
                    Some(code) => format!("{message} (Code: {code})"),
                    None => format!("{message} (HTTP {status})"),
                }
            }
            Err(_) => format!("HTTP {status}: {body}"),
        }
    }

    async fn post_message(&self, payload: Value, timeout: Duration) -> Result<String, String> {
        debug!(url = %self.messages_url, "Posting message payload");

        let response = self
            .http
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(Self::extract_error(status, &body));
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| e.to_string())?;
        value["messages"][0]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "Provider did not return a message id".to_string())
    }
}

impl MessagingProvider for WhatsAppClient {
    async fn upload_media(
        &self,
        bytes: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<String, ProviderError> {
        if bytes.is_empty() {
            return Err(ProviderError::Upload("File buffer is empty".to_string()));
        }

        if bytes.len() > MAX_DOCUMENT_BYTES {
            return Err(ProviderError::Upload(format!(
                "File too large: {:.2}MB (max: {:.2}MB)",
                bytes.len() as f64 / 1024.0 / 1024.0,
                MAX_DOCUMENT_BYTES as f64 / 1024.0 / 1024.0
            )));
        }

        info!(
            filename,
            size_kb = bytes.len() / 1024,
            mime_type,
            "Uploading media"
        );

        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| ProviderError::Upload(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string());

        let response = self
            .http
            .post(&self.media_url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::Upload(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Upload(e.to_string()))?;

        if !status.is_success() {
            let reason = Self::extract_error(status, &body);
            error!(%reason, "Media upload failed");
            return Err(ProviderError::Upload(reason));
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| ProviderError::Upload(e.to_string()))?;
        value["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Upload("Provider did not return a media id".to_string()))
    }

    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        components: Value,
    ) -> Result<String, ProviderError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "template",
            "template": {
                "name": template_name,
                "language": { "code": "en" },
                "components": components,
            }
        });

        self.post_message(payload, TEMPLATE_TIMEOUT)
            .await
            .map_err(ProviderError::Template)
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<String, ProviderError> {
        let truncated: String = body.chars().take(MAX_TEXT_LEN).collect();

        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": truncated,
            }
        });

        self.post_message(payload, TEXT_TIMEOUT)
            .await
            .map_err(ProviderError::Text)
    }
}
