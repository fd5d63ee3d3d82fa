use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Template send failed: {0}")]
    Template(String),

    #[error("Text send failed: {0}")]
    Text(String),
}

/// The messaging provider boundary: upload a file for a media handle, send
/// a structured template, send plain text. The WhatsApp client is the
/// production implementation; cascade tests drive scripted stubs.
pub trait MessagingProvider {
    /// Returns the provider's media id for the uploaded bytes.
    async fn upload_media(
        &self,
        bytes: &[u8],
        mime_type: &str,
        filename: &str,
    ) -> Result<String, ProviderError>;

    /// Sends a named template; `components` is the provider's component
    /// payload. Returns the provider message id.
    async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        components: serde_json::Value,
    ) -> Result<String, ProviderError>;

    /// Sends a free-text message. Returns the provider message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<String, ProviderError>;
}
