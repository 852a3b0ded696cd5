use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("WhatsApp API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("WhatsApp API returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Messaging collaborator. The engine only ever needs to push a session
/// message to a number; everything else the gateway offers (templates,
/// media, contact sync) is out of scope here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WhatsAppGateway: Send + Sync {
    async fn send_session_message(
        &self,
        tenant_id: Uuid,
        to: &str,
        body: &str,
    ) -> Result<(), GatewayError>;
}

/// Client for the third-party WhatsApp Business API gateway.
pub struct HttpWhatsAppGateway {
    pub client: Arc<Client>,
    pub base_url: String,
    pub api_key: String,
}

#[async_trait]
impl WhatsAppGateway for HttpWhatsAppGateway {
    async fn send_session_message(
        &self,
        tenant_id: Uuid,
        to: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/{}/api/v1/sendSessionMessage/{}", self.base_url, tenant_id, to);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&json!({ "message": body }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(%tenant_id, status, "WhatsApp API error");
            return Err(GatewayError::Api { status, message });
        }
        Ok(())
    }
}
