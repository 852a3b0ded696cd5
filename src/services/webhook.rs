use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::webhook_log_repository::{NewWebhookLog, WebhookLogRepository};
use crate::models::webhook_log::{WebhookLog, WebhookStatus};

type HmacSha256 = Hmac<Sha256>;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);
const BACKOFF_CAP_MS: u64 = 300_000;

// Scaled down under test so spawned retry timers fire within milliseconds.
#[cfg(test)]
const BACKOFF_SLEEP_DIVISOR: u64 = 1_000;
#[cfg(not(test))]
const BACKOFF_SLEEP_DIVISOR: u64 = 1;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("failed to persist webhook log: {0}")]
    Db(#[from] sqlx::Error),
    #[error("webhook delivery failed for `{event_type}`: {message}")]
    Delivery { event_type: String, message: String },
}

/// Exponential backoff before retry attempt `retry_count`, capped at five
/// minutes: `min(1000 * 2^retry_count, 300_000)` milliseconds.
fn backoff_millis(retry_count: i32) -> u64 {
    let exp = retry_count.clamp(0, 16) as u32;
    (1_000u64 << exp).min(BACKOFF_CAP_MS)
}

/// Outbound webhook delivery with a durable audit log and bounded,
/// process-local retries. Retry timers do not survive a restart; a dropped
/// retry leaves its row in `retrying` until reconciliation.
#[derive(Clone)]
pub struct WebhookService {
    repo: Arc<dyn WebhookLogRepository>,
    client: Arc<Client>,
    base_url: String,
    secret: String,
    max_retries: i32,
}

impl WebhookService {
    pub fn new(
        repo: Arc<dyn WebhookLogRepository>,
        client: Arc<Client>,
        base_url: String,
        secret: String,
        max_retries: i32,
    ) -> Self {
        Self {
            repo,
            client,
            base_url,
            secret,
            max_retries,
        }
    }

    /// Signs and delivers `{event, tenant_id, timestamp, data}` to the
    /// automation endpoint for this tenant/event pair. The log row is
    /// persisted in `pending` before the attempt. A failed first attempt
    /// schedules retries and propagates the failure to the caller; retry
    /// outcomes are absorbed into the log.
    pub async fn send_webhook(
        &self,
        tenant_id: Uuid,
        event_type: &str,
        payload: &Value,
    ) -> Result<WebhookLog, WebhookError> {
        let webhook_url = format!("{}/{}/{}", self.base_url, tenant_id, event_type);
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let envelope = json!({
            "event": event_type,
            "tenant_id": tenant_id,
            "timestamp": timestamp,
            "data": payload,
        });
        let signature = self.generate_signature(&envelope);

        let log = self
            .repo
            .create_log(NewWebhookLog {
                tenant_id,
                event_type: event_type.to_string(),
                webhook_url: webhook_url.clone(),
                payload: envelope.clone(),
                signature: signature.clone(),
            })
            .await?;

        match self
            .deliver(&webhook_url, &envelope, &signature, event_type)
            .await
        {
            Ok((status, body)) => {
                self.repo.mark_success(log.id, status, body).await?;
                info!(event_type, %tenant_id, "Webhook sent successfully");
                self.repo
                    .find_log(log.id)
                    .await?
                    .ok_or_else(|| sqlx::Error::RowNotFound.into())
            }
            Err((status, message)) => {
                self.repo.mark_failed(log.id, status, &message).await?;
                error!(event_type, %tenant_id, %message, "Webhook delivery failed");
                if log.retry_count < self.max_retries {
                    self.schedule_retry(log.id, log.retry_count + 1);
                }
                Err(WebhookError::Delivery {
                    event_type: event_type.to_string(),
                    message,
                })
            }
        }
    }

    /// One retry pass over an existing log row: bumps the retry counter,
    /// resends the recorded payload with its original signature, and either
    /// settles the row or schedules the next attempt.
    pub async fn retry_webhook(&self, log_id: Uuid) -> Result<(), WebhookError> {
        let Some(log) = self.repo.find_log(log_id).await? else {
            return Ok(());
        };

        if log.retry_count >= self.max_retries {
            self.repo
                .mark_failed(log_id, log.response_status, "Retry limit reached")
                .await?;
            return Ok(());
        }

        let Some(log) = self.repo.mark_retrying(log_id).await? else {
            return Ok(());
        };

        match self
            .deliver(&log.webhook_url, &log.payload.0, &log.signature, &log.event_type)
            .await
        {
            Ok((status, body)) => {
                self.repo.mark_success(log_id, status, body).await?;
                info!(event_type = %log.event_type, retry_count = log.retry_count, "Webhook retry successful");
            }
            Err((status, message)) => {
                self.repo.mark_failed(log_id, status, &message).await?;
                if log.retry_count < self.max_retries {
                    self.schedule_retry(log_id, log.retry_count + 1);
                }
            }
        }
        Ok(())
    }

    fn schedule_retry(&self, log_id: Uuid, retry_count: i32) {
        let delay = Duration::from_millis(backoff_millis(retry_count) / BACKOFF_SLEEP_DIVISOR);
        let service = self.clone();
        warn!(%log_id, retry_count, delay_ms = delay.as_millis() as u64, "Scheduling webhook retry");
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(err) = service.retry_webhook(log_id).await {
                error!(%log_id, ?err, "Webhook retry error");
            }
        });
    }

    async fn deliver(
        &self,
        url: &str,
        envelope: &Value,
        signature: &str,
        event_type: &str,
    ) -> Result<(i32, Value), (Option<i32>, String)> {
        let response = self
            .client
            .post(url)
            .timeout(DELIVERY_TIMEOUT)
            .header("X-Webhook-Signature", signature)
            .header("X-Event-Type", event_type)
            .json(envelope)
            .send()
            .await
            .map_err(|err| (None, err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            Ok((status.as_u16() as i32, body))
        } else {
            Err((
                Some(status.as_u16() as i32),
                format!("webhook endpoint returned {}", status.as_u16()),
            ))
        }
    }

    pub async fn list_logs(
        &self,
        tenant_id: Uuid,
        event_type: Option<&str>,
        status: Option<WebhookStatus>,
        limit: i64,
    ) -> Result<Vec<WebhookLog>, WebhookError> {
        Ok(self
            .repo
            .list_logs(tenant_id, event_type, status, limit)
            .await?)
    }

    pub fn generate_signature(&self, payload: &Value) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.to_string().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check for inbound webhook validation.
    pub fn verify_signature(&self, payload: &Value, signature: &str) -> bool {
        let expected = self.generate_signature(payload);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}
