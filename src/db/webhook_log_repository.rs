use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::webhook_log::{WebhookLog, WebhookStatus};

#[derive(Debug, Clone)]
pub struct NewWebhookLog {
    pub tenant_id: Uuid,
    pub event_type: String,
    pub webhook_url: String,
    pub payload: Value,
    pub signature: String,
}

#[async_trait]
pub trait WebhookLogRepository: Send + Sync {
    /// Persists the audit row in `pending` before the first delivery attempt
    /// so the trail exists regardless of delivery outcome.
    async fn create_log(&self, new: NewWebhookLog) -> Result<WebhookLog, sqlx::Error>;

    async fn find_log(&self, log_id: Uuid) -> Result<Option<WebhookLog>, sqlx::Error>;

    async fn mark_success(
        &self,
        log_id: Uuid,
        response_status: i32,
        response_body: Value,
    ) -> Result<(), sqlx::Error>;

    async fn mark_failed(
        &self,
        log_id: Uuid,
        response_status: Option<i32>,
        error_message: &str,
    ) -> Result<(), sqlx::Error>;

    /// Flips the row to `retrying`, increments `retry_count` and stamps
    /// `last_retry_at`, returning the updated row.
    async fn mark_retrying(&self, log_id: Uuid) -> Result<Option<WebhookLog>, sqlx::Error>;

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        event_type: Option<&str>,
        status: Option<WebhookStatus>,
        limit: i64,
    ) -> Result<Vec<WebhookLog>, sqlx::Error>;
}
