use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "webhook_status", rename_all = "snake_case")]
pub enum WebhookStatus {
    Pending,
    Success,
    Failed,
    Retrying,
}

/// One row per outbound webhook delivery, updated in place across retries.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct WebhookLog {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub event_type: String,
    pub webhook_url: String,
    pub payload: Json<Value>,
    pub signature: String,
    pub status: WebhookStatus,
    pub retry_count: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_retry_at: Option<OffsetDateTime>,
    pub response_status: Option<i32>,
    pub response_body: Option<Json<Value>>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
