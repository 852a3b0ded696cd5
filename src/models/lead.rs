use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// The slice of a lead the automation engine reads and writes. Full lead
/// management (scoring, stages, conversation history) lives behind the
/// lead-store collaborator and is not modeled here.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub whatsapp_number: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub custom_fields: Json<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
