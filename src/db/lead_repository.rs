use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::lead::Lead;

/// Lead-store contract consumed by the action executor. The full lead
/// lifecycle is owned elsewhere; the engine only resolves leads and writes
/// individual fields.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_lead(&self, lead_id: Uuid) -> Result<Option<Lead>, sqlx::Error>;

    async fn set_assigned_rep(&self, lead_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error>;

    /// Writes a named field on the lead. Workflow authors are trusted here:
    /// no allow-list is enforced, matching the documented privileged-action
    /// contract of `update_lead_field`.
    async fn update_lead_field(
        &self,
        lead_id: Uuid,
        field: &str,
        value: &Value,
    ) -> Result<(), sqlx::Error>;
}
