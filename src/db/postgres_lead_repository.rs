use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::lead_repository::LeadRepository;
use crate::models::lead::Lead;

const LEAD_COLUMNS: &str = "id, tenant_id, whatsapp_number, name, email, company, status, \
     assigned_to, custom_fields, created_at, updated_at";

/// Scalar lead columns a workflow may target directly. Anything else lands
/// in the `custom_fields` document.
const SCALAR_FIELDS: &[&str] = &["whatsapp_number", "name", "email", "company", "status"];

pub struct PostgresLeadRepository {
    pub pool: PgPool,
}

#[async_trait]
impl LeadRepository for PostgresLeadRepository {
    async fn find_lead(&self, lead_id: Uuid) -> Result<Option<Lead>, sqlx::Error> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
        sqlx::query_as::<_, Lead>(&sql)
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_assigned_rep(&self, lead_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE leads SET assigned_to = $2, updated_at = now() WHERE id = $1")
            .bind(lead_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_lead_field(
        &self,
        lead_id: Uuid,
        field: &str,
        value: &Value,
    ) -> Result<(), sqlx::Error> {
        if field == "assigned_to" {
            let user_id = value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| {
                    sqlx::Error::Decode("assigned_to requires a UUID string value".into())
                })?;
            return self.set_assigned_rep(lead_id, user_id).await;
        }

        if SCALAR_FIELDS.contains(&field) {
            // Column name comes from the fixed list above, never from input.
            let sql = format!("UPDATE leads SET {field} = $2, updated_at = now() WHERE id = $1");
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            sqlx::query(&sql)
                .bind(lead_id)
                .bind(text)
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE leads SET
                custom_fields = jsonb_set(custom_fields, $2, $3, true),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(lead_id)
        .bind(vec![field.to_string()])
        .bind(Json(value))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
