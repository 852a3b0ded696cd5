use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::webhook_log_repository::{NewWebhookLog, WebhookLogRepository};
use crate::models::webhook_log::{WebhookLog, WebhookStatus};

const LOG_COLUMNS: &str = "id, tenant_id, event_type, webhook_url, payload, signature, status, \
     retry_count, last_retry_at, response_status, response_body, error_message, created_at, updated_at";

pub struct PostgresWebhookLogRepository {
    pub pool: PgPool,
}

#[async_trait]
impl WebhookLogRepository for PostgresWebhookLogRepository {
    async fn create_log(&self, new: NewWebhookLog) -> Result<WebhookLog, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO webhook_logs
                (tenant_id, event_type, webhook_url, payload, signature, status, retry_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, now(), now())
            RETURNING {LOG_COLUMNS}
            "#
        );
        sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(new.tenant_id)
            .bind(&new.event_type)
            .bind(&new.webhook_url)
            .bind(Json(&new.payload))
            .bind(&new.signature)
            .fetch_one(&self.pool)
            .await
    }

    async fn find_log(&self, log_id: Uuid) -> Result<Option<WebhookLog>, sqlx::Error> {
        let sql = format!("SELECT {LOG_COLUMNS} FROM webhook_logs WHERE id = $1");
        sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn mark_success(
        &self,
        log_id: Uuid,
        response_status: i32,
        response_body: Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_logs SET
                status = 'success',
                response_status = $2,
                response_body = $3,
                error_message = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(log_id)
        .bind(response_status)
        .bind(Json(response_body))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        log_id: Uuid,
        response_status: Option<i32>,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_logs SET
                status = 'failed',
                response_status = $2,
                error_message = $3,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(log_id)
        .bind(response_status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_retrying(&self, log_id: Uuid) -> Result<Option<WebhookLog>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE webhook_logs SET
                status = 'retrying',
                retry_count = retry_count + 1,
                last_retry_at = now(),
                updated_at = now()
            WHERE id = $1
            RETURNING {LOG_COLUMNS}
            "#
        );
        sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        event_type: Option<&str>,
        status: Option<WebhookStatus>,
        limit: i64,
    ) -> Result<Vec<WebhookLog>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {LOG_COLUMNS}
            FROM webhook_logs
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR event_type = $2)
              AND ($3::webhook_status IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#
        );
        sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(tenant_id)
            .bind(event_type)
            .bind(status)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }
}
