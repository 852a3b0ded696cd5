use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::workflow_repository::{NewExecution, WorkflowRepository};
use crate::models::workflow::{
    CreateWorkflow, TriggerType, UpdateWorkflow, Workflow, WorkflowStatus,
};
use crate::models::workflow_execution::{ExecutionLogEntry, ExecutionStatus, WorkflowExecution};

const WORKFLOW_COLUMNS: &str = "id, tenant_id, name, description, trigger_type, trigger_config, \
     conditions, actions, status, priority, execution_count, success_count, failure_count, \
     last_executed_at, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "id, workflow_id, lead_id, status, trigger_data, execution_log, \
     result, error_message, retry_count, started_at, completed_at, created_at, updated_at";

pub struct PostgresWorkflowRepository {
    pub pool: PgPool,
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn create_workflow(
        &self,
        tenant_id: Uuid,
        payload: &CreateWorkflow,
    ) -> Result<Workflow, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO workflows
                (tenant_id, name, description, trigger_type, trigger_config, conditions, actions, status, priority, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
            RETURNING {WORKFLOW_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(tenant_id)
            .bind(&payload.name)
            .bind(payload.description.as_deref())
            .bind(payload.trigger_type)
            .bind(Json(&payload.trigger_config))
            .bind(Json(&payload.conditions))
            .bind(Json(&payload.actions))
            .bind(payload.status.unwrap_or(WorkflowStatus::Draft))
            .bind(payload.priority.unwrap_or(0))
            .fetch_one(&self.pool)
            .await
    }

    async fn list_workflows(
        &self,
        tenant_id: Uuid,
        status: Option<WorkflowStatus>,
        trigger_type: Option<TriggerType>,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            WHERE tenant_id = $1
              AND ($2::workflow_status IS NULL OR status = $2)
              AND ($3::trigger_type IS NULL OR trigger_type = $3)
            ORDER BY priority DESC, created_at DESC
            "#
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(tenant_id)
            .bind(status)
            .bind(trigger_type)
            .fetch_all(&self.pool)
            .await
    }

    async fn find_workflow(&self, workflow_id: Uuid) -> Result<Option<Workflow>, sqlx::Error> {
        let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1");
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_workflow_for_tenant(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE tenant_id = $1 AND id = $2"
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(tenant_id)
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn update_workflow(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        payload: &UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE workflows SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                trigger_type = COALESCE($5, trigger_type),
                trigger_config = COALESCE($6, trigger_config),
                conditions = COALESCE($7, conditions),
                actions = COALESCE($8, actions),
                status = COALESCE($9, status),
                priority = COALESCE($10, priority),
                updated_at = now()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {WORKFLOW_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(tenant_id)
            .bind(workflow_id)
            .bind(payload.name.as_deref())
            .bind(payload.description.as_deref())
            .bind(payload.trigger_type)
            .bind(payload.trigger_config.as_ref().map(Json))
            .bind(payload.conditions.as_ref().map(Json))
            .bind(payload.actions.as_ref().map(Json))
            .bind(payload.status)
            .bind(payload.priority)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_workflow(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active_by_trigger(
        &self,
        tenant_id: Uuid,
        trigger_type: TriggerType,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            WHERE tenant_id = $1 AND trigger_type = $2 AND status = 'active'
            ORDER BY priority DESC, created_at ASC
            "#
        );
        sqlx::query_as::<_, Workflow>(&sql)
            .bind(tenant_id)
            .bind(trigger_type)
            .fetch_all(&self.pool)
            .await
    }

    async fn record_execution_outcome(
        &self,
        workflow_id: Uuid,
        succeeded: bool,
    ) -> Result<(), sqlx::Error> {
        // Single-statement increment so concurrent runs cannot lose updates.
        sqlx::query(
            r#"
            UPDATE workflows SET
                execution_count = execution_count + 1,
                success_count = success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                failure_count = failure_count + CASE WHEN $2 THEN 0 ELSE 1 END,
                last_executed_at = CASE WHEN $2 THEN now() ELSE last_executed_at END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(workflow_id)
        .bind(succeeded)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_execution(
        &self,
        new: NewExecution,
    ) -> Result<WorkflowExecution, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO workflow_executions
                (workflow_id, lead_id, status, trigger_data, execution_log, result, started_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, '[]'::jsonb, '{{}}'::jsonb, now(), now(), now())
            RETURNING {EXECUTION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, WorkflowExecution>(&sql)
            .bind(new.workflow_id)
            .bind(new.lead_id)
            .bind(ExecutionStatus::Running)
            .bind(Json(&new.trigger_data))
            .fetch_one(&self.pool)
            .await
    }

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        result: Option<Value>,
        execution_log: &[ExecutionLogEntry],
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_executions SET
                status = $2,
                result = COALESCE($3, result),
                execution_log = $4,
                error_message = $5,
                completed_at = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(execution_id)
        .bind(status)
        .bind(result.map(Json))
        .bind(Json(execution_log))
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error> {
        let sql = format!("SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE id = $1");
        sqlx::query_as::<_, WorkflowExecution>(&sql)
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {EXECUTION_COLUMNS}
            FROM workflow_executions
            WHERE workflow_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        );
        sqlx::query_as::<_, WorkflowExecution>(&sql)
            .bind(workflow_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }
}
