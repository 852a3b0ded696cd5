use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::workflow::{
    CreateWorkflow, TriggerType, UpdateWorkflow, Workflow, WorkflowStatus,
};
use crate::models::workflow_execution::{ExecutionLogEntry, ExecutionStatus, WorkflowExecution};

/// Fields for a freshly started execution record. The engine always creates
/// executions in `running` with the trigger-data snapshot attached.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub workflow_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub trigger_data: Value,
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create_workflow(
        &self,
        tenant_id: Uuid,
        payload: &CreateWorkflow,
    ) -> Result<Workflow, sqlx::Error>;

    async fn list_workflows(
        &self,
        tenant_id: Uuid,
        status: Option<WorkflowStatus>,
        trigger_type: Option<TriggerType>,
    ) -> Result<Vec<Workflow>, sqlx::Error>;

    /// Unscoped lookup used by the execution engine, which is handed a bare
    /// workflow id by manual-run callers and by the dispatcher.
    async fn find_workflow(&self, workflow_id: Uuid) -> Result<Option<Workflow>, sqlx::Error>;

    async fn find_workflow_for_tenant(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    async fn update_workflow(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        payload: &UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    async fn delete_workflow(&self, tenant_id: Uuid, workflow_id: Uuid)
        -> Result<bool, sqlx::Error>;

    /// Active workflows registered for a trigger, ordered by priority
    /// descending with insertion order breaking ties.
    async fn list_active_by_trigger(
        &self,
        tenant_id: Uuid,
        trigger_type: TriggerType,
    ) -> Result<Vec<Workflow>, sqlx::Error>;

    /// Atomic counter bookkeeping for a finished run: bumps
    /// `execution_count` plus exactly one of `success_count`/`failure_count`
    /// in a single UPDATE so concurrent runs cannot lose increments.
    /// `last_executed_at` is stamped only on success.
    async fn record_execution_outcome(
        &self,
        workflow_id: Uuid,
        succeeded: bool,
    ) -> Result<(), sqlx::Error>;

    // Execution records
    async fn create_execution(
        &self,
        new: NewExecution,
    ) -> Result<WorkflowExecution, sqlx::Error>;

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        result: Option<Value>,
        execution_log: &[ExecutionLogEntry],
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error>;

    async fn get_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error>;

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, sqlx::Error>;
}
