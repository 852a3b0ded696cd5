use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::lead_repository::LeadRepository;
use crate::db::webhook_log_repository::{NewWebhookLog, WebhookLogRepository};
use crate::db::workflow_repository::{NewExecution, WorkflowRepository};
use crate::models::lead::Lead;
use crate::models::webhook_log::{WebhookLog, WebhookStatus};
use crate::models::workflow::{
    CreateWorkflow, TriggerType, UpdateWorkflow, Workflow, WorkflowStatus,
};
use crate::models::workflow_execution::{ExecutionLogEntry, ExecutionStatus, WorkflowExecution};

/// In-memory `WorkflowRepository` used by engine and route tests. Behaves
/// like the Postgres implementation, including the ordering of
/// `list_active_by_trigger` and the single-shot counter bookkeeping.
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    pub workflows: Mutex<Vec<Workflow>>,
    pub executions: Mutex<Vec<WorkflowExecution>>,
}

impl InMemoryWorkflowRepository {
    pub fn with_workflows(workflows: Vec<Workflow>) -> Self {
        Self {
            workflows: Mutex::new(workflows),
            executions: Mutex::new(Vec::new()),
        }
    }

    pub fn workflow(&self, workflow_id: Uuid) -> Option<Workflow> {
        self.workflows
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.id == workflow_id)
            .cloned()
    }

    pub fn execution_count(&self) -> usize {
        self.executions.lock().unwrap().len()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn create_workflow(
        &self,
        tenant_id: Uuid,
        payload: &CreateWorkflow,
    ) -> Result<Workflow, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let workflow = Workflow {
            id: Uuid::new_v4(),
            tenant_id,
            name: payload.name.clone(),
            description: payload.description.clone(),
            trigger_type: payload.trigger_type,
            trigger_config: Json(payload.trigger_config.clone()),
            conditions: Json(payload.conditions.clone()),
            actions: Json(payload.actions.clone()),
            status: payload.status.unwrap_or(WorkflowStatus::Draft),
            priority: payload.priority.unwrap_or(0),
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.workflows.lock().unwrap().push(workflow.clone());
        Ok(workflow)
    }

    async fn list_workflows(
        &self,
        tenant_id: Uuid,
        status: Option<WorkflowStatus>,
        trigger_type: Option<TriggerType>,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let mut matching: Vec<Workflow> = self
            .workflows
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.tenant_id == tenant_id)
            .filter(|w| status.map_or(true, |s| w.status == s))
            .filter(|w| trigger_type.map_or(true, |t| w.trigger_type == t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(matching)
    }

    async fn find_workflow(&self, workflow_id: Uuid) -> Result<Option<Workflow>, sqlx::Error> {
        Ok(self.workflow(workflow_id))
    }

    async fn find_workflow_for_tenant(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        Ok(self
            .workflow(workflow_id)
            .filter(|w| w.tenant_id == tenant_id))
    }

    async fn update_workflow(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        payload: &UpdateWorkflow,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let mut workflows = self.workflows.lock().unwrap();
        let Some(workflow) = workflows
            .iter_mut()
            .find(|w| w.tenant_id == tenant_id && w.id == workflow_id)
        else {
            return Ok(None);
        };
        if let Some(name) = &payload.name {
            workflow.name = name.clone();
        }
        if let Some(description) = &payload.description {
            workflow.description = Some(description.clone());
        }
        if let Some(trigger_type) = payload.trigger_type {
            workflow.trigger_type = trigger_type;
        }
        if let Some(config) = &payload.trigger_config {
            workflow.trigger_config = Json(config.clone());
        }
        if let Some(conditions) = &payload.conditions {
            workflow.conditions = Json(conditions.clone());
        }
        if let Some(actions) = &payload.actions {
            workflow.actions = Json(actions.clone());
        }
        if let Some(status) = payload.status {
            workflow.status = status;
        }
        if let Some(priority) = payload.priority {
            workflow.priority = priority;
        }
        workflow.updated_at = OffsetDateTime::now_utc();
        Ok(Some(workflow.clone()))
    }

    async fn delete_workflow(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut workflows = self.workflows.lock().unwrap();
        let before = workflows.len();
        workflows.retain(|w| !(w.tenant_id == tenant_id && w.id == workflow_id));
        Ok(workflows.len() < before)
    }

    async fn list_active_by_trigger(
        &self,
        tenant_id: Uuid,
        trigger_type: TriggerType,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let mut matching: Vec<Workflow> = self
            .workflows
            .lock()
            .unwrap()
            .iter()
            .filter(|w| {
                w.tenant_id == tenant_id
                    && w.trigger_type == trigger_type
                    && w.status == WorkflowStatus::Active
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(matching)
    }

    async fn record_execution_outcome(
        &self,
        workflow_id: Uuid,
        succeeded: bool,
    ) -> Result<(), sqlx::Error> {
        let mut workflows = self.workflows.lock().unwrap();
        if let Some(workflow) = workflows.iter_mut().find(|w| w.id == workflow_id) {
            workflow.execution_count += 1;
            if succeeded {
                workflow.success_count += 1;
                workflow.last_executed_at = Some(OffsetDateTime::now_utc());
            } else {
                workflow.failure_count += 1;
            }
            workflow.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn create_execution(
        &self,
        new: NewExecution,
    ) -> Result<WorkflowExecution, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let execution = WorkflowExecution {
            id: Uuid::new_v4(),
            workflow_id: new.workflow_id,
            lead_id: new.lead_id,
            status: ExecutionStatus::Running,
            trigger_data: Json(new.trigger_data),
            execution_log: Json(Vec::new()),
            result: Json(Value::Object(serde_json::Map::new())),
            error_message: None,
            retry_count: 0,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.executions.lock().unwrap().push(execution.clone());
        Ok(execution)
    }

    async fn complete_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        result: Option<Value>,
        execution_log: &[ExecutionLogEntry],
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let mut executions = self.executions.lock().unwrap();
        if let Some(execution) = executions.iter_mut().find(|e| e.id == execution_id) {
            execution.status = status;
            if let Some(result) = result {
                execution.result = Json(result);
            }
            execution.execution_log = Json(execution_log.to_vec());
            execution.error_message = error_message.map(str::to_string);
            execution.completed_at = Some(OffsetDateTime::now_utc());
            execution.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn get_execution(
        &self,
        execution_id: Uuid,
    ) -> Result<Option<WorkflowExecution>, sqlx::Error> {
        Ok(self
            .executions
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == execution_id)
            .cloned())
    }

    async fn list_executions(
        &self,
        workflow_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, sqlx::Error> {
        let mut matching: Vec<WorkflowExecution> = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryLeadRepository {
    pub leads: Mutex<HashMap<Uuid, Lead>>,
}

impl InMemoryLeadRepository {
    pub fn with_lead(lead: Lead) -> Self {
        let repo = Self::default();
        repo.leads.lock().unwrap().insert(lead.id, lead);
        repo
    }

    pub fn lead(&self, lead_id: Uuid) -> Option<Lead> {
        self.leads.lock().unwrap().get(&lead_id).cloned()
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn find_lead(&self, lead_id: Uuid) -> Result<Option<Lead>, sqlx::Error> {
        Ok(self.lead(lead_id))
    }

    async fn set_assigned_rep(&self, lead_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
        if let Some(lead) = self.leads.lock().unwrap().get_mut(&lead_id) {
            lead.assigned_to = Some(user_id);
            lead.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn update_lead_field(
        &self,
        lead_id: Uuid,
        field: &str,
        value: &Value,
    ) -> Result<(), sqlx::Error> {
        let mut leads = self.leads.lock().unwrap();
        let Some(lead) = leads.get_mut(&lead_id) else {
            return Ok(());
        };
        let as_text = || match value {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        };
        match field {
            "assigned_to" => {
                lead.assigned_to = value.as_str().and_then(|s| Uuid::parse_str(s).ok());
            }
            "whatsapp_number" => {
                if let Some(text) = as_text() {
                    lead.whatsapp_number = text;
                }
            }
            "name" => lead.name = as_text(),
            "email" => lead.email = as_text(),
            "company" => lead.company = as_text(),
            "status" => lead.status = as_text(),
            other => {
                if let Value::Object(map) = &mut lead.custom_fields.0 {
                    map.insert(other.to_string(), value.clone());
                } else {
                    let mut map = serde_json::Map::new();
                    map.insert(other.to_string(), value.clone());
                    lead.custom_fields = Json(Value::Object(map));
                }
            }
        }
        lead.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWebhookLogRepository {
    pub logs: Mutex<HashMap<Uuid, WebhookLog>>,
}

impl InMemoryWebhookLogRepository {
    pub fn log(&self, log_id: Uuid) -> Option<WebhookLog> {
        self.logs.lock().unwrap().get(&log_id).cloned()
    }
}

#[async_trait]
impl WebhookLogRepository for InMemoryWebhookLogRepository {
    async fn create_log(&self, new: NewWebhookLog) -> Result<WebhookLog, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let log = WebhookLog {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            event_type: new.event_type,
            webhook_url: new.webhook_url,
            payload: Json(new.payload),
            signature: new.signature,
            status: WebhookStatus::Pending,
            retry_count: 0,
            last_retry_at: None,
            response_status: None,
            response_body: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.logs.lock().unwrap().insert(log.id, log.clone());
        Ok(log)
    }

    async fn find_log(&self, log_id: Uuid) -> Result<Option<WebhookLog>, sqlx::Error> {
        Ok(self.log(log_id))
    }

    async fn mark_success(
        &self,
        log_id: Uuid,
        response_status: i32,
        response_body: Value,
    ) -> Result<(), sqlx::Error> {
        if let Some(log) = self.logs.lock().unwrap().get_mut(&log_id) {
            log.status = WebhookStatus::Success;
            log.response_status = Some(response_status);
            log.response_body = Some(Json(response_body));
            log.error_message = None;
            log.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        log_id: Uuid,
        response_status: Option<i32>,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        if let Some(log) = self.logs.lock().unwrap().get_mut(&log_id) {
            log.status = WebhookStatus::Failed;
            log.response_status = response_status;
            log.error_message = Some(error_message.to_string());
            log.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn mark_retrying(&self, log_id: Uuid) -> Result<Option<WebhookLog>, sqlx::Error> {
        let mut logs = self.logs.lock().unwrap();
        let Some(log) = logs.get_mut(&log_id) else {
            return Ok(None);
        };
        log.status = WebhookStatus::Retrying;
        log.retry_count += 1;
        log.last_retry_at = Some(OffsetDateTime::now_utc());
        log.updated_at = OffsetDateTime::now_utc();
        Ok(Some(log.clone()))
    }

    async fn list_logs(
        &self,
        tenant_id: Uuid,
        event_type: Option<&str>,
        status: Option<WebhookStatus>,
        limit: i64,
    ) -> Result<Vec<WebhookLog>, sqlx::Error> {
        let mut matching: Vec<WebhookLog> = self
            .logs
            .lock()
            .unwrap()
            .values()
            .filter(|l| l.tenant_id == tenant_id)
            .filter(|l| event_type.map_or(true, |e| l.event_type == e))
            .filter(|l| status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}
