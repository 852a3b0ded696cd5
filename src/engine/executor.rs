use serde_json::{json, Value};
use sqlx::types::Json;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::workflow_repository::NewExecution;
use crate::engine::actions::{execute_action, ActionError};
use crate::engine::conditions::evaluate_conditions;
use crate::models::workflow::{ActionKind, WorkflowStatus};
use crate::models::workflow_execution::{ExecutionLogEntry, ExecutionStatus, WorkflowExecution};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow {0} not found")]
    NotFound(Uuid),
    #[error("workflow {0} is not active")]
    NotActive(Uuid),
    #[error("workflow persistence error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("workflow action `{action:?}` failed: {source}")]
    Action {
        /// The failed execution record, including the partial log of the
        /// actions that did complete.
        execution: Box<WorkflowExecution>,
        action: ActionKind,
        #[source]
        source: ActionError,
    },
}

/// Runs one workflow against one trigger-data payload.
///
/// Only `active` workflows run; anything else is rejected before any
/// execution record exists. A run whose conditions are not met completes as
/// a skip and leaves the workflow counters untouched. Actions execute
/// strictly in list order and the first failure aborts the run: completed
/// actions are not rolled back, the partial log is persisted on the failed
/// execution record, and the failure is counted against the workflow.
pub async fn execute_workflow(
    state: &AppState,
    workflow_id: Uuid,
    trigger_data: Value,
) -> Result<WorkflowExecution, EngineError> {
    let workflow = state
        .workflow_repo
        .find_workflow(workflow_id)
        .await?
        .ok_or(EngineError::NotFound(workflow_id))?;

    if workflow.status != WorkflowStatus::Active {
        return Err(EngineError::NotActive(workflow_id));
    }

    let lead_id = trigger_data
        .get("leadId")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok());

    let mut execution = state
        .workflow_repo
        .create_execution(NewExecution {
            workflow_id,
            lead_id,
            trigger_data: trigger_data.clone(),
        })
        .await?;

    if !evaluate_conditions(&workflow.conditions.0, &trigger_data) {
        let result = json!({ "skipped": true, "reason": "Conditions not met" });
        state
            .workflow_repo
            .complete_execution(
                execution.id,
                ExecutionStatus::Completed,
                Some(result.clone()),
                &[],
                None,
            )
            .await?;
        info!(%workflow_id, execution_id = %execution.id, "workflow skipped, conditions not met");

        execution.status = ExecutionStatus::Completed;
        execution.result = Json(result);
        execution.completed_at = Some(OffsetDateTime::now_utc());
        return Ok(execution);
    }

    let mut execution_log: Vec<ExecutionLogEntry> = Vec::with_capacity(workflow.actions.0.len());
    let mut action_results: Vec<Value> = Vec::with_capacity(workflow.actions.0.len());

    for action in &workflow.actions.0 {
        match execute_action(state, workflow.tenant_id, action, &trigger_data).await {
            Ok(result) => {
                execution_log.push(ExecutionLogEntry {
                    action: action.kind,
                    timestamp: OffsetDateTime::now_utc(),
                    result: result.clone(),
                });
                action_results.push(result);
            }
            Err(source) => {
                let message = source.to_string();
                error!(
                    %workflow_id,
                    execution_id = %execution.id,
                    action = ?action.kind,
                    error = %message,
                    "workflow action failed"
                );
                state
                    .workflow_repo
                    .complete_execution(
                        execution.id,
                        ExecutionStatus::Failed,
                        None,
                        &execution_log,
                        Some(&message),
                    )
                    .await?;
                state
                    .workflow_repo
                    .record_execution_outcome(workflow_id, false)
                    .await?;

                execution.status = ExecutionStatus::Failed;
                execution.execution_log = Json(execution_log);
                execution.error_message = Some(message);
                execution.completed_at = Some(OffsetDateTime::now_utc());
                return Err(EngineError::Action {
                    execution: Box::new(execution),
                    action: action.kind,
                    source,
                });
            }
        }
    }

    let result = json!({ "success": true, "actions": action_results });
    state
        .workflow_repo
        .complete_execution(
            execution.id,
            ExecutionStatus::Completed,
            Some(result.clone()),
            &execution_log,
            None,
        )
        .await?;
    state
        .workflow_repo
        .record_execution_outcome(workflow_id, true)
        .await?;
    info!(
        %workflow_id,
        execution_id = %execution.id,
        actions = execution_log.len(),
        "workflow completed"
    );

    execution.status = ExecutionStatus::Completed;
    execution.execution_log = Json(execution_log);
    execution.result = Json(result);
    execution.completed_at = Some(OffsetDateTime::now_utc());
    Ok(execution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::{InMemoryLeadRepository, InMemoryWorkflowRepository};
    use crate::engine::test_support::{build_state, sample_lead, sample_workflow};
    use crate::models::workflow::{ActionDescriptor, ConditionClause, Operator, TriggerType};
    use crate::services::whatsapp::MockWhatsAppGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn delay_action(ms: u64) -> ActionDescriptor {
        ActionDescriptor {
            kind: ActionKind::Delay,
            config: json!({ "delayMs": ms }),
        }
    }

    #[tokio::test]
    async fn draft_workflow_is_rejected_without_an_execution_record() {
        let tenant_id = Uuid::new_v4();
        let workflow = sample_workflow(
            tenant_id,
            TriggerType::Manual,
            WorkflowStatus::Draft,
            0,
            vec![],
            vec![delay_action(1)],
        );
        let workflow_id = workflow.id;
        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow]));
        let (state, _) = build_state(
            repo.clone(),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );

        let err = execute_workflow(&state, workflow_id, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotActive(id) if id == workflow_id));
        assert_eq!(repo.execution_count(), 0);
        assert_eq!(repo.workflow(workflow_id).unwrap().execution_count, 0);
    }

    #[tokio::test]
    async fn missing_workflow_is_reported_as_not_found() {
        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );
        let ghost = Uuid::new_v4();
        let err = execute_workflow(&state, ghost, json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn unmet_conditions_complete_as_a_skip_and_leave_counters_alone() {
        let tenant_id = Uuid::new_v4();
        let workflow = sample_workflow(
            tenant_id,
            TriggerType::MessageReceived,
            WorkflowStatus::Active,
            0,
            vec![ConditionClause {
                field: "intent".into(),
                operator: Operator::Equals,
                value: json!("purchase"),
            }],
            vec![delay_action(1)],
        );
        let workflow_id = workflow.id;
        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow]));
        let (state, _) = build_state(
            repo.clone(),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );

        let execution = execute_workflow(&state, workflow_id, json!({ "intent": "support" }))
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.result.0["skipped"], json!(true));
        assert!(execution.execution_log.0.is_empty());

        let stored = repo.workflow(workflow_id).unwrap();
        assert_eq!(stored.execution_count, 0);
        assert_eq!(stored.success_count, 0);
        assert_eq!(stored.failure_count, 0);
        assert!(stored.last_executed_at.is_none());

        // The skip still leaves a completed execution record behind.
        let persisted = state
            .workflow_repo
            .get_execution(execution.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.status, ExecutionStatus::Completed);
        assert_eq!(persisted.result.0["reason"], json!("Conditions not met"));
    }

    #[tokio::test]
    async fn successful_run_logs_every_action_and_counts_a_success() {
        let tenant_id = Uuid::new_v4();
        let lead = sample_lead(tenant_id);
        let lead_id = lead.id;
        let workflow = sample_workflow(
            tenant_id,
            TriggerType::StageChange,
            WorkflowStatus::Active,
            0,
            vec![],
            vec![
                delay_action(1),
                ActionDescriptor {
                    kind: ActionKind::UpdateLeadField,
                    config: json!({ "field": "status", "value": "qualified" }),
                },
            ],
        );
        let workflow_id = workflow.id;
        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow]));
        let leads = Arc::new(InMemoryLeadRepository::with_lead(lead));
        let (state, _) = build_state(
            repo.clone(),
            leads.clone(),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );

        let execution = execute_workflow(
            &state,
            workflow_id,
            json!({ "leadId": lead_id.to_string() }),
        )
        .await
        .unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.lead_id, Some(lead_id));
        assert_eq!(execution.execution_log.0.len(), 2);
        assert_eq!(execution.execution_log.0[0].action, ActionKind::Delay);
        assert_eq!(
            execution.execution_log.0[1].action,
            ActionKind::UpdateLeadField
        );
        assert_eq!(execution.result.0["success"], json!(true));

        let stored = repo.workflow(workflow_id).unwrap();
        assert_eq!(stored.execution_count, 1);
        assert_eq!(stored.success_count, 1);
        assert_eq!(stored.failure_count, 0);
        assert!(stored.last_executed_at.is_some());
        assert_eq!(
            leads.lead(lead_id).unwrap().status.as_deref(),
            Some("qualified")
        );
    }

    #[tokio::test]
    async fn first_failing_action_aborts_the_run_and_persists_the_partial_log() {
        let tenant_id = Uuid::new_v4();
        let workflow = sample_workflow(
            tenant_id,
            TriggerType::NoReply,
            WorkflowStatus::Active,
            0,
            vec![],
            vec![
                delay_action(1),
                // Fails: the lead id in the trigger data resolves to nothing.
                ActionDescriptor {
                    kind: ActionKind::SendWhatsappMessage,
                    config: json!({ "message": "still there?" }),
                },
                delay_action(1),
            ],
        );
        let workflow_id = workflow.id;
        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow]));
        let (state, _) = build_state(
            repo.clone(),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );

        let err = execute_workflow(
            &state,
            workflow_id,
            json!({ "leadId": Uuid::new_v4().to_string() }),
        )
        .await
        .unwrap_err();

        let EngineError::Action {
            execution, action, ..
        } = err
        else {
            panic!("expected an action failure");
        };
        assert_eq!(action, ActionKind::SendWhatsappMessage);
        assert_eq!(execution.status, ExecutionStatus::Failed);
        // Only the action that completed before the failure is logged.
        assert_eq!(execution.execution_log.0.len(), 1);
        assert_eq!(execution.execution_log.0[0].action, ActionKind::Delay);
        assert!(execution.error_message.is_some());

        let stored = repo.workflow(workflow_id).unwrap();
        assert_eq!(stored.execution_count, 1);
        assert_eq!(stored.success_count, 0);
        assert_eq!(stored.failure_count, 1);
        assert!(stored.last_executed_at.is_none());

        let persisted = state
            .workflow_repo
            .get_execution(execution.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.status, ExecutionStatus::Failed);
        assert_eq!(persisted.execution_log.0.len(), 1);
    }
}
